//! Logging levels and the logging/* payloads.
//!
//! Levels map to RFC 5424 severities. A session that sets a level receives
//! `notifications/message` frames at that severity or worse.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LoggingLevel {
    /// RFC 5424 numeric severity, 0 = most severe.
    fn severity(&self) -> u8 {
        match self {
            LoggingLevel::Emergency => 0,
            LoggingLevel::Alert => 1,
            LoggingLevel::Critical => 2,
            LoggingLevel::Error => 3,
            LoggingLevel::Warning => 4,
            LoggingLevel::Notice => 5,
            LoggingLevel::Info => 6,
            LoggingLevel::Debug => 7,
        }
    }

    /// Whether a message at `message_level` passes a threshold of `self`.
    pub fn includes(&self, message_level: LoggingLevel) -> bool {
        message_level.severity() <= self.severity()
    }
}

/// `logging/setLevel` request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLevelParams {
    pub level: LoggingLevel,
}

/// `notifications/message` parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingMessageParams {
    pub level: LoggingLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    pub data: Value,
}

impl LoggingMessageParams {
    pub fn new(level: LoggingLevel, data: Value) -> Self {
        Self {
            level,
            logger: None,
            data,
        }
    }

    pub fn with_logger(mut self, logger: impl Into<String>) -> Self {
        self.logger = Some(logger.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&LoggingLevel::Warning).unwrap(), "\"warning\"");
        let level: LoggingLevel = serde_json::from_str("\"emergency\"").unwrap();
        assert_eq!(level, LoggingLevel::Emergency);
    }

    #[test]
    fn test_threshold_filtering() {
        let threshold = LoggingLevel::Warning;
        assert!(threshold.includes(LoggingLevel::Error));
        assert!(threshold.includes(LoggingLevel::Warning));
        assert!(!threshold.includes(LoggingLevel::Info));
        assert!(!threshold.includes(LoggingLevel::Debug));
    }

    #[test]
    fn test_debug_threshold_accepts_everything() {
        let threshold = LoggingLevel::Debug;
        assert!(threshold.includes(LoggingLevel::Debug));
        assert!(threshold.includes(LoggingLevel::Emergency));
    }

    #[test]
    fn test_message_params_shape() {
        let params = LoggingMessageParams::new(LoggingLevel::Info, json!("ready"))
            .with_logger("kestrel");
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value, json!({"level": "info", "logger": "kestrel", "data": "ready"}));
    }
}
