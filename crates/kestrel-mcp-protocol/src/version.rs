//! MCP protocol versions and negotiation support.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Protocol revisions this server understands, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[serde(rename = "2024-11-05")]
    V2024_11_05,
    #[serde(rename = "2025-03-26")]
    V2025_03_26,
    #[serde(rename = "2025-06-18")]
    V2025_06_18,
}

impl ProtocolVersion {
    /// The newest revision the server speaks; used as the negotiation
    /// fallback when a client requests an unknown version.
    pub const LATEST: ProtocolVersion = ProtocolVersion::V2025_06_18;

    pub const ALL: [ProtocolVersion; 3] = [
        ProtocolVersion::V2024_11_05,
        ProtocolVersion::V2025_03_26,
        ProtocolVersion::V2025_06_18,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V2024_11_05 => "2024-11-05",
            ProtocolVersion::V2025_03_26 => "2025-03-26",
            ProtocolVersion::V2025_06_18 => "2025-06-18",
        }
    }

    /// Pick the version to answer an initialize request with: the client's
    /// version when supported, otherwise the latest supported one.
    pub fn negotiate(requested: &str) -> ProtocolVersion {
        requested.parse().unwrap_or(ProtocolVersion::LATEST)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2024-11-05" => Ok(ProtocolVersion::V2024_11_05),
            "2025-03-26" => Ok(ProtocolVersion::V2025_03_26),
            "2025-06-18" => Ok(ProtocolVersion::V2025_06_18),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for version in ProtocolVersion::ALL {
            assert_eq!(version.as_str().parse::<ProtocolVersion>(), Ok(version));
        }
    }

    #[test]
    fn test_negotiate_known_version() {
        assert_eq!(
            ProtocolVersion::negotiate("2024-11-05"),
            ProtocolVersion::V2024_11_05
        );
    }

    #[test]
    fn test_negotiate_unknown_falls_back_to_latest() {
        assert_eq!(ProtocolVersion::negotiate("1999-01-01"), ProtocolVersion::LATEST);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&ProtocolVersion::V2025_06_18).unwrap();
        assert_eq!(json, "\"2025-06-18\"");
    }
}
