//! HTTP transport configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    /// URL prefix for both endpoints, e.g. `/mcp` gives `/mcp/sse` and
    /// `/mcp/message`.
    pub path_prefix: String,
    /// Interval between SSE keep-alive comments.
    pub keep_alive: Duration,
    /// Maximum accepted POST body size.
    pub max_body_size: usize,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            path_prefix: "/mcp".to_string(),
            keep_alive: Duration::from_secs(15),
            max_body_size: 4 * 1024 * 1024,
        }
    }
}

impl HttpServerConfig {
    pub fn sse_path(&self) -> String {
        format!("{}/sse", self.path_prefix.trim_end_matches('/'))
    }

    pub fn message_path(&self) -> String {
        format!("{}/message", self.path_prefix.trim_end_matches('/'))
    }
}
