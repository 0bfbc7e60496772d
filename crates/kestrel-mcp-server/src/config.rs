//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use kestrel_mcp_protocol::ServerCapabilities;

/// Recognized options for a kestrel MCP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_name: String,
    pub server_version: String,
    /// Optional instructions returned from `initialize`.
    pub instructions: Option<String>,
    /// Explicit capabilities; `None` derives them from registry contents.
    pub capabilities: Option<ServerCapabilities>,
    /// Registry cache file; `None` disables caching.
    pub cache_path: Option<PathBuf>,
    /// Session idle TTL before GC collects it.
    pub session_ttl: Duration,
    /// GC sweep period.
    pub gc_interval: Duration,
    /// Page size for the paginated list endpoints.
    pub page_size: usize,
    pub http_host: String,
    pub http_port: u16,
    /// URL prefix for the HTTP endpoints (`{prefix}/sse`, `{prefix}/message`).
    pub http_path_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: "kestrel-mcp".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
            capabilities: None,
            cache_path: None,
            session_ttl: Duration::from_secs(3600),
            gc_interval: Duration::from_secs(300),
            page_size: 50,
            http_host: "127.0.0.1".to_string(),
            http_port: 8080,
            http_path_prefix: "/mcp".to_string(),
        }
    }
}
