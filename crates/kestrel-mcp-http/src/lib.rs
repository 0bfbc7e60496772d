//! # HTTP+SSE transport for MCP servers
//!
//! Two endpoints under a configurable prefix:
//!
//! - `GET {prefix}/sse` opens a session and a Server-Sent-Events stream.
//!   The first event is `event: endpoint` carrying the POST URL with
//!   `?clientId=<session>` appended; every outbound frame then arrives as
//!   `event: message`.
//! - `POST {prefix}/message?clientId=…` accepts one JSON-RPC message or
//!   batch and returns `202 Accepted` immediately; the responses ride the
//!   SSE stream.
//!
//! The transport implements [`kestrel_mcp_session::Transport`], so the
//! server's run loop drives it exactly like stdio.

pub mod config;
pub mod service;
pub mod sse;
pub mod transport;

pub use config::HttpServerConfig;
pub use transport::HttpSseTransport;

/// Result type for HTTP transport operations
pub type Result<T> = std::result::Result<T, HttpTransportError>;

/// HTTP transport errors
#[derive(Debug, thiserror::Error)]
pub enum HttpTransportError {
    #[error("bind failed: {0}")]
    Bind(std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session error: {0}")]
    Session(#[from] kestrel_mcp_session::SessionStoreError),
}
