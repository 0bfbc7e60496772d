//! # JSON-RPC 2.0 for MCP
//!
//! Envelope types and framing-level message classification for a JSON-RPC 2.0
//! server. This crate is transport agnostic: it knows how to parse a frame
//! into requests, notifications and batches, and how to serialize responses
//! and errors, but nothing about methods or sessions.
//!
//! The dispatcher owns the protocol: handlers never build error envelopes
//! themselves, they return domain errors that the dispatcher converts.

pub mod envelope;
pub mod message;

pub use envelope::{
    JsonRpcError, JsonRpcErrorObject, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    OutboundMessage, RequestId,
};
pub use message::{Incoming, Payload, classify, parse_payload};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes, plus the server-to-client codes MCP reserves
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Server closed the connection (server -> client)
    pub const CONNECTION_CLOSED: i64 = -32000;
    /// Request timed out (server -> client)
    pub const REQUEST_TIMEOUT: i64 = -32001;
}
