//! # Model Context Protocol types
//!
//! Data types for the MCP wire protocol: catalog descriptors (tools,
//! resources, resource templates, prompts), content envelopes, the
//! initialize handshake, notifications, logging levels and pagination
//! cursors, plus the `McpError` taxonomy the dispatcher converts into
//! JSON-RPC error objects.
//!
//! Everything here is passive data; behavior lives in the server crate.

pub mod completion;
pub mod content;
pub mod cursor;
pub mod initialize;
pub mod logging;
pub mod methods;
pub mod notifications;
pub mod prompts;
pub mod resources;
pub mod tools;
pub mod version;

pub use completion::{
    CompleteArgument, CompleteParams, CompleteResult, Completion, CompletionReference,
};
pub use content::{
    Annotations, BlobResourceContents, Content, EmbeddedResource, ResourceContents,
    TextResourceContents,
};
pub use cursor::Cursor;
pub use initialize::{
    ClientCapabilities, Implementation, InitializeParams, InitializeResult, LoggingCapability,
    PromptsCapability, ResourcesCapability, ServerCapabilities, ToolsCapability,
};
pub use logging::{LoggingLevel, LoggingMessageParams, SetLevelParams};
pub use notifications::ResourceUpdatedParams;
pub use prompts::{
    GetPromptParams, GetPromptResult, ListPromptsResult, Prompt, PromptArgument, PromptMessage,
    Role,
};
pub use resources::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceParams, ReadResourceResult,
    Resource, ResourceTemplate, SubscribeParams, UnsubscribeParams,
};
pub use tools::{CallToolParams, CallToolResult, ListToolsResult, Tool, ToolAnnotations, ToolSchema};
pub use version::ProtocolVersion;

use kestrel_mcp_json_rpc::JsonRpcErrorObject;

/// Common result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// MCP-level errors. Handlers return these; the dispatcher converts them to
/// JSON-RPC error envelopes via [`McpError::to_error_object`]. Messages stay
/// safe for the wire: no paths, no stack traces.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid value for parameter '{param}': expected {expected}, got {actual}")]
    InvalidParameterType {
        param: String,
        expected: String,
        actual: String,
    },

    #[error("Session not initialized")]
    SessionNotInitialized,

    #[error("Capability not supported: {0}")]
    CapabilityNotSupported(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    pub fn missing_param(param: impl Into<String>) -> Self {
        Self::MissingParameter(param.into())
    }

    pub fn invalid_param_type(
        param: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidParameterType {
            param: param.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Convert to a JSON-RPC error object.
    ///
    /// Routing and argument failures map to -32602, lifecycle violations to
    /// -32600, capability refusals to -32601, everything else to -32603.
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            McpError::ToolNotFound(_)
            | McpError::ResourceNotFound(_)
            | McpError::PromptNotFound(_)
            | McpError::InvalidParams(_)
            | McpError::MissingParameter(_)
            | McpError::InvalidParameterType { .. } => {
                JsonRpcErrorObject::invalid_params(self.to_string())
            }

            McpError::SessionNotInitialized => {
                JsonRpcErrorObject::invalid_request("Session not initialized")
            }

            McpError::CapabilityNotSupported(method) => {
                JsonRpcErrorObject::method_not_found(method)
            }

            McpError::Internal(_) | McpError::Configuration(_) => {
                JsonRpcErrorObject::internal_error(self.to_string())
            }

            McpError::Serialization(err) => {
                JsonRpcErrorObject::internal_error(format!("Serialization error: {}", err))
            }

            McpError::Io(err) => {
                JsonRpcErrorObject::internal_error(format!("IO error: {}", err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_errors_map_to_invalid_params() {
        let err = McpError::ToolNotFound("nope".to_string());
        let obj = err.to_error_object();
        assert_eq!(obj.code, -32602);
        assert_eq!(obj.message, "Tool not found: nope");
    }

    #[test]
    fn test_argument_errors_name_the_parameter() {
        let err = McpError::invalid_param_type("count", "integer", "string \"3.5\"");
        let obj = err.to_error_object();
        assert_eq!(obj.code, -32602);
        assert!(obj.message.contains("count"));
    }

    #[test]
    fn test_lifecycle_gate_maps_to_invalid_request() {
        let obj = McpError::SessionNotInitialized.to_error_object();
        assert_eq!(obj.code, -32600);
        assert_eq!(obj.message, "Session not initialized");
    }

    #[test]
    fn test_capability_refusal_maps_to_method_not_found() {
        let obj = McpError::CapabilityNotSupported("resources/subscribe".to_string()).to_error_object();
        assert_eq!(obj.code, -32601);
    }

    #[test]
    fn test_internal_errors() {
        let obj = McpError::internal("handler panicked politely").to_error_object();
        assert_eq!(obj.code, -32603);
    }
}
