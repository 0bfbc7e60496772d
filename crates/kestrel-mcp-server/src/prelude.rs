//! Convenience re-exports for server applications.

pub use crate::builder::{McpServerBuilder, PromptDef, ResourceDef, TemplateDef, ToolDef};
pub use crate::completion::{CompletionProvider, CompletionSource};
pub use crate::format::{PromptOutput, ResourceOutput, ToolOutput};
pub use crate::handler::{PromptHandler, ResourceHandler, TemplateHandler, ToolHandler};
pub use crate::marshal::Arguments;
pub use crate::schema_gen::{ParamKind, ParamSpec};
pub use crate::server::McpServer;

pub use kestrel_mcp_protocol::{
    Content, LoggingLevel, McpError, McpResult, PromptArgument, PromptMessage, ResourceContents,
    Role, ServerCapabilities,
};
