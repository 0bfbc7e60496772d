//! # kestrel-mcp-server
//!
//! A framework for building Model Context Protocol servers. The protocol
//! engine lives here: the registry of tools, resources, resource templates
//! and prompts; schema generation and argument marshalling; response
//! formatting; the JSON-RPC dispatcher with its session lifecycle gate; and
//! the stdio transport. HTTP+SSE ships in `kestrel-mcp-http` (re-exported
//! behind the `http` feature), and `kestrel-mcp-derive` provides the
//! attribute macros that feed discovery.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use kestrel_mcp_server::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> McpResult<()> {
//!     let server = McpServer::builder()
//!         .name("greeter")
//!         .version("1.0.0")
//!         .tool(
//!             ToolDef::new("greet_user")
//!                 .description("Greets a user by name")
//!                 .param(ParamSpec::string("name"))
//!                 .handler_fn(|args| {
//!                     Box::pin(async move {
//!                         let name = args.str_arg("name").unwrap_or("world").to_string();
//!                         Ok(ToolOutput::from(format!("Hello, {}!", name)))
//!                     })
//!                 }),
//!         )
//!         .build()?;
//!     server.run_stdio().await
//! }
//! ```

pub mod builder;
pub mod completion;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod format;
pub mod handler;
pub mod handlers;
pub mod marshal;
pub mod registry;
pub mod schema_gen;
pub mod stdio;
pub mod uri_template;

pub mod prelude;

pub use builder::{McpServerBuilder, PromptDef, ResourceDef, TemplateDef, ToolDef};
pub use completion::{CompletionProvider, CompletionSource};
pub use config::ServerConfig;
pub use dispatch::{Dispatcher, McpHandler, RequestContext};
pub use format::{PromptOutput, ResourceOutput, ToolOutput};
pub use handler::{PromptHandler, ResourceHandler, TemplateHandler, ToolHandler};
pub use marshal::Arguments;
pub use registry::{Registry, RegistryCache};
pub use schema_gen::{ParamKind, ParamSpec};
pub use server::McpServer;
pub use stdio::StdioTransport;
pub use uri_template::UriTemplate;

mod server;

// Re-export the foundation crates so applications need only one dependency.
pub use kestrel_mcp_json_rpc as json_rpc;
pub use kestrel_mcp_protocol as protocol;
pub use kestrel_mcp_session as session;

// Re-exported for macro-generated code, so applications depending only on
// this crate can use the derive attributes.
pub use async_trait;
pub use inventory;
pub use serde_json;

#[cfg(feature = "http")]
pub use kestrel_mcp_http as http;

pub use kestrel_mcp_protocol::{McpError, McpResult};
