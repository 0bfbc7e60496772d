//! # Attribute macros for kestrel MCP servers
//!
//! Annotate async functions to turn them into discoverable catalog
//! elements. Each attribute generates a handler type implementing the
//! matching `kestrel-mcp-server` trait plus an inventory registration
//! record the discoverer harvests at startup.
//!
//! ```rust,ignore
//! /// Greets a user by name.
//! #[mcp_tool]
//! async fn greet_user(name: String, count: Option<i64>) -> McpResult<String> {
//!     Ok(format!("Hello, {}!", name))
//! }
//! ```
//!
//! The element name defaults to the function identifier and the
//! description to the doc-comment summary; both can be overridden with
//! `name = "…"` / `description = "…"` attribute arguments. Parameters may
//! carry `#[param(description = "…")]` and, on prompts and templates,
//! `#[complete("a", "b")]` value lists.

mod prompt;
mod resource;
mod template;
mod tool;
mod util;

use proc_macro::TokenStream;
use syn::{ItemFn, Meta, Token, parse_macro_input, punctuated::Punctuated};

type MetaArgs = Punctuated<Meta, Token![,]>;

/// Expose an async function as an MCP tool.
///
/// Arguments: `name`, `description`, `title`, `read_only`, `destructive`,
/// `idempotent`, `open_world` (annotation hints).
#[proc_macro_attribute]
pub fn mcp_tool(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with MetaArgs::parse_terminated);
    let input = parse_macro_input!(input as ItemFn);
    tool::expand(args, input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

/// Expose an async function as an MCP resource.
///
/// Arguments: `uri` (required), `name`, `description`, `mime_type`, `size`.
#[proc_macro_attribute]
pub fn mcp_resource(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with MetaArgs::parse_terminated);
    let input = parse_macro_input!(input as ItemFn);
    resource::expand(args, input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

/// Expose an async function as an MCP resource template. Function
/// parameters bind template variables by name; a parameter named `uri`
/// receives the original request URI.
///
/// Arguments: `uri_template` (required), `name`, `description`, `mime_type`.
#[proc_macro_attribute]
pub fn mcp_resource_template(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with MetaArgs::parse_terminated);
    let input = parse_macro_input!(input as ItemFn);
    template::expand(args, input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

/// Expose an async function as an MCP prompt. Function parameters become
/// prompt arguments (`Option<String>` ones optional).
///
/// Arguments: `name`, `description`.
#[proc_macro_attribute]
pub fn mcp_prompt(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with MetaArgs::parse_terminated);
    let input = parse_macro_input!(input as ItemFn);
    prompt::expand(args, input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
