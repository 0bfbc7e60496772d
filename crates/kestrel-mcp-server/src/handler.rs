//! Handler traits for the four catalog element kinds.
//!
//! Handlers return loosely-shaped output; the response formatter normalizes
//! it. A tool-execution failure is returned as `Err`, which `tools/call`
//! surfaces as an `isError: true` result rather than a JSON-RPC error.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use kestrel_mcp_protocol::McpResult;

use crate::format::{PromptOutput, ResourceOutput, ToolOutput};
use crate::marshal::Arguments;

/// Executes a tool call with marshalled arguments.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Arguments) -> McpResult<ToolOutput>;
}

/// Reads a concrete resource.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(&self, uri: &str) -> McpResult<ResourceOutput>;
}

/// Reads a templated resource. `uri` is the original request URI; `vars`
/// are the per-segment template captures.
#[async_trait]
pub trait TemplateHandler: Send + Sync {
    async fn read(&self, uri: &str, vars: HashMap<String, String>) -> McpResult<ResourceOutput>;
}

/// Renders a prompt from its named arguments.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn render(&self, args: HashMap<String, Value>) -> McpResult<PromptOutput>;
}

/// Blanket adapters so closures can serve as handlers without a named type.
pub mod functions {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;

    type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

    pub struct FnToolHandler<F>(pub F);

    #[async_trait]
    impl<F> ToolHandler for FnToolHandler<F>
    where
        F: Fn(Arguments) -> BoxFuture<McpResult<ToolOutput>> + Send + Sync,
    {
        async fn call(&self, args: Arguments) -> McpResult<ToolOutput> {
            (self.0)(args).await
        }
    }

    pub struct FnResourceHandler<F>(pub F);

    #[async_trait]
    impl<F> ResourceHandler for FnResourceHandler<F>
    where
        F: Fn(String) -> BoxFuture<McpResult<ResourceOutput>> + Send + Sync,
    {
        async fn read(&self, uri: &str) -> McpResult<ResourceOutput> {
            (self.0)(uri.to_string()).await
        }
    }

    pub struct FnTemplateHandler<F>(pub F);

    #[async_trait]
    impl<F> TemplateHandler for FnTemplateHandler<F>
    where
        F: Fn(String, HashMap<String, String>) -> BoxFuture<McpResult<ResourceOutput>> + Send + Sync,
    {
        async fn read(&self, uri: &str, vars: HashMap<String, String>) -> McpResult<ResourceOutput> {
            (self.0)(uri.to_string(), vars).await
        }
    }

    pub struct FnPromptHandler<F>(pub F);

    #[async_trait]
    impl<F> PromptHandler for FnPromptHandler<F>
    where
        F: Fn(HashMap<String, Value>) -> BoxFuture<McpResult<PromptOutput>> + Send + Sync,
    {
        async fn render(&self, args: HashMap<String, Value>) -> McpResult<PromptOutput> {
            (self.0)(args).await
        }
    }
}
