//! Builder API: manual registration and server wiring.
//!
//! Manual declarations go through the `*Def` builders below and register
//! with `is_manual = true`; attribute-discovered elements join them when
//! discovery is enabled. A malformed manual registration aborts `build()`
//! with a configuration error, so it is never observed at runtime.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use kestrel_mcp_protocol::{
    Implementation, McpError, McpResult, Prompt, PromptArgument, Resource, ResourceTemplate,
    ServerCapabilities, Tool, ToolAnnotations,
};
use kestrel_mcp_session::{InMemorySessionStore, SessionManager};

use crate::completion::CompletionSource;
use crate::config::ServerConfig;
use crate::discovery;
use crate::dispatch::Dispatcher;
use crate::format::{PromptOutput, ResourceOutput, ToolOutput};
use crate::handler::functions::{
    FnPromptHandler, FnResourceHandler, FnTemplateHandler, FnToolHandler,
};
use crate::handler::{PromptHandler, ResourceHandler, TemplateHandler, ToolHandler};
use crate::handlers::{
    CompletionHandler, InitializeHandler, InitializedNotificationHandler, LoggingHandler,
    PingHandler, PromptsHandler, ResourcesHandler, ToolsHandler,
};
use crate::marshal::Arguments;
use crate::registry::{
    PromptEntry, Registry, RegistryCache, ResourceEntry, TemplateEntry, ToolEntry,
};
use crate::schema_gen::{ParamSpec, generate_input_schema};
use crate::server::McpServer;
use crate::uri_template::UriTemplate;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A manually declared tool.
pub struct ToolDef {
    name: String,
    description: Option<String>,
    annotations: Option<ToolAnnotations>,
    params: Vec<ParamSpec>,
    handler: Option<Arc<dyn ToolHandler>>,
}

impl ToolDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            annotations: None,
            params: Vec::new(),
            handler: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn handler(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn handler_fn<F>(self, f: F) -> Self
    where
        F: Fn(Arguments) -> BoxFuture<McpResult<ToolOutput>> + Send + Sync + 'static,
    {
        self.handler(Arc::new(FnToolHandler(f)))
    }

    fn into_entry(self) -> McpResult<ToolEntry> {
        let handler = self.handler.ok_or_else(|| {
            McpError::configuration(format!("tool '{}' has no handler", self.name))
        })?;
        let mut tool = Tool::new(self.name, generate_input_schema(&self.params));
        if let Some(description) = self.description {
            tool = tool.with_description(description);
        }
        if let Some(annotations) = self.annotations {
            tool = tool.with_annotations(annotations);
        }
        Ok(ToolEntry {
            tool,
            params: self.params,
            handler,
            handler_id: None,
            is_manual: true,
        })
    }
}

/// A manually declared resource.
pub struct ResourceDef {
    resource: Resource,
    handler: Option<Arc<dyn ResourceHandler>>,
}

impl ResourceDef {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource: Resource::new(uri, name),
            handler: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.resource = self.resource.with_description(description);
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.resource = self.resource.with_mime_type(mime_type);
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.resource = self.resource.with_size(size);
        self
    }

    pub fn handler(mut self, handler: Arc<dyn ResourceHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn handler_fn<F>(self, f: F) -> Self
    where
        F: Fn(String) -> BoxFuture<McpResult<ResourceOutput>> + Send + Sync + 'static,
    {
        self.handler(Arc::new(FnResourceHandler(f)))
    }

    fn into_entry(self) -> McpResult<ResourceEntry> {
        let handler = self.handler.ok_or_else(|| {
            McpError::configuration(format!("resource '{}' has no handler", self.resource.uri))
        })?;
        Ok(ResourceEntry {
            resource: self.resource,
            handler,
            handler_id: None,
            is_manual: true,
        })
    }
}

/// A manually declared resource template.
pub struct TemplateDef {
    template: ResourceTemplate,
    completions: HashMap<String, CompletionSource>,
    handler: Option<Arc<dyn TemplateHandler>>,
}

impl TemplateDef {
    pub fn new(uri_template: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            template: ResourceTemplate::new(uri_template, name),
            completions: HashMap::new(),
            handler: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.template = self.template.with_description(description);
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.template = self.template.with_mime_type(mime_type);
        self
    }

    pub fn completion(mut self, variable: impl Into<String>, source: CompletionSource) -> Self {
        self.completions.insert(variable.into(), source);
        self
    }

    pub fn handler(mut self, handler: Arc<dyn TemplateHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn handler_fn<F>(self, f: F) -> Self
    where
        F: Fn(String, HashMap<String, String>) -> BoxFuture<McpResult<ResourceOutput>>
            + Send
            + Sync
            + 'static,
    {
        self.handler(Arc::new(FnTemplateHandler(f)))
    }

    fn into_entry(self) -> McpResult<TemplateEntry> {
        let handler = self.handler.ok_or_else(|| {
            McpError::configuration(format!(
                "resource template '{}' has no handler",
                self.template.uri_template
            ))
        })?;
        let compiled = UriTemplate::compile(&self.template.uri_template)?;
        for variable in self.completions.keys() {
            if !compiled.variables().contains(variable) {
                return Err(McpError::configuration(format!(
                    "completion for unknown template variable '{}'",
                    variable
                )));
            }
        }
        Ok(TemplateEntry {
            template: self.template,
            compiled,
            handler,
            completions: self.completions,
            handler_id: None,
            is_manual: true,
        })
    }
}

/// A manually declared prompt.
pub struct PromptDef {
    prompt: Prompt,
    completions: HashMap<String, CompletionSource>,
    handler: Option<Arc<dyn PromptHandler>>,
}

impl PromptDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            prompt: Prompt::new(name),
            completions: HashMap::new(),
            handler: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.prompt = self.prompt.with_description(description);
        self
    }

    pub fn argument(mut self, argument: PromptArgument) -> Self {
        self.prompt = self.prompt.with_argument(argument);
        self
    }

    pub fn completion(mut self, argument: impl Into<String>, source: CompletionSource) -> Self {
        self.completions.insert(argument.into(), source);
        self
    }

    pub fn handler(mut self, handler: Arc<dyn PromptHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn handler_fn<F>(self, f: F) -> Self
    where
        F: Fn(HashMap<String, serde_json::Value>) -> BoxFuture<McpResult<PromptOutput>>
            + Send
            + Sync
            + 'static,
    {
        self.handler(Arc::new(FnPromptHandler(f)))
    }

    fn into_entry(self) -> McpResult<PromptEntry> {
        let handler = self.handler.ok_or_else(|| {
            McpError::configuration(format!("prompt '{}' has no handler", self.prompt.name))
        })?;
        for argument in self.completions.keys() {
            if self.prompt.argument(argument).is_none() {
                return Err(McpError::configuration(format!(
                    "completion for unknown prompt argument '{}'",
                    argument
                )));
            }
        }
        Ok(PromptEntry {
            prompt: self.prompt,
            handler,
            completions: self.completions,
            handler_id: None,
            is_manual: true,
        })
    }
}

/// Builds an [`McpServer`].
pub struct McpServerBuilder {
    config: ServerConfig,
    tools: Vec<ToolDef>,
    resources: Vec<ResourceDef>,
    templates: Vec<TemplateDef>,
    prompts: Vec<PromptDef>,
    discovery: bool,
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            tools: Vec::new(),
            resources: Vec::new(),
            templates: Vec::new(),
            prompts: Vec::new(),
            discovery: false,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.server_name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.server_version = version.into();
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.instructions = Some(instructions.into());
        self
    }

    /// Declare capabilities explicitly instead of deriving them from the
    /// registry contents.
    pub fn capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.config.capabilities = Some(capabilities);
        self
    }

    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.config.session_ttl = ttl;
        self
    }

    pub fn gc_interval(mut self, interval: Duration) -> Self {
        self.config.gc_interval = interval;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size.max(1);
        self
    }

    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_path = Some(path.into());
        self
    }

    pub fn http_bind(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.http_host = host.into();
        self.config.http_port = port;
        self
    }

    pub fn http_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.http_path_prefix = prefix.into();
        self
    }

    /// Enable attribute-driven discovery at build time.
    pub fn with_discovery(mut self) -> Self {
        self.discovery = true;
        self
    }

    pub fn tool(mut self, tool: ToolDef) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn resource(mut self, resource: ResourceDef) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn resource_template(mut self, template: TemplateDef) -> Self {
        self.templates.push(template);
        self
    }

    pub fn prompt(mut self, prompt: PromptDef) -> Self {
        self.prompts.push(prompt);
        self
    }

    /// Assemble the server: manual registrations first, then discovery
    /// (cache-assisted), then capability derivation and dispatcher wiring.
    pub fn build(self) -> McpResult<McpServer> {
        let mut registry = Registry::new();
        if let Some(path) = &self.config.cache_path {
            registry.set_cache(RegistryCache::new(path.clone()));
        }

        for def in self.tools {
            registry.register_tool(def.into_entry()?)?;
        }
        for def in self.resources {
            registry.register_resource(def.into_entry()?)?;
        }
        for def in self.templates {
            registry.register_template(def.into_entry()?)?;
        }
        for def in self.prompts {
            registry.register_prompt(def.into_entry()?)?;
        }

        if self.discovery {
            let harvested = discovery::harvest();
            match registry.load_from_cache(&harvested) {
                Some(admitted) => {
                    info!("registry cache hit: {} discovered elements", admitted);
                }
                None => {
                    discovery::register_all(&mut registry, &harvested);
                    registry.save_to_cache();
                }
            }
        }

        let capabilities = self
            .config
            .capabilities
            .clone()
            .unwrap_or_else(|| derive_capabilities(&registry));

        let store = Arc::new(InMemorySessionStore::new());
        let sessions = Arc::new(SessionManager::with_timeouts(
            store,
            self.config.session_ttl,
            self.config.gc_interval,
        ));

        let registry = Arc::new(RwLock::new(registry));
        let server_info =
            Implementation::new(self.config.server_name.clone(), self.config.server_version.clone());

        let mut dispatcher = Dispatcher::new(Arc::clone(&sessions));
        dispatcher.register(Arc::new(InitializeHandler::new(
            server_info,
            capabilities.clone(),
            self.config.instructions.clone(),
        )));
        dispatcher.register(Arc::new(InitializedNotificationHandler));
        dispatcher.register(Arc::new(PingHandler));
        dispatcher.register(Arc::new(ToolsHandler::new(
            Arc::clone(&registry),
            self.config.page_size,
        )));
        dispatcher.register(Arc::new(ResourcesHandler::new(
            Arc::clone(&registry),
            capabilities.clone(),
            self.config.page_size,
        )));
        dispatcher.register(Arc::new(PromptsHandler::new(
            Arc::clone(&registry),
            self.config.page_size,
        )));
        dispatcher.register(Arc::new(CompletionHandler::new(
            Arc::clone(&registry),
            self.config.page_size,
        )));
        dispatcher.register(Arc::new(LoggingHandler));

        Ok(McpServer::new(
            self.config,
            capabilities,
            registry,
            sessions,
            Arc::new(dispatcher),
        ))
    }
}

/// Capabilities implied by what the registry holds.
fn derive_capabilities(registry: &Registry) -> ServerCapabilities {
    let mut capabilities = ServerCapabilities::default().with_logging();
    if registry.tool_count() > 0 {
        capabilities = capabilities.with_tools(true);
    }
    if registry.resource_count() > 0 || registry.template_count() > 0 {
        capabilities = capabilities.with_resources(true, true);
    }
    if registry.prompt_count() > 0 {
        capabilities = capabilities.with_prompts(true);
    }
    capabilities
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_build_minimal_server() {
        let server = McpServerBuilder::new()
            .name("test")
            .version("0.0.1")
            .build()
            .unwrap();
        assert_eq!(server.config().server_name, "test");
    }

    #[tokio::test]
    async fn test_tool_without_handler_is_configuration_error() {
        let result = McpServerBuilder::new().tool(ToolDef::new("broken")).build();
        assert!(matches!(result, Err(McpError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_capabilities_derived_from_registry() {
        let server = McpServerBuilder::new()
            .tool(
                ToolDef::new("greet")
                    .handler_fn(|_args| Box::pin(async { Ok(ToolOutput::from("hi")) })),
            )
            .build()
            .unwrap();

        let caps = server.capabilities();
        assert!(caps.tools.is_some());
        assert!(caps.resources.is_none());
        assert!(caps.prompts.is_none());
        assert!(caps.logging.is_some());
    }

    #[tokio::test]
    async fn test_explicit_capabilities_win() {
        let server = McpServerBuilder::new()
            .capabilities(ServerCapabilities::default())
            .tool(
                ToolDef::new("greet")
                    .handler_fn(|_args| Box::pin(async { Ok(ToolOutput::from("hi")) })),
            )
            .build()
            .unwrap();
        assert!(server.capabilities().tools.is_none());
    }

    #[tokio::test]
    async fn test_template_completion_must_match_variable() {
        let result = McpServerBuilder::new()
            .resource_template(
                TemplateDef::new("user://{id}/profile", "profile")
                    .completion("nope", CompletionSource::Values(vec![]))
                    .handler_fn(|_uri, _vars| {
                        Box::pin(async { Ok(ResourceOutput::Json(json!({}))) })
                    }),
            )
            .build();
        assert!(matches!(result, Err(McpError::Configuration(_))));
    }
}
