//! Method handlers for the MCP routing table.
//!
//! Each handler owns one method family and is registered with the
//! dispatcher by the server builder. Handlers parse their own params,
//! consult the registry, and return domain values or `McpError`s; the
//! dispatcher turns both into wire envelopes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use kestrel_mcp_protocol::{
    CallToolParams, CallToolResult, CompleteParams, CompleteResult, Completion,
    CompletionReference, Content, Cursor, GetPromptParams, GetPromptResult, Implementation,
    InitializeParams, InitializeResult, ListPromptsResult, ListResourceTemplatesResult,
    ListResourcesResult, ListToolsResult, McpError, McpResult, ProtocolVersion,
    ReadResourceParams, ReadResourceResult, ServerCapabilities, SubscribeParams, UnsubscribeParams,
    cursor::paginate, logging::SetLevelParams, methods,
};

use crate::dispatch::{McpHandler, RequestContext};
use crate::format::{format_prompt_output, format_resource_output, format_tool_output};
use crate::marshal::marshal_arguments;
use crate::registry::Registry;

pub type SharedRegistry = Arc<RwLock<Registry>>;

fn parse_params<T: serde::de::DeserializeOwned>(method: &str, params: Option<Value>) -> McpResult<T> {
    let params = params.ok_or_else(|| {
        McpError::invalid_params(format!("Missing parameters for {}", method))
    })?;
    serde_json::from_value(params)
        .map_err(|err| McpError::invalid_params(format!("Invalid parameters for {}: {}", method, err)))
}

/// Decode the opaque cursor from list-request params; absent means start.
fn cursor_offset(params: &Option<Value>) -> McpResult<usize> {
    let Some(cursor) = params
        .as_ref()
        .and_then(|p| p.get("cursor"))
        .and_then(Value::as_str)
    else {
        return Ok(0);
    };
    Cursor::decode(cursor).ok_or_else(|| McpError::invalid_params("Invalid cursor"))
}

fn to_value<T: serde::Serialize>(value: T) -> McpResult<Value> {
    serde_json::to_value(value).map_err(McpError::from)
}

// ----------------------------------------------------------------------
// initialize / notifications/initialized / ping
// ----------------------------------------------------------------------

/// Handles `initialize`: version negotiation and handshake bookkeeping.
pub struct InitializeHandler {
    server_info: Implementation,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
}

impl InitializeHandler {
    pub fn new(
        server_info: Implementation,
        capabilities: ServerCapabilities,
        instructions: Option<String>,
    ) -> Self {
        Self {
            server_info,
            capabilities,
            instructions,
        }
    }
}

#[async_trait]
impl McpHandler for InitializeHandler {
    async fn handle(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> McpResult<Value> {
        let request: InitializeParams = parse_params(method, params)?;
        let negotiated = ProtocolVersion::negotiate(&request.protocol_version);
        if negotiated.as_str() != request.protocol_version {
            debug!(
                "client requested protocol {}, answering with {}",
                request.protocol_version, negotiated
            );
        }

        ctx.sessions
            .store()
            .record_handshake(&ctx.session_id, request.client_info.clone(), negotiated)
            .await
            .map_err(|err| McpError::internal(err.to_string()))?;

        debug!(
            "session {} initialize from {} v{}",
            ctx.session_id, request.client_info.name, request.client_info.version
        );

        let mut result =
            InitializeResult::new(negotiated, self.capabilities.clone(), self.server_info.clone());
        if let Some(instructions) = &self.instructions {
            result = result.with_instructions(instructions.clone());
        }
        to_value(result)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::INITIALIZE.to_string()]
    }
}

/// Handles `notifications/initialized`: completes the handshake.
pub struct InitializedNotificationHandler;

#[async_trait]
impl McpHandler for InitializedNotificationHandler {
    async fn handle(
        &self,
        _method: &str,
        _params: Option<Value>,
        ctx: &RequestContext,
    ) -> McpResult<Value> {
        let session = ctx
            .sessions
            .session(&ctx.session_id)
            .await
            .ok_or_else(|| McpError::internal("session vanished during handshake"))?;

        if !session.handshake_received() {
            warn!(
                "session {} sent notifications/initialized before initialize",
                ctx.session_id
            );
            return Err(McpError::SessionNotInitialized);
        }

        ctx.sessions
            .store()
            .mark_initialized(&ctx.session_id)
            .await
            .map_err(|err| McpError::internal(err.to_string()))?;
        debug!("session {} completed the initialize handshake", ctx.session_id);
        Ok(Value::Null)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::NOTIFICATION_INITIALIZED.to_string()]
    }
}

/// Handles `ping` with an empty result.
pub struct PingHandler;

#[async_trait]
impl McpHandler for PingHandler {
    async fn handle(
        &self,
        _method: &str,
        _params: Option<Value>,
        _ctx: &RequestContext,
    ) -> McpResult<Value> {
        Ok(json!({}))
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::PING.to_string()]
    }
}

// ----------------------------------------------------------------------
// tools/*
// ----------------------------------------------------------------------

/// Handles `tools/list` and `tools/call`.
pub struct ToolsHandler {
    registry: SharedRegistry,
    page_size: usize,
}

impl ToolsHandler {
    pub fn new(registry: SharedRegistry, page_size: usize) -> Self {
        Self { registry, page_size }
    }

    async fn list(&self, params: Option<Value>) -> McpResult<Value> {
        let offset = cursor_offset(&params)?;
        let tools = self.registry.read().await.list_tools();
        let (page, next_cursor) = paginate(&tools, offset, self.page_size);
        to_value(ListToolsResult {
            tools: page,
            next_cursor,
        })
    }

    async fn call(&self, params: Option<Value>) -> McpResult<Value> {
        let call: CallToolParams = parse_params(methods::TOOLS_CALL, params)?;

        let entry = self
            .registry
            .read()
            .await
            .find_tool(&call.name)
            .cloned()
            .ok_or_else(|| McpError::ToolNotFound(call.name.clone()))?;

        let supplied = call.arguments.unwrap_or_default();
        let args = marshal_arguments(&entry.params, &supplied)?;

        // Execution failures are successful responses flagged isError;
        // JSON-RPC errors are reserved for protocol problems.
        let result = match entry.handler.call(args).await {
            Ok(output) => CallToolResult::success(format_tool_output(output)),
            Err(err) => {
                debug!("tool {} failed: {}", call.name, err);
                CallToolResult::error(vec![Content::text(err.to_string())])
            }
        };
        to_value(result)
    }
}

#[async_trait]
impl McpHandler for ToolsHandler {
    async fn handle(
        &self,
        method: &str,
        params: Option<Value>,
        _ctx: &RequestContext,
    ) -> McpResult<Value> {
        match method {
            methods::TOOLS_LIST => self.list(params).await,
            methods::TOOLS_CALL => self.call(params).await,
            other => Err(McpError::invalid_params(format!("unexpected method {}", other))),
        }
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::TOOLS_LIST.to_string(), methods::TOOLS_CALL.to_string()]
    }
}

// ----------------------------------------------------------------------
// resources/*
// ----------------------------------------------------------------------

/// Handles listing, reading, subscribing and unsubscribing resources.
pub struct ResourcesHandler {
    registry: SharedRegistry,
    capabilities: ServerCapabilities,
    page_size: usize,
}

impl ResourcesHandler {
    pub fn new(registry: SharedRegistry, capabilities: ServerCapabilities, page_size: usize) -> Self {
        Self {
            registry,
            capabilities,
            page_size,
        }
    }

    async fn list(&self, params: Option<Value>) -> McpResult<Value> {
        let offset = cursor_offset(&params)?;
        let resources = self.registry.read().await.list_resources();
        let (page, next_cursor) = paginate(&resources, offset, self.page_size);
        to_value(ListResourcesResult {
            resources: page,
            next_cursor,
        })
    }

    async fn list_templates(&self, params: Option<Value>) -> McpResult<Value> {
        let offset = cursor_offset(&params)?;
        let templates = self.registry.read().await.list_templates();
        let (page, next_cursor) = paginate(&templates, offset, self.page_size);
        to_value(ListResourceTemplatesResult {
            resource_templates: page,
            next_cursor,
        })
    }

    async fn read(&self, params: Option<Value>) -> McpResult<Value> {
        let read: ReadResourceParams = parse_params(methods::RESOURCES_READ, params)?;

        // Exact URI match first, template match on miss.
        enum Matched {
            Exact(crate::registry::ResourceEntry),
            Template(crate::registry::TemplateEntry, HashMap<String, String>),
        }

        let matched = {
            let registry = self.registry.read().await;
            if let Some(entry) = registry.find_resource(&read.uri) {
                Some(Matched::Exact(entry.clone()))
            } else {
                registry
                    .match_template(&read.uri)
                    .map(|(entry, vars)| Matched::Template(entry.clone(), vars))
            }
        };

        let contents = match matched {
            Some(Matched::Exact(entry)) => {
                let output = entry.handler.read(&read.uri).await?;
                format_resource_output(&read.uri, entry.resource.mime_type.as_deref(), output)?
            }
            Some(Matched::Template(entry, vars)) => {
                let output = entry.handler.read(&read.uri, vars).await?;
                format_resource_output(&read.uri, entry.template.mime_type.as_deref(), output)?
            }
            None => return Err(McpError::ResourceNotFound(read.uri)),
        };

        to_value(ReadResourceResult { contents })
    }

    async fn subscribe(&self, params: Option<Value>, ctx: &RequestContext) -> McpResult<Value> {
        if !self.capabilities.supports_subscribe() {
            return Err(McpError::CapabilityNotSupported(
                methods::RESOURCES_SUBSCRIBE.to_string(),
            ));
        }
        let subscribe: SubscribeParams = parse_params(methods::RESOURCES_SUBSCRIBE, params)?;
        ctx.sessions
            .store()
            .subscribe(&ctx.session_id, &subscribe.uri)
            .await
            .map_err(|err| McpError::internal(err.to_string()))?;
        debug!("session {} subscribed to {}", ctx.session_id, subscribe.uri);
        Ok(json!({}))
    }

    async fn unsubscribe(&self, params: Option<Value>, ctx: &RequestContext) -> McpResult<Value> {
        if !self.capabilities.supports_subscribe() {
            return Err(McpError::CapabilityNotSupported(
                methods::RESOURCES_UNSUBSCRIBE.to_string(),
            ));
        }
        let unsubscribe: UnsubscribeParams = parse_params(methods::RESOURCES_UNSUBSCRIBE, params)?;
        ctx.sessions
            .store()
            .unsubscribe(&ctx.session_id, &unsubscribe.uri)
            .await
            .map_err(|err| McpError::internal(err.to_string()))?;
        Ok(json!({}))
    }
}

#[async_trait]
impl McpHandler for ResourcesHandler {
    async fn handle(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> McpResult<Value> {
        match method {
            methods::RESOURCES_LIST => self.list(params).await,
            methods::RESOURCES_TEMPLATES_LIST => self.list_templates(params).await,
            methods::RESOURCES_READ => self.read(params).await,
            methods::RESOURCES_SUBSCRIBE => self.subscribe(params, ctx).await,
            methods::RESOURCES_UNSUBSCRIBE => self.unsubscribe(params, ctx).await,
            other => Err(McpError::invalid_params(format!("unexpected method {}", other))),
        }
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![
            methods::RESOURCES_LIST.to_string(),
            methods::RESOURCES_TEMPLATES_LIST.to_string(),
            methods::RESOURCES_READ.to_string(),
            methods::RESOURCES_SUBSCRIBE.to_string(),
            methods::RESOURCES_UNSUBSCRIBE.to_string(),
        ]
    }
}

// ----------------------------------------------------------------------
// prompts/*
// ----------------------------------------------------------------------

/// Handles `prompts/list` and `prompts/get`.
pub struct PromptsHandler {
    registry: SharedRegistry,
    page_size: usize,
}

impl PromptsHandler {
    pub fn new(registry: SharedRegistry, page_size: usize) -> Self {
        Self { registry, page_size }
    }

    async fn list(&self, params: Option<Value>) -> McpResult<Value> {
        let offset = cursor_offset(&params)?;
        let prompts = self.registry.read().await.list_prompts();
        let (page, next_cursor) = paginate(&prompts, offset, self.page_size);
        to_value(ListPromptsResult {
            prompts: page,
            next_cursor,
        })
    }

    async fn get(&self, params: Option<Value>) -> McpResult<Value> {
        let get: GetPromptParams = parse_params(methods::PROMPTS_GET, params)?;

        let entry = self
            .registry
            .read()
            .await
            .find_prompt(&get.name)
            .cloned()
            .ok_or_else(|| McpError::PromptNotFound(get.name.clone()))?;

        let args = get.arguments.unwrap_or_default();
        for argument in &entry.prompt.arguments {
            if argument.is_required() && !args.contains_key(&argument.name) {
                return Err(McpError::missing_param(argument.name.clone()));
            }
        }

        let output = entry.handler.render(args).await?;
        let messages = format_prompt_output(output)?;
        to_value(GetPromptResult {
            description: entry.prompt.description.clone(),
            messages,
        })
    }
}

#[async_trait]
impl McpHandler for PromptsHandler {
    async fn handle(
        &self,
        method: &str,
        params: Option<Value>,
        _ctx: &RequestContext,
    ) -> McpResult<Value> {
        match method {
            methods::PROMPTS_LIST => self.list(params).await,
            methods::PROMPTS_GET => self.get(params).await,
            other => Err(McpError::invalid_params(format!("unexpected method {}", other))),
        }
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::PROMPTS_LIST.to_string(), methods::PROMPTS_GET.to_string()]
    }
}

// ----------------------------------------------------------------------
// completion/complete
// ----------------------------------------------------------------------

/// Handles `completion/complete` against prompt arguments and template
/// variables.
pub struct CompletionHandler {
    registry: SharedRegistry,
    page_size: usize,
}

impl CompletionHandler {
    pub fn new(registry: SharedRegistry, page_size: usize) -> Self {
        Self { registry, page_size }
    }
}

#[async_trait]
impl McpHandler for CompletionHandler {
    async fn handle(
        &self,
        method: &str,
        params: Option<Value>,
        _ctx: &RequestContext,
    ) -> McpResult<Value> {
        let complete: CompleteParams = parse_params(method, params)?;

        let source = match &complete.reference {
            CompletionReference::Prompt { name } => {
                let registry = self.registry.read().await;
                let entry = registry
                    .find_prompt(name)
                    .ok_or_else(|| McpError::PromptNotFound(name.clone()))?;
                if entry.prompt.argument(&complete.argument.name).is_none() {
                    return Err(McpError::invalid_params(format!(
                        "Prompt '{}' has no argument '{}'",
                        name, complete.argument.name
                    )));
                }
                entry.completions.get(&complete.argument.name).cloned()
            }
            CompletionReference::Resource { uri } => {
                let registry = self.registry.read().await;
                let entry = registry
                    .find_template(uri)
                    .ok_or_else(|| McpError::ResourceNotFound(uri.clone()))?;
                if !entry.compiled.variables().contains(&complete.argument.name) {
                    return Err(McpError::invalid_params(format!(
                        "Template '{}' has no variable '{}'",
                        uri, complete.argument.name
                    )));
                }
                entry.completions.get(&complete.argument.name).cloned()
            }
        };

        let completion = match source {
            Some(source) => source.complete(&complete.argument.value, self.page_size).await?,
            None => Completion::new(Vec::new()),
        };
        to_value(CompleteResult { completion })
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::COMPLETION_COMPLETE.to_string()]
    }
}

// ----------------------------------------------------------------------
// logging/setLevel
// ----------------------------------------------------------------------

/// Handles `logging/setLevel`, persisting the session's threshold.
pub struct LoggingHandler;

#[async_trait]
impl McpHandler for LoggingHandler {
    async fn handle(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> McpResult<Value> {
        let set_level: SetLevelParams = parse_params(method, params)?;
        ctx.sessions
            .store()
            .set_log_level(&ctx.session_id, set_level.level)
            .await
            .map_err(|err| McpError::internal(err.to_string()))?;
        debug!("session {} set log level {:?}", ctx.session_id, set_level.level);
        Ok(json!({}))
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::LOGGING_SET_LEVEL.to_string()]
    }
}
