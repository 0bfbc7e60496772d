//! The assembled MCP server.
//!
//! A server value is built by [`crate::builder::McpServerBuilder`] and owns
//! the registry, the session manager and the dispatcher. There is no
//! process-wide state: everything flows through this value.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use kestrel_mcp_protocol::{LoggingLevel, McpError, McpResult, ServerCapabilities, methods};
use kestrel_mcp_session::{SessionManager, Transport};

use crate::config::ServerConfig;
use crate::discovery;
use crate::dispatch::Dispatcher;
use crate::registry::{CatalogKind, ListChangedSink, Registry};
use crate::stdio::StdioTransport;

/// Broadcasts registry list-changed events to every session.
struct BroadcastSink {
    sessions: Arc<SessionManager>,
}

impl ListChangedSink for BroadcastSink {
    fn list_changed(&self, kind: CatalogKind) {
        let method = match kind {
            CatalogKind::Tools => methods::NOTIFICATION_TOOLS_LIST_CHANGED,
            CatalogKind::Resources => methods::NOTIFICATION_RESOURCES_LIST_CHANGED,
            CatalogKind::Prompts => methods::NOTIFICATION_PROMPTS_LIST_CHANGED,
        };
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            sessions.broadcast_list_changed(method).await;
        });
    }
}

/// A ready-to-run MCP server.
pub struct McpServer {
    config: ServerConfig,
    capabilities: ServerCapabilities,
    registry: Arc<RwLock<Registry>>,
    sessions: Arc<SessionManager>,
    dispatcher: Arc<Dispatcher>,
}

impl McpServer {
    pub(crate) fn new(
        config: ServerConfig,
        capabilities: ServerCapabilities,
        registry: Arc<RwLock<Registry>>,
        sessions: Arc<SessionManager>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            config,
            capabilities,
            registry,
            sessions,
            dispatcher,
        }
    }

    pub fn builder() -> crate::builder::McpServerBuilder {
        crate::builder::McpServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    pub fn registry(&self) -> &Arc<RwLock<Registry>> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Tell subscribed sessions a resource changed.
    pub async fn notify_resource_updated(&self, uri: &str) {
        self.sessions.notify_resource_updated(uri).await;
    }

    /// Emit a `notifications/message` to sessions whose requested level
    /// admits it.
    pub async fn send_log_message(&self, level: LoggingLevel, data: serde_json::Value) {
        self.sessions
            .send_log_message(level, data, Some(&self.config.server_name))
            .await;
    }

    /// Re-run discovery at runtime: drop discovered entries, harvest again,
    /// re-register. List-changed notifications fire for changed catalogs.
    pub async fn rediscover(&self) {
        let harvested = discovery::harvest();
        let mut registry = self.registry.write().await;
        registry.clear_discovered(true);
        discovery::register_all(&mut registry, &harvested);
        registry.save_to_cache();
    }

    /// Drive the server over any transport: the dispatcher processes each
    /// inbound frame inline and responses go back through the transport's
    /// per-session queue.
    pub async fn run<T: Transport>(&self, mut transport: T) -> McpResult<()> {
        // Registry notifications start once sessions can exist.
        self.registry.write().await.set_sink(Arc::new(BroadcastSink {
            sessions: Arc::clone(&self.sessions),
        }));

        let _gc = self.sessions.start_gc();
        info!(
            "{} v{} serving MCP",
            self.config.server_name, self.config.server_version
        );

        while let Some((session_id, frame)) = transport.receive().await {
            if let Some(response) = self.dispatcher.dispatch_frame(&session_id, &frame).await {
                transport.send(&session_id, response).await;
            }
        }

        info!("transport closed, server run finished");
        Ok(())
    }

    /// Serve a single session over stdin/stdout. Logging must go to stderr
    /// only; stdout is the protocol channel.
    pub async fn run_stdio(&self) -> McpResult<()> {
        let transport = StdioTransport::start(Arc::clone(&self.sessions))
            .await
            .map_err(|err| McpError::internal(err.to_string()))?;
        self.run(transport).await
    }

    /// Serve HTTP+SSE on the configured host, port and path prefix.
    #[cfg(feature = "http")]
    pub async fn run_http(&self) -> McpResult<()> {
        let http_config = kestrel_mcp_http::HttpServerConfig {
            host: self.config.http_host.clone(),
            port: self.config.http_port,
            path_prefix: self.config.http_path_prefix.clone(),
            ..Default::default()
        };
        let transport =
            kestrel_mcp_http::HttpSseTransport::bind(http_config, Arc::clone(&self.sessions))
                .await
                .map_err(|err| McpError::internal(err.to_string()))?;
        info!(
            "HTTP+SSE listening on {}:{}{}",
            self.config.http_host, self.config.http_port, self.config.http_path_prefix
        );
        self.run(transport).await
    }
}
