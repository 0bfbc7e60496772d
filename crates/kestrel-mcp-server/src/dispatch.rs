//! The JSON-RPC dispatcher: parse, gate, route, respond.
//!
//! Method logic lives in [`McpHandler`] implementations registered in a
//! method table; the dispatcher owns everything protocol-shaped. Handlers
//! return domain errors; the dispatcher converts them into JSON-RPC error
//! envelopes, so no handler ever builds one by hand.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use kestrel_mcp_json_rpc::{
    Incoming, JsonRpcError, OutboundMessage, Payload, classify, parse_payload,
};
use kestrel_mcp_protocol::{McpResult, methods};
use kestrel_mcp_session::SessionManager;

/// Per-request context handed to method handlers.
#[derive(Clone)]
pub struct RequestContext {
    pub session_id: String,
    pub sessions: Arc<SessionManager>,
}

/// One MCP method family. `supported_methods` keys the routing table.
#[async_trait]
pub trait McpHandler: Send + Sync {
    async fn handle(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> McpResult<Value>;

    fn supported_methods(&self) -> Vec<String>;
}

/// Routes framed JSON-RPC messages to method handlers and enforces the
/// session lifecycle.
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn McpHandler>>,
    sessions: Arc<SessionManager>,
}

impl Dispatcher {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            handlers: HashMap::new(),
            sessions,
        }
    }

    pub fn register(&mut self, handler: Arc<dyn McpHandler>) {
        for method in handler.supported_methods() {
            self.handlers.insert(method, Arc::clone(&handler));
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Process one inbound frame and return the serialized response frame,
    /// if the input warrants one. Notifications (and all-notification
    /// batches) produce `None`.
    pub async fn dispatch_frame(&self, session_id: &str, raw: &str) -> Option<String> {
        self.sessions.touch(session_id).await;

        let payload = match parse_payload(raw) {
            Ok(payload) => payload,
            Err(parse_error) => return serialize(&OutboundMessage::Error(parse_error)),
        };

        match payload {
            Payload::Single(value) => {
                let response = self.dispatch_value(session_id, &value).await?;
                serialize(&response)
            }
            Payload::Batch(items) => {
                if items.is_empty() {
                    let error = JsonRpcError::invalid_request(None, "Invalid Request: empty batch");
                    return serialize(&OutboundMessage::Error(error));
                }
                let mut responses = Vec::new();
                for item in &items {
                    if let Some(response) = self.dispatch_value(session_id, item).await {
                        responses.push(response);
                    }
                }
                if responses.is_empty() {
                    return None;
                }
                match serde_json::to_string(&responses) {
                    Ok(frame) => Some(frame),
                    Err(err) => {
                        warn!("failed to serialize batch response: {}", err);
                        None
                    }
                }
            }
        }
    }

    /// Process one message value. Requests produce a response; notifications
    /// never do.
    async fn dispatch_value(&self, session_id: &str, value: &Value) -> Option<OutboundMessage> {
        let incoming = match classify(value) {
            Ok(incoming) => incoming,
            Err(envelope_error) => return Some(OutboundMessage::Error(envelope_error)),
        };

        let ctx = RequestContext {
            session_id: session_id.to_string(),
            sessions: Arc::clone(&self.sessions),
        };

        match incoming {
            Incoming::Request(request) => {
                // Lifecycle gate: before the initialized handshake completes,
                // only initialize and ping are admitted.
                if !lifecycle_exempt(&request.method)
                    && !self.sessions.is_initialized(session_id).await
                {
                    let error = JsonRpcError::invalid_request(
                        Some(request.id),
                        "Session not initialized",
                    );
                    return Some(OutboundMessage::Error(error));
                }

                let Some(handler) = self.handlers.get(&request.method) else {
                    return Some(OutboundMessage::Error(JsonRpcError::method_not_found(
                        request.id,
                        &request.method,
                    )));
                };

                match handler.handle(&request.method, request.params, &ctx).await {
                    Ok(result) => Some(OutboundMessage::success(request.id, result)),
                    Err(domain_error) => Some(OutboundMessage::Error(JsonRpcError::new(
                        Some(request.id),
                        domain_error.to_error_object(),
                    ))),
                }
            }
            Incoming::Notification(notification) => {
                match self.handlers.get(&notification.method) {
                    Some(handler) => {
                        if let Err(err) = handler
                            .handle(&notification.method, notification.params, &ctx)
                            .await
                        {
                            warn!("notification {} failed: {}", notification.method, err);
                        }
                    }
                    None => debug!("ignoring unknown notification {}", notification.method),
                }
                None
            }
        }
    }
}

fn lifecycle_exempt(method: &str) -> bool {
    method == methods::INITIALIZE || method == methods::PING
}

fn serialize(message: &OutboundMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!("failed to serialize response frame: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_mcp_protocol::McpError;
    use kestrel_mcp_session::InMemorySessionStore;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl McpHandler for EchoHandler {
        async fn handle(
            &self,
            _method: &str,
            params: Option<Value>,
            _ctx: &RequestContext,
        ) -> McpResult<Value> {
            Ok(params.unwrap_or(Value::Null))
        }

        fn supported_methods(&self) -> Vec<String> {
            vec!["test/echo".to_string()]
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl McpHandler for FailingHandler {
        async fn handle(
            &self,
            _method: &str,
            _params: Option<Value>,
            _ctx: &RequestContext,
        ) -> McpResult<Value> {
            Err(McpError::internal("deliberate"))
        }

        fn supported_methods(&self) -> Vec<String> {
            vec!["test/fail".to_string()]
        }
    }

    async fn dispatcher_with_session() -> (Dispatcher, String) {
        let sessions = Arc::new(SessionManager::new(Arc::new(InMemorySessionStore::new())));
        let session_id = sessions.create_session().await.unwrap();
        // Skip the handshake for handler-routing tests.
        sessions.store().mark_initialized(&session_id).await.unwrap();

        let mut dispatcher = Dispatcher::new(sessions);
        dispatcher.register(Arc::new(EchoHandler));
        dispatcher.register(Arc::new(FailingHandler));
        (dispatcher, session_id)
    }

    #[tokio::test]
    async fn test_request_gets_response() {
        let (dispatcher, sid) = dispatcher_with_session().await;
        let frame = dispatcher
            .dispatch_frame(&sid, r#"{"jsonrpc":"2.0","id":1,"method":"test/echo","params":{"a":1}}"#)
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["result"]["a"], 1);
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let (dispatcher, sid) = dispatcher_with_session().await;
        let response = dispatcher
            .dispatch_frame(&sid, r#"{"jsonrpc":"2.0","method":"test/echo"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_null_id_is_notification() {
        let (dispatcher, sid) = dispatcher_with_session().await;
        let response = dispatcher
            .dispatch_frame(&sid, r#"{"jsonrpc":"2.0","id":null,"method":"test/echo"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_parse_error_has_null_id() {
        let (dispatcher, sid) = dispatcher_with_session().await;
        let frame = dispatcher.dispatch_frame(&sid, "{oops").await.unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["error"]["code"], -32700);
        assert!(value["id"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (dispatcher, sid) = dispatcher_with_session().await;
        let frame = dispatcher
            .dispatch_frame(&sid, r#"{"jsonrpc":"2.0","id":9,"method":"no/such"}"#)
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["error"]["code"], -32601);
        assert!(value["error"]["message"].as_str().unwrap().contains("no/such"));
    }

    #[tokio::test]
    async fn test_handler_error_becomes_internal_error() {
        let (dispatcher, sid) = dispatcher_with_session().await;
        let frame = dispatcher
            .dispatch_frame(&sid, r#"{"jsonrpc":"2.0","id":2,"method":"test/fail"}"#)
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["error"]["code"], -32603);
    }

    #[tokio::test]
    async fn test_lifecycle_gate_blocks_uninitialized_sessions() {
        let sessions = Arc::new(SessionManager::new(Arc::new(InMemorySessionStore::new())));
        let sid = sessions.create_session().await.unwrap();
        let mut dispatcher = Dispatcher::new(sessions);
        dispatcher.register(Arc::new(EchoHandler));

        let frame = dispatcher
            .dispatch_frame(&sid, r#"{"jsonrpc":"2.0","id":1,"method":"test/echo"}"#)
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["error"]["code"], -32600);
        assert_eq!(value["error"]["message"], "Session not initialized");
        assert_eq!(value["id"], 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_invalid_request() {
        let (dispatcher, sid) = dispatcher_with_session().await;
        let frame = dispatcher.dispatch_frame(&sid, "[]").await.unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_batch_mixed_messages() {
        let (dispatcher, sid) = dispatcher_with_session().await;
        let frame = dispatcher
            .dispatch_frame(
                &sid,
                r#"[
                    {"jsonrpc":"2.0","id":10,"method":"test/echo","params":{"n":1}},
                    {"jsonrpc":"2.0","method":"test/echo"},
                    {"jsonrpc":"2.0","id":11,"method":"no/such"}
                ]"#,
            )
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        let batch = value.as_array().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0]["id"], 10);
        assert_eq!(batch[0]["result"]["n"], 1);
        assert_eq!(batch[1]["id"], 11);
        assert_eq!(batch[1]["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_all_notification_batch_produces_nothing() {
        let (dispatcher, sid) = dispatcher_with_session().await;
        let response = dispatcher
            .dispatch_frame(
                &sid,
                r#"[{"jsonrpc":"2.0","method":"test/echo"},{"jsonrpc":"2.0","method":"test/echo"}]"#,
            )
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_batch_entry_with_bad_envelope() {
        let (dispatcher, sid) = dispatcher_with_session().await;
        let frame = dispatcher
            .dispatch_frame(
                &sid,
                r#"[{"jsonrpc":"2.0","id":1,"method":"test/echo"}, 42]"#,
            )
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        let batch = value.as_array().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1]["error"]["code"], -32600);
    }
}
