//! Session manager: behavior on top of the session store.
//!
//! Owns session id generation, the wake channels transports use to learn
//! that a queue has frames, notification fan-out (broadcast and
//! subscription-targeted), log-level-gated message delivery, and the
//! periodic TTL garbage collector.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use kestrel_mcp_json_rpc::JsonRpcNotification;
use kestrel_mcp_protocol::logging::LoggingMessageParams;
use kestrel_mcp_protocol::{LoggingLevel, methods, notifications};

use crate::traits::{Session, SessionStoreError, now_millis};
use crate::BoxedSessionStore;

/// Default session TTL: one hour.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);
/// Default GC sweep period: five minutes.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(300);

/// Coordinates sessions for every transport attached to a server.
pub struct SessionManager {
    store: Arc<BoxedSessionStore>,
    ttl: Duration,
    gc_interval: Duration,
    /// Per-session wake senders, registered by transports.
    wakers: RwLock<HashMap<String, mpsc::UnboundedSender<()>>>,
}

impl SessionManager {
    pub fn new(store: Arc<BoxedSessionStore>) -> Self {
        Self::with_timeouts(store, DEFAULT_SESSION_TTL, DEFAULT_GC_INTERVAL)
    }

    pub fn with_timeouts(store: Arc<BoxedSessionStore>, ttl: Duration, gc_interval: Duration) -> Self {
        Self {
            store,
            ttl,
            gc_interval,
            wakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<BoxedSessionStore> {
        &self.store
    }

    /// Create a session under a fresh 128-bit hex id.
    pub async fn create_session(&self) -> Result<String, SessionStoreError> {
        let id = generate_session_id();
        self.store.create(&id).await?;
        Ok(id)
    }

    pub async fn session(&self, id: &str) -> Option<Session> {
        self.store.get(id).await.ok().flatten()
    }

    pub async fn touch(&self, id: &str) {
        if let Err(err) = self.store.touch(id).await {
            warn!("failed to touch session {}: {}", id, err);
        }
    }

    pub async fn is_initialized(&self, id: &str) -> bool {
        matches!(self.store.get(id).await, Ok(Some(session)) if session.initialized)
    }

    /// Delete a session and drop its wake channel.
    pub async fn close_session(&self, id: &str) {
        match self.store.delete(id).await {
            Ok(true) => info!("session {} closed", id),
            Ok(false) => {}
            Err(err) => warn!("failed to delete session {}: {}", id, err),
        }
        self.wakers.write().await.remove(id);
    }

    pub async fn list_sessions(&self) -> Vec<String> {
        self.store.list().await.unwrap_or_default()
    }

    /// Register a wake channel for a session. The transport holds the
    /// receiver and drains the session queue each time it fires.
    pub async fn register_waker(&self, id: &str) -> mpsc::UnboundedReceiver<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.wakers.write().await.insert(id.to_string(), tx);
        rx
    }

    async fn wake(&self, id: &str) {
        let wakers = self.wakers.read().await;
        if let Some(waker) = wakers.get(id) {
            let _ = waker.send(());
        }
    }

    /// Queue one serialized frame on a session and wake its transport.
    /// Frames for unknown sessions are dropped.
    pub async fn enqueue_frame(&self, id: &str, frame: String) {
        match self.store.enqueue(id, frame).await {
            Ok(true) => self.wake(id).await,
            Ok(false) => debug!("dropping frame for unknown session {}", id),
            Err(err) => warn!("failed to enqueue frame for session {}: {}", id, err),
        }
    }

    /// Atomically take everything queued for a session, FIFO.
    pub async fn drain_frames(&self, id: &str) -> Vec<String> {
        self.store.drain(id).await.unwrap_or_default()
    }

    /// Queue a notification frame on every live session.
    pub async fn broadcast(&self, notification: &JsonRpcNotification) {
        let frame = match serde_json::to_string(notification) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("failed to serialize broadcast notification: {}", err);
                return;
            }
        };
        for id in self.list_sessions().await {
            self.enqueue_frame(&id, frame.clone()).await;
        }
    }

    /// Broadcast a list-changed notification for the given method name.
    pub async fn broadcast_list_changed(&self, method: &str) {
        self.broadcast(&notifications::list_changed(method)).await;
    }

    /// Queue `notifications/resources/updated` on exactly the sessions
    /// subscribed to the URI, via the reverse index.
    pub async fn notify_resource_updated(&self, uri: &str) {
        let subscribers = match self.store.subscribers(uri).await {
            Ok(subscribers) => subscribers,
            Err(err) => {
                warn!("failed to look up subscribers of {}: {}", uri, err);
                return;
            }
        };
        if subscribers.is_empty() {
            return;
        }
        let notification = notifications::resource_updated(uri);
        let frame = match serde_json::to_string(&notification) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("failed to serialize resources/updated: {}", err);
                return;
            }
        };
        debug!("resource {} updated, notifying {} subscribers", uri, subscribers.len());
        for id in subscribers {
            self.enqueue_frame(&id, frame.clone()).await;
        }
    }

    /// Queue `notifications/message` on sessions whose requested log level
    /// admits this severity. Sessions that never called `logging/setLevel`
    /// receive nothing.
    pub async fn send_log_message(&self, level: LoggingLevel, data: serde_json::Value, logger: Option<&str>) {
        let mut params = LoggingMessageParams::new(level, data);
        if let Some(logger) = logger {
            params = params.with_logger(logger);
        }
        let params = match serde_json::to_value(&params) {
            Ok(params) => params,
            Err(err) => {
                warn!("failed to serialize log message params: {}", err);
                return;
            }
        };
        let notification =
            JsonRpcNotification::new(methods::NOTIFICATION_MESSAGE).with_params(params);
        let frame = match serde_json::to_string(&notification) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("failed to serialize log notification: {}", err);
                return;
            }
        };

        for id in self.list_sessions().await {
            let Some(session) = self.session(&id).await else { continue };
            let Some(threshold) = session.log_level else { continue };
            if threshold.includes(level) {
                self.enqueue_frame(&id, frame.clone()).await;
            }
        }
    }

    /// Delete sessions idle past the TTL. Returns the removed ids.
    pub async fn collect_expired(&self) -> Vec<String> {
        let cutoff = now_millis().saturating_sub(self.ttl.as_millis() as u64);
        let expired = match self.store.expire_older_than(cutoff).await {
            Ok(expired) => expired,
            Err(err) => {
                warn!("session expiry sweep failed: {}", err);
                return Vec::new();
            }
        };
        if !expired.is_empty() {
            let mut wakers = self.wakers.write().await;
            for id in &expired {
                wakers.remove(id);
            }
        }
        expired
    }

    /// Spawn the periodic GC task.
    pub fn start_gc(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.gc_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let expired = manager.collect_expired().await;
                if !expired.is_empty() {
                    debug!("session GC removed {} sessions", expired.len());
                }
            }
        })
    }
}

/// 32 hex characters from a random u128. Session ids are bearer tokens on
/// the HTTP transport, so they carry a full 128 bits of entropy.
fn generate_session_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemorySessionStore;
    use serde_json::json;

    fn manager() -> Arc<SessionManager> {
        Arc::new(SessionManager::new(Arc::new(InMemorySessionStore::new())))
    }

    #[test]
    fn test_session_ids_are_32_hex_chars() {
        let id = generate_session_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_session_id(), generate_session_id());
    }

    #[tokio::test]
    async fn test_enqueue_wakes_registered_transport() {
        let manager = manager();
        let id = manager.create_session().await.unwrap();
        let mut wake = manager.register_waker(&id).await;

        manager.enqueue_frame(&id, "{}".to_string()).await;
        wake.recv().await.expect("waker should fire");
        assert_eq!(manager.drain_frames(&id).await, vec!["{}"]);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_session() {
        let manager = manager();
        let a = manager.create_session().await.unwrap();
        let b = manager.create_session().await.unwrap();

        manager
            .broadcast_list_changed(methods::NOTIFICATION_TOOLS_LIST_CHANGED)
            .await;

        for id in [&a, &b] {
            let frames = manager.drain_frames(id).await;
            assert_eq!(frames.len(), 1);
            assert!(frames[0].contains("notifications/tools/list_changed"));
        }
    }

    #[tokio::test]
    async fn test_resource_updated_targets_subscribers_only() {
        let manager = manager();
        let a = manager.create_session().await.unwrap();
        let b = manager.create_session().await.unwrap();

        manager.store().subscribe(&a, "config://app/name").await.unwrap();
        // Second subscribe is idempotent: still exactly one frame per update.
        manager.store().subscribe(&a, "config://app/name").await.unwrap();

        manager.notify_resource_updated("config://app/name").await;

        let frames = manager.drain_frames(&a).await;
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("config://app/name"));
        assert!(manager.drain_frames(&b).await.is_empty());
    }

    #[tokio::test]
    async fn test_log_messages_honor_session_threshold() {
        let manager = manager();
        let verbose = manager.create_session().await.unwrap();
        let quiet = manager.create_session().await.unwrap();
        let silent = manager.create_session().await.unwrap();

        manager.store().set_log_level(&verbose, LoggingLevel::Debug).await.unwrap();
        manager.store().set_log_level(&quiet, LoggingLevel::Error).await.unwrap();

        manager
            .send_log_message(LoggingLevel::Info, json!("startup complete"), Some("kestrel"))
            .await;

        assert_eq!(manager.drain_frames(&verbose).await.len(), 1);
        assert!(manager.drain_frames(&quiet).await.is_empty());
        assert!(manager.drain_frames(&silent).await.is_empty());
    }

    #[tokio::test]
    async fn test_close_session_drops_state() {
        let manager = manager();
        let id = manager.create_session().await.unwrap();
        manager.enqueue_frame(&id, "{}".to_string()).await;

        manager.close_session(&id).await;
        assert!(manager.session(&id).await.is_none());
        assert!(manager.drain_frames(&id).await.is_empty());
    }

    #[tokio::test]
    async fn test_collect_expired_respects_ttl() {
        let store = Arc::new(InMemorySessionStore::new());
        let manager = Arc::new(SessionManager::with_timeouts(
            store,
            Duration::from_millis(0),
            DEFAULT_GC_INTERVAL,
        ));
        let id = manager.create_session().await.unwrap();

        // TTL of zero: anything with last_activity < now expires.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let expired = manager.collect_expired().await;
        assert_eq!(expired, vec![id]);
    }
}
