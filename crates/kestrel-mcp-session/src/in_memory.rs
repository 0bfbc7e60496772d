//! In-memory session storage.
//!
//! All state lives under one `RwLock`: sessions, per-session frame queues,
//! and the reverse subscription index. The single lock is what makes the
//! index a consistent projection of the per-session sets (a subscribe and
//! its index update commit together), and makes queue drains atomic.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use kestrel_mcp_protocol::{Implementation, LoggingLevel, ProtocolVersion};

use crate::traits::{Session, SessionStore, SessionStoreError, now_millis};

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    queues: HashMap<String, VecDeque<String>>,
    /// uri -> subscriber session ids
    subscribers: HashMap<String, HashSet<String>>,
}

impl Inner {
    fn session_mut(&mut self, id: &str) -> Result<&mut Session, SessionStoreError> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| SessionStoreError::NotFound(id.to_string()))
    }

    fn drop_subscriptions(&mut self, id: &str, uris: &HashSet<String>) {
        for uri in uris {
            if let Some(subscribers) = self.subscribers.get_mut(uri) {
                subscribers.remove(id);
                if subscribers.is_empty() {
                    self.subscribers.remove(uri);
                }
            }
        }
    }
}

/// Session store backed by process memory.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: RwLock<Inner>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn create(&self, id: &str) -> Result<Session, SessionStoreError> {
        let mut inner = self.inner.write().await;
        if inner.sessions.contains_key(id) {
            return Err(SessionStoreError::Internal(format!(
                "session already exists: {}",
                id
            )));
        }
        let session = Session::new(id.to_string());
        inner.sessions.insert(id.to_string(), session.clone());
        inner.queues.insert(id.to_string(), VecDeque::new());
        debug!("created session {}", id);
        Ok(session)
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, SessionStoreError> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.get(id).cloned())
    }

    async fn touch(&self, id: &str) -> Result<bool, SessionStoreError> {
        let mut inner = self.inner.write().await;
        match inner.sessions.get_mut(id) {
            Some(session) => {
                session.last_activity = now_millis();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_handshake(
        &self,
        id: &str,
        client_info: Implementation,
        protocol_version: ProtocolVersion,
    ) -> Result<(), SessionStoreError> {
        let mut inner = self.inner.write().await;
        let session = inner.session_mut(id)?;
        session.client_info = Some(client_info);
        session.protocol_version = Some(protocol_version);
        session.initialized = false;
        session.last_activity = now_millis();
        Ok(())
    }

    async fn mark_initialized(&self, id: &str) -> Result<(), SessionStoreError> {
        let mut inner = self.inner.write().await;
        let session = inner.session_mut(id)?;
        session.initialized = true;
        session.last_activity = now_millis();
        Ok(())
    }

    async fn set_log_level(&self, id: &str, level: LoggingLevel) -> Result<(), SessionStoreError> {
        let mut inner = self.inner.write().await;
        let session = inner.session_mut(id)?;
        session.log_level = Some(level);
        session.last_activity = now_millis();
        Ok(())
    }

    async fn subscribe(&self, id: &str, uri: &str) -> Result<(), SessionStoreError> {
        let mut inner = self.inner.write().await;
        let session = inner.session_mut(id)?;
        session.subscriptions.insert(uri.to_string());
        session.last_activity = now_millis();
        inner
            .subscribers
            .entry(uri.to_string())
            .or_default()
            .insert(id.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, id: &str, uri: &str) -> Result<(), SessionStoreError> {
        let mut inner = self.inner.write().await;
        let session = inner.session_mut(id)?;
        session.subscriptions.remove(uri);
        session.last_activity = now_millis();
        if let Some(subscribers) = inner.subscribers.get_mut(uri) {
            subscribers.remove(id);
            if subscribers.is_empty() {
                inner.subscribers.remove(uri);
            }
        }
        Ok(())
    }

    async fn subscribers(&self, uri: &str) -> Result<Vec<String>, SessionStoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .subscribers
            .get(uri)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn enqueue(&self, id: &str, frame: String) -> Result<bool, SessionStoreError> {
        let mut inner = self.inner.write().await;
        if !inner.sessions.contains_key(id) {
            return Ok(false);
        }
        inner.queues.entry(id.to_string()).or_default().push_back(frame);
        Ok(true)
    }

    async fn drain(&self, id: &str) -> Result<Vec<String>, SessionStoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .queues
            .get_mut(id)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default())
    }

    async fn delete(&self, id: &str) -> Result<bool, SessionStoreError> {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.sessions.remove(id) else {
            return Ok(false);
        };
        inner.queues.remove(id);
        inner.drop_subscriptions(id, &session.subscriptions);
        debug!("deleted session {}", id);
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<String>, SessionStoreError> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.keys().cloned().collect())
    }

    async fn count(&self) -> Result<usize, SessionStoreError> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.len())
    }

    async fn expire_older_than(&self, cutoff_millis: u64) -> Result<Vec<String>, SessionStoreError> {
        let mut inner = self.inner.write().await;
        let expired: Vec<(String, HashSet<String>)> = inner
            .sessions
            .iter()
            .filter(|(_, session)| session.last_activity < cutoff_millis)
            .map(|(id, session)| (id.clone(), session.subscriptions.clone()))
            .collect();

        for (id, subscriptions) in &expired {
            inner.sessions.remove(id);
            inner.queues.remove(id);
            inner.drop_subscriptions(id, subscriptions);
        }

        if !expired.is_empty() {
            info!("expired {} stale sessions", expired.len());
        }

        Ok(expired.into_iter().map(|(id, _)| id).collect())
    }
}
