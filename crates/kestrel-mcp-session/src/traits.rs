//! The session store trait and session record.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use kestrel_mcp_protocol::{Implementation, LoggingLevel, ProtocolVersion};

/// Per-client session state.
///
/// Lifecycle: a session is created when the transport accepts a connection.
/// `client_info` is recorded when `initialize` arrives; `initialized` flips
/// only on the subsequent `notifications/initialized`. The session dies on
/// explicit close, transport disconnect, or TTL expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque hex identifier, at least 128 bits of entropy.
    pub id: String,
    /// Whether the initialize/initialized handshake has completed.
    pub initialized: bool,
    /// Client implementation info from the initialize request.
    pub client_info: Option<Implementation>,
    /// Protocol version negotiated during initialize.
    pub protocol_version: Option<ProtocolVersion>,
    /// URIs this session subscribed to.
    pub subscriptions: HashSet<String>,
    /// Log level requested via logging/setLevel.
    pub log_level: Option<LoggingLevel>,
    /// Creation timestamp, Unix millis.
    pub created_at: u64,
    /// Last activity timestamp, Unix millis; drives TTL expiry.
    pub last_activity: u64,
}

impl Session {
    pub fn new(id: String) -> Self {
        let now = now_millis();
        Self {
            id,
            initialized: false,
            client_info: None,
            protocol_version: None,
            subscriptions: HashSet::new(),
            log_level: None,
            created_at: now,
            last_activity: now,
        }
    }

    /// Whether the session received an initialize request (handshake info
    /// present), regardless of the initialized flag.
    pub fn handshake_received(&self) -> bool {
        self.client_info.is_some()
    }
}

pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// Errors a session store can produce.
#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session storage error: {0}")]
    Internal(String),
}

/// Storage backend for sessions, their subscriptions and outbound queues.
///
/// Implementations must provide atomic per-session read-modify-write, and
/// must mutate the reverse subscription index together with the per-session
/// set so readers never observe a torn update.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Backend name, for logs.
    fn backend_name(&self) -> &'static str;

    /// Create a session under the given id. Replaces nothing: creating an
    /// existing id is an error.
    async fn create(&self, id: &str) -> Result<Session, SessionStoreError>;

    /// Fetch a session snapshot.
    async fn get(&self, id: &str) -> Result<Option<Session>, SessionStoreError>;

    /// Update the activity timestamp. Returns false for unknown sessions.
    async fn touch(&self, id: &str) -> Result<bool, SessionStoreError>;

    /// Record the initialize handshake: client info and negotiated version.
    /// Resets the initialized flag; `notifications/initialized` completes it.
    async fn record_handshake(
        &self,
        id: &str,
        client_info: Implementation,
        protocol_version: ProtocolVersion,
    ) -> Result<(), SessionStoreError>;

    /// Flip the initialized flag after `notifications/initialized`.
    async fn mark_initialized(&self, id: &str) -> Result<(), SessionStoreError>;

    /// Persist the requested log level.
    async fn set_log_level(&self, id: &str, level: LoggingLevel) -> Result<(), SessionStoreError>;

    /// Add a subscription; idempotent. Updates the reverse index atomically.
    async fn subscribe(&self, id: &str, uri: &str) -> Result<(), SessionStoreError>;

    /// Remove a subscription; idempotent. Updates the reverse index atomically.
    async fn unsubscribe(&self, id: &str, uri: &str) -> Result<(), SessionStoreError>;

    /// Sessions currently subscribed to a URI.
    async fn subscribers(&self, uri: &str) -> Result<Vec<String>, SessionStoreError>;

    /// Append an outbound frame to the session queue. Returns false when the
    /// session does not exist (the frame is dropped).
    async fn enqueue(&self, id: &str, frame: String) -> Result<bool, SessionStoreError>;

    /// Atomically take every queued frame, in FIFO order. A drain of an
    /// unknown or deleted session returns the empty vector, never an error.
    async fn drain(&self, id: &str) -> Result<Vec<String>, SessionStoreError>;

    /// Delete a session, its queue and its reverse-index entries. Returns
    /// whether anything was removed.
    async fn delete(&self, id: &str) -> Result<bool, SessionStoreError>;

    /// All live session ids.
    async fn list(&self) -> Result<Vec<String>, SessionStoreError>;

    /// Live session count.
    async fn count(&self) -> Result<usize, SessionStoreError>;

    /// Delete sessions whose last activity predates the cutoff (Unix
    /// millis); returns the ids removed.
    async fn expire_older_than(&self, cutoff_millis: u64) -> Result<Vec<String>, SessionStoreError>;
}
