//! The transport contract the server's run loop consumes.
//!
//! A transport frames I/O for one or many sessions. Inbound messages arrive
//! through [`Transport::receive`]; outbound frames go through
//! [`Transport::send`], which queues on the session and lets the transport
//! deliver on its own schedule (the stdio writer task, an SSE stream).
//! Delivery is per-session FIFO.

use async_trait::async_trait;

use crate::traits::SessionStoreError;

#[async_trait]
pub trait Transport: Send {
    /// Block until the next inbound frame arrives. `None` means the
    /// transport is closed (stdin EOF, listener shut down) and the run loop
    /// should stop.
    async fn receive(&mut self) -> Option<(String, String)>;

    /// Deliver one frame to the addressed session, preserving per-session
    /// FIFO order. Frames addressed to dead sessions are dropped.
    async fn send(&self, session_id: &str, frame: String);

    /// Sessions currently owned by this transport.
    async fn list_sessions(&self) -> Vec<String>;

    /// Open a new session and return its id.
    async fn open_session(&self) -> Result<String, SessionStoreError>;

    /// Close a session and release its resources.
    async fn close_session(&self, session_id: &str);
}
