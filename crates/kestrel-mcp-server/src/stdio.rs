//! Standard-I/O transport: one process, one session.
//!
//! Frames are newline-delimited JSON. Inbound frames come from stdin;
//! outbound frames queue on the session and a writer task drains them to
//! stdout. Nothing but protocol frames may touch stdout, so diagnostics
//! must be routed to stderr (see [`crate::server::McpServer::run_stdio`]).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{debug, error};

use kestrel_mcp_session::{SessionManager, SessionStoreError, Transport};

pub struct StdioTransport {
    session_id: String,
    sessions: Arc<SessionManager>,
    lines: Lines<BufReader<Stdin>>,
    writer: tokio::task::JoinHandle<()>,
}

impl StdioTransport {
    /// Open the single stdio session and start the stdout writer task.
    pub async fn start(sessions: Arc<SessionManager>) -> Result<Self, SessionStoreError> {
        let session_id = sessions.create_session().await?;
        debug!("stdio transport bound to session {}", session_id);

        let mut wake = sessions.register_waker(&session_id).await;
        let writer_sessions = Arc::clone(&sessions);
        let writer_session_id = session_id.clone();
        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while wake.recv().await.is_some() {
                for frame in writer_sessions.drain_frames(&writer_session_id).await {
                    if stdout.write_all(frame.as_bytes()).await.is_err()
                        || stdout.write_all(b"\n").await.is_err()
                    {
                        error!("stdout write failed, stopping stdio writer");
                        return;
                    }
                }
                if stdout.flush().await.is_err() {
                    error!("stdout flush failed, stopping stdio writer");
                    return;
                }
            }
        });

        Ok(Self {
            session_id,
            sessions,
            lines: BufReader::new(tokio::io::stdin()).lines(),
            writer,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn receive(&mut self) -> Option<(String, String)> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some((self.session_id.clone(), line)),
                Ok(None) => {
                    // EOF: the client hung up. Give the writer a chance to
                    // flush anything still queued, then end the run.
                    debug!("stdin closed, shutting down stdio transport");
                    tokio::task::yield_now().await;
                    self.close_session(&self.session_id.clone()).await;
                    return None;
                }
                Err(err) => {
                    error!("stdin read failed: {}", err);
                    return None;
                }
            }
        }
    }

    async fn send(&self, session_id: &str, frame: String) {
        self.sessions.enqueue_frame(session_id, frame).await;
    }

    async fn list_sessions(&self) -> Vec<String> {
        vec![self.session_id.clone()]
    }

    /// The stdio transport owns exactly one session, assigned at startup.
    async fn open_session(&self) -> Result<String, SessionStoreError> {
        Ok(self.session_id.clone())
    }

    async fn close_session(&self, session_id: &str) {
        self.sessions.close_session(session_id).await;
        self.writer.abort();
    }
}
