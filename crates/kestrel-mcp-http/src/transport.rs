//! The HTTP+SSE transport: a hyper accept loop feeding the server's run
//! loop through the [`Transport`] contract.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use kestrel_mcp_session::{SessionManager, SessionStoreError, Transport};

use crate::config::HttpServerConfig;
use crate::service::{Shared, handle_request};
use crate::{HttpTransportError, Result};

/// Inbound frames buffered between the accept tasks and the run loop.
const INBOUND_CHANNEL_CAPACITY: usize = 256;

pub struct HttpSseTransport {
    sessions: Arc<SessionManager>,
    inbound: mpsc::Receiver<(String, String)>,
    local_addr: SocketAddr,
    accept_task: tokio::task::JoinHandle<()>,
}

impl HttpSseTransport {
    /// Bind the listener and start accepting connections. The transport is
    /// inert until a run loop starts calling [`Transport::receive`].
    pub async fn bind(config: HttpServerConfig, sessions: Arc<SessionManager>) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(HttpTransportError::Bind)?;
        let local_addr = listener.local_addr()?;

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            config,
            sessions: Arc::clone(&sessions),
            inbound: inbound_tx,
        });

        let accept_task = tokio::spawn(accept_loop(listener, shared));

        Ok(Self {
            sessions,
            inbound: inbound_rx,
            local_addr,
            accept_task,
        })
    }

    /// The bound address; useful when the configured port is 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!("accept failed: {}", err);
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                continue;
            }
        };
        debug!("connection from {}", peer);

        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(Arc::clone(&shared), req));
            let result = auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await;
            if let Err(err) = result {
                debug!("connection from {} ended: {}", peer, err);
            }
        });
    }
}

#[async_trait]
impl Transport for HttpSseTransport {
    async fn receive(&mut self) -> Option<(String, String)> {
        self.inbound.recv().await
    }

    async fn send(&self, session_id: &str, frame: String) {
        self.sessions.enqueue_frame(session_id, frame).await;
    }

    async fn list_sessions(&self) -> Vec<String> {
        self.sessions.list_sessions().await
    }

    async fn open_session(&self) -> std::result::Result<String, SessionStoreError> {
        self.sessions.create_session().await
    }

    async fn close_session(&self, session_id: &str) {
        self.sessions.close_session(session_id).await;
    }
}

impl Drop for HttpSseTransport {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}
