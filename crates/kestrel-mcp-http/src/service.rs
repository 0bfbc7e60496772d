//! The hyper request handler for the two MCP endpoints.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use http_body::{Body, Frame};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{CACHE_CONTROL, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use kestrel_mcp_json_rpc::JsonRpcError;
use kestrel_mcp_session::SessionManager;

use crate::config::HttpServerConfig;
use crate::sse;

pub(crate) type RespBody = UnsyncBoxBody<Bytes, Infallible>;

/// State shared by every connection task.
pub(crate) struct Shared {
    pub config: HttpServerConfig,
    pub sessions: Arc<SessionManager>,
    /// Inbound frames handed to the server run loop.
    pub inbound: mpsc::Sender<(String, String)>,
}

fn full(body: impl Into<Bytes>) -> RespBody {
    Full::new(body.into()).map_err(|never| match never {}).boxed_unsync()
}

fn plain(status: StatusCode, body: &str) -> Response<RespBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .body(full(body.to_string()))
        .unwrap()
}

fn json(status: StatusCode, body: String) -> Response<RespBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full(body))
        .unwrap()
}

/// Pull one query parameter out of a raw query string.
pub(crate) fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
}

pub(crate) async fn handle_request(
    shared: Arc<Shared>,
    req: Request<Incoming>,
) -> Result<Response<RespBody>, Infallible> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();
    let sse_path = shared.config.sse_path();
    let message_path = shared.config.message_path();

    let response = match (method, path.as_str()) {
        (Method::GET, p) if p == sse_path => open_sse_stream(shared).await,
        (Method::POST, p) if p == message_path => accept_message(shared, req).await,
        (Method::OPTIONS, p) if p == sse_path || p == message_path => Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header("access-control-allow-origin", "*")
            .header("access-control-allow-methods", "GET, POST, OPTIONS")
            .header("access-control-allow-headers", "content-type")
            .body(full(""))
            .unwrap(),
        (_, p) if p == sse_path || p == message_path => {
            plain(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }
        _ => plain(StatusCode::NOT_FOUND, "not found"),
    };

    Ok(response)
}

/// `GET {prefix}/sse`: create a session and stream its outbound queue.
async fn open_sse_stream(shared: Arc<Shared>) -> Response<RespBody> {
    let session_id = match shared.sessions.create_session().await {
        Ok(session_id) => session_id,
        Err(err) => {
            warn!("failed to create session for SSE stream: {}", err);
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "session creation failed");
        }
    };
    info!("SSE stream opened for session {}", session_id);

    let mut wake = shared.sessions.register_waker(&session_id).await;
    let sessions = Arc::clone(&shared.sessions);
    let endpoint = sse::endpoint_event(&shared.config.message_path(), &session_id);
    let keep_alive = shared.config.keep_alive;
    let stream_session_id = session_id.clone();

    let event_stream = stream! {
        yield Ok::<Bytes, Infallible>(Bytes::from(endpoint));

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + keep_alive,
            keep_alive,
        );
        loop {
            // Drain first so frames queued before the stream attached (or
            // between wakes) are delivered exactly once, in order.
            for frame in sessions.drain_frames(&stream_session_id).await {
                yield Ok(Bytes::from(sse::message_event(&frame)));
            }
            tokio::select! {
                woken = wake.recv() => {
                    if woken.is_none() {
                        // Session closed; end the stream.
                        break;
                    }
                }
                _ = ticker.tick() => {
                    yield Ok(Bytes::from(sse::keep_alive_event()));
                }
            }
        }
    };

    let body = SseBody::new(event_stream, Arc::clone(&shared.sessions), session_id);

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .header("access-control-allow-origin", "*")
        .body(UnsyncBoxBody::new(body))
        .unwrap()
}

/// `POST {prefix}/message?clientId=…`: validate, queue inbound, 202.
async fn accept_message(shared: Arc<Shared>, req: Request<Incoming>) -> Response<RespBody> {
    let Some(session_id) = query_param(req.uri().query(), "clientId") else {
        return plain(StatusCode::BAD_REQUEST, "missing clientId");
    };
    if shared.sessions.session(&session_id).await.is_none() {
        return plain(StatusCode::BAD_REQUEST, "unknown clientId");
    }

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("application/json") {
        return plain(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Content-Type must be application/json",
        );
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!("failed to read POST body: {}", err);
            return plain(StatusCode::BAD_REQUEST, "failed to read body");
        }
    };
    if body.is_empty() {
        return plain(StatusCode::BAD_REQUEST, "empty body");
    }
    if body.len() > shared.config.max_body_size {
        return plain(StatusCode::PAYLOAD_TOO_LARGE, "body too large");
    }

    let Ok(raw) = std::str::from_utf8(&body) else {
        return plain(StatusCode::BAD_REQUEST, "body must be UTF-8");
    };

    // A frame that is not JSON at all earns a 400; the matching JSON-RPC
    // parse error also rides the SSE stream. Anything that parses is
    // accepted here and answered over SSE.
    if serde_json::from_str::<serde_json::Value>(raw).is_err() {
        let parse_error = JsonRpcError::parse_error();
        let frame = serde_json::to_string(&parse_error).unwrap_or_else(|_| "{}".to_string());
        shared.sessions.enqueue_frame(&session_id, frame.clone()).await;
        return json(StatusCode::BAD_REQUEST, frame);
    }

    if shared
        .inbound
        .send((session_id.clone(), raw.to_string()))
        .await
        .is_err()
    {
        warn!("server run loop is gone, rejecting message");
        return plain(StatusCode::SERVICE_UNAVAILABLE, "server shutting down");
    }

    debug!("accepted message for session {}", session_id);
    plain(StatusCode::ACCEPTED, "Accepted")
}

/// Streaming SSE response body. Dropping it (client disconnect) closes the
/// session and removes its subscriptions.
struct SseBody {
    stream: Pin<Box<dyn Stream<Item = Result<Bytes, Infallible>> + Send>>,
    cleanup: Option<(Arc<SessionManager>, String)>,
}

impl SseBody {
    fn new<S>(stream: S, sessions: Arc<SessionManager>, session_id: String) -> Self
    where
        S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
            cleanup: Some((sessions, session_id)),
        }
    }
}

impl Body for SseBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.stream.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(data))) => Poll::Ready(Some(Ok(Frame::data(data)))),
            Poll::Ready(Some(Err(never))) => match never {},
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for SseBody {
    fn drop(&mut self) {
        if let Some((sessions, session_id)) = self.cleanup.take() {
            info!("SSE stream for session {} ended", session_id);
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    sessions.close_session(&session_id).await;
                });
            }
        }
    }
}
