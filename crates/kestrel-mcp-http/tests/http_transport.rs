//! HTTP+SSE transport behavior over real sockets.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use kestrel_mcp_http::{HttpServerConfig, HttpSseTransport};
use kestrel_mcp_session::{InMemorySessionStore, SessionManager, Transport};

async fn start_transport() -> (HttpSseTransport, Arc<SessionManager>) {
    let sessions = Arc::new(SessionManager::new(Arc::new(InMemorySessionStore::new())));
    let config = HttpServerConfig {
        port: 0,
        keep_alive: Duration::from_secs(60),
        ..Default::default()
    };
    let transport = HttpSseTransport::bind(config, Arc::clone(&sessions)).await.unwrap();
    (transport, sessions)
}

/// Send one HTTP/1.1 request and read the whole response.
async fn http_request(addr: std::net::SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => response.extend_from_slice(&buf[..n]),
            Ok(Err(_)) => break,
        }
    }
    String::from_utf8_lossy(&response).to_string()
}

fn post(path: &str, content_type: &str, body: &str) -> String {
    format!(
        "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        path,
        content_type,
        body.len(),
        body
    )
}

/// Read from the stream until `needle` appears or the timeout hits.
async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
    let mut collected = String::new();
    let mut buf = [0u8; 1024];
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !collected.contains(needle) {
        let remaining = deadline - tokio::time::Instant::now();
        match tokio::time::timeout(remaining, stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => collected.push_str(&String::from_utf8_lossy(&buf[..n])),
            _ => break,
        }
    }
    collected
}

#[tokio::test]
async fn sse_stream_emits_endpoint_event_and_frames() {
    let (transport, sessions) = start_transport().await;
    let addr = transport.local_addr();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /mcp/sse HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
        .await
        .unwrap();

    let header = read_until(&mut stream, "clientId=").await;
    assert!(header.contains("200 OK"));
    assert!(header.contains("text/event-stream"));
    assert!(header.contains("event: endpoint"));

    // Pull the session id out of the endpoint event.
    let session_id = header
        .split("clientId=")
        .nth(1)
        .unwrap()
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect::<String>();
    assert_eq!(session_id.len(), 32);
    assert!(sessions.session(&session_id).await.is_some());

    // Frames queued on the session ride the stream as message events.
    sessions
        .enqueue_frame(&session_id, r#"{"jsonrpc":"2.0","method":"notifications/ping"}"#.to_string())
        .await;
    let body = read_until(&mut stream, "notifications/ping").await;
    assert!(body.contains("event: message"));
    assert!(body.contains(r#"data: {"jsonrpc":"2.0","method":"notifications/ping"}"#));
}

#[tokio::test]
async fn post_validation_ladder() {
    let (mut transport, sessions) = start_transport().await;
    let addr = transport.local_addr();
    let session_id = sessions.create_session().await.unwrap();

    // Missing clientId.
    let response = http_request(addr, &post("/mcp/message", "application/json", "{}")).await;
    assert!(response.contains("400"));

    // Unknown clientId.
    let response = http_request(
        addr,
        &post("/mcp/message?clientId=ffffffffffffffffffffffffffffffff", "application/json", "{}"),
    )
    .await;
    assert!(response.contains("400"));

    // Wrong content type.
    let path = format!("/mcp/message?clientId={}", session_id);
    let response = http_request(addr, &post(&path, "text/plain", "{}")).await;
    assert!(response.contains("415"));

    // Empty body.
    let response = http_request(addr, &post(&path, "application/json", "")).await;
    assert!(response.contains("400"));

    // Malformed JSON: 400, and the parse error is queued for the stream.
    let response = http_request(addr, &post(&path, "application/json", "{nope")).await;
    assert!(response.contains("400"));
    assert!(response.contains("-32700"));
    let queued = sessions.drain_frames(&session_id).await;
    assert_eq!(queued.len(), 1);
    assert!(queued[0].contains("-32700"));

    // A valid message is accepted and lands on the inbound channel.
    let body = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
    let response = http_request(addr, &post(&path, "application/json", body)).await;
    assert!(response.contains("202"));

    let (inbound_session, inbound_frame) =
        tokio::time::timeout(Duration::from_secs(2), transport.receive())
            .await
            .unwrap()
            .unwrap();
    assert_eq!(inbound_session, session_id);
    assert_eq!(inbound_frame, body);
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let (transport, _sessions) = start_transport().await;
    let addr = transport.local_addr();

    let response = http_request(
        addr,
        "GET /elsewhere HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.contains("404"));

    // Wrong method on a known path.
    let response = http_request(
        addr,
        "DELETE /mcp/sse HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.contains("405"));
}

#[tokio::test]
async fn transport_contract_sessions() {
    let (transport, sessions) = start_transport().await;

    let id = transport.open_session().await.unwrap();
    assert!(transport.list_sessions().await.contains(&id));

    transport.send(&id, "{\"x\":1}".to_string()).await;
    assert_eq!(sessions.drain_frames(&id).await, vec!["{\"x\":1}"]);

    transport.close_session(&id).await;
    assert!(!transport.list_sessions().await.contains(&id));
}
