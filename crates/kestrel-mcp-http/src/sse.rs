//! Server-Sent-Events wire formatting.

/// The first event on a new stream: where to POST messages for this session.
pub fn endpoint_event(message_path: &str, session_id: &str) -> String {
    format!(
        "event: endpoint\ndata: {}?clientId={}\n\n",
        message_path, session_id
    )
}

/// One outbound JSON-RPC frame. Multi-line payloads become multiple `data:`
/// lines per the SSE spec; serialized JSON never contains raw newlines, but
/// the split keeps the framing correct regardless.
pub fn message_event(frame: &str) -> String {
    let mut event = String::from("event: message\n");
    for line in frame.split('\n') {
        event.push_str("data: ");
        event.push_str(line);
        event.push('\n');
    }
    event.push('\n');
    event
}

/// A keep-alive comment; clients ignore it.
pub fn keep_alive_event() -> &'static str {
    ": keep-alive\n\n"
}
