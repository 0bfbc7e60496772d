//! Frame-level message parsing and classification.
//!
//! Parsing happens in two steps so batches degrade gracefully: first the raw
//! frame is decoded into a single JSON value or a batch of values, then each
//! value is classified independently. A malformed sub-message inside a batch
//! yields an error entry for that slot without poisoning its siblings.

use serde_json::Value;

use crate::JSONRPC_VERSION;
use crate::envelope::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, RequestId};

/// A decoded frame: either one message value or a batch of them.
#[derive(Debug, Clone)]
pub enum Payload {
    Single(Value),
    Batch(Vec<Value>),
}

/// A classified inbound message.
#[derive(Debug, Clone)]
pub enum Incoming {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl Incoming {
    pub fn method(&self) -> &str {
        match self {
            Incoming::Request(req) => &req.method,
            Incoming::Notification(note) => &note.method,
        }
    }

    pub fn params(&self) -> Option<&Value> {
        match self {
            Incoming::Request(req) => req.params.as_ref(),
            Incoming::Notification(note) => note.params.as_ref(),
        }
    }
}

/// Decode a raw frame. Malformed JSON maps to a parse error whose id is null.
pub fn parse_payload(raw: &str) -> Result<Payload, JsonRpcError> {
    let value: Value = serde_json::from_str(raw).map_err(|_| JsonRpcError::parse_error())?;
    match value {
        Value::Array(items) => Ok(Payload::Batch(items)),
        other => Ok(Payload::Single(other)),
    }
}

/// Classify one message value into a request or notification.
///
/// Envelope rules enforced here:
/// - the value must be an object with `"jsonrpc": "2.0"` and a string `method`
/// - `id` must be a string or integer; a missing or `null` id makes the
///   message a notification; any other id type is invalid
/// - `params`, when present, must be an object or array
pub fn classify(value: &Value) -> Result<Incoming, JsonRpcError> {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            return Err(JsonRpcError::invalid_request(
                None,
                "Invalid Request: message must be an object",
            ));
        }
    };

    // Recover the id early so envelope errors can echo it when it is usable.
    let id = match obj.get("id") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(RequestId::String(s.clone())),
        Some(Value::Number(n)) if n.is_i64() => Some(RequestId::Number(n.as_i64().unwrap())),
        Some(_) => {
            return Err(JsonRpcError::invalid_request(
                None,
                "Invalid Request: id must be a string or integer",
            ));
        }
    };

    match obj.get("jsonrpc") {
        Some(Value::String(version)) if version == JSONRPC_VERSION => {}
        _ => {
            return Err(JsonRpcError::invalid_request(
                id,
                "Invalid Request: missing or invalid jsonrpc version",
            ));
        }
    }

    let method = match obj.get("method") {
        Some(Value::String(method)) if !method.is_empty() => method.clone(),
        _ => {
            return Err(JsonRpcError::invalid_request(
                id,
                "Invalid Request: missing or invalid method",
            ));
        }
    };

    let params = match obj.get("params") {
        None => None,
        Some(params @ (Value::Object(_) | Value::Array(_))) => Some(params.clone()),
        Some(_) => {
            return Err(JsonRpcError::invalid_request(
                id,
                "Invalid Request: params must be an object or array",
            ));
        }
    };

    match id {
        Some(id) => Ok(Incoming::Request(JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method,
            params,
        })),
        None => Ok(Incoming::Notification(JsonRpcNotification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method,
            params,
        })),
    }
}
