//! Response formatting: coercing handler return values into MCP envelopes.
//!
//! Handlers return loosely-shaped output; the formatter normalizes it into
//! `Content` sequences (tools), `ResourceContents` sequences (resource
//! reads) or `PromptMessage` sequences (prompts). Decision order is strict;
//! the first matching rule wins.

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use tracing::warn;

use kestrel_mcp_protocol::{
    Content, EmbeddedResource, McpError, McpResult, PromptMessage, ResourceContents, Role,
};

/// What a tool handler may return.
#[derive(Debug, Clone)]
pub enum ToolOutput {
    Content(Content),
    Contents(Vec<Content>),
    /// Any JSON value: scalars stringify, structures pretty-print.
    Json(Value),
}

impl From<Content> for ToolOutput {
    fn from(content: Content) -> Self {
        ToolOutput::Content(content)
    }
}

impl From<Vec<Content>> for ToolOutput {
    fn from(contents: Vec<Content>) -> Self {
        ToolOutput::Contents(contents)
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Json(value)
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Json(Value::String(text))
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Json(Value::String(text.to_string()))
    }
}

impl From<()> for ToolOutput {
    fn from(_: ()) -> Self {
        ToolOutput::Json(Value::Null)
    }
}

macro_rules! tool_output_from_scalar {
    ($($ty:ty),*) => {
        $(impl From<$ty> for ToolOutput {
            fn from(value: $ty) -> Self {
                ToolOutput::Json(Value::from(value))
            }
        })*
    };
}

tool_output_from_scalar!(bool, i32, i64, u32, u64, f64);

/// Coerce a tool result into a content sequence.
pub fn format_tool_output(output: ToolOutput) -> Vec<Content> {
    match output {
        ToolOutput::Contents(contents) => contents,
        ToolOutput::Content(content) => vec![content],
        ToolOutput::Json(value) => vec![json_to_content(value)],
    }
}

fn json_to_content(value: Value) -> Content {
    match value {
        Value::Null => Content::text("(null)"),
        Value::Bool(b) => Content::text(if b { "true" } else { "false" }),
        Value::String(text) => Content::text(text),
        Value::Number(number) => Content::text(number.to_string()),
        structured => Content::text(pretty_json(&structured)),
    }
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// What a resource handler may return.
#[derive(Debug, Clone)]
pub enum ResourceOutput {
    Contents(ResourceContents),
    ContentsList(Vec<ResourceContents>),
    Embedded(EmbeddedResource),
    EmbeddedList(Vec<EmbeddedResource>),
    Text(String),
    Bytes(Vec<u8>),
    /// A readable file; its bytes are blob-encoded.
    File(PathBuf),
    /// A map with a `blob` or `text` key, or any other JSON structure.
    Json(Value),
}

impl From<ResourceContents> for ResourceOutput {
    fn from(contents: ResourceContents) -> Self {
        ResourceOutput::Contents(contents)
    }
}

impl From<String> for ResourceOutput {
    fn from(text: String) -> Self {
        ResourceOutput::Text(text)
    }
}

impl From<&str> for ResourceOutput {
    fn from(text: &str) -> Self {
        ResourceOutput::Text(text.to_string())
    }
}

impl From<Vec<u8>> for ResourceOutput {
    fn from(bytes: Vec<u8>) -> Self {
        ResourceOutput::Bytes(bytes)
    }
}

impl From<Value> for ResourceOutput {
    fn from(value: Value) -> Self {
        ResourceOutput::Json(value)
    }
}

/// Guess a MIME type from the leading bytes of text content.
pub fn guess_mime_type(text: &str) -> &'static str {
    let trimmed = text.trim_start();
    let lower = trimmed.get(..5).map(str::to_ascii_lowercase);
    if lower.as_deref() == Some("<html") {
        return "text/html";
    }
    if trimmed.starts_with("<?xml") {
        return "application/xml";
    }
    let trimmed_end = trimmed.trim_end();
    if (trimmed.starts_with('{') && trimmed_end.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed_end.ends_with(']'))
    {
        return "application/json";
    }
    "text/plain"
}

/// Coerce a resource read result into a `ResourceContents` sequence.
///
/// `uri` is the URI being read; `registered_mime` is the MIME type the
/// resource was registered with, used before sniffing.
pub fn format_resource_output(
    uri: &str,
    registered_mime: Option<&str>,
    output: ResourceOutput,
) -> McpResult<Vec<ResourceContents>> {
    match output {
        ResourceOutput::ContentsList(contents) => Ok(contents),
        ResourceOutput::Contents(contents) => Ok(vec![contents]),
        ResourceOutput::Embedded(embedded) => Ok(vec![embedded.resource]),
        ResourceOutput::EmbeddedList(embedded) => {
            Ok(embedded.into_iter().map(|e| e.resource).collect())
        }
        ResourceOutput::Text(text) => {
            let mime = registered_mime
                .map(str::to_string)
                .unwrap_or_else(|| guess_mime_type(&text).to_string());
            Ok(vec![ResourceContents::text(uri, text, mime)])
        }
        ResourceOutput::Bytes(bytes) => {
            let mime = registered_mime.unwrap_or("application/octet-stream");
            Ok(vec![ResourceContents::blob(uri, BASE64.encode(bytes), mime)])
        }
        ResourceOutput::File(path) => {
            let bytes = std::fs::read(&path)
                .map_err(|err| McpError::internal(format!("failed to read resource file: {}", err)))?;
            let mime = registered_mime.unwrap_or("application/octet-stream");
            Ok(vec![ResourceContents::blob(uri, BASE64.encode(bytes), mime)])
        }
        ResourceOutput::Json(value) => format_resource_json(uri, registered_mime, value),
    }
}

fn format_resource_json(
    uri: &str,
    registered_mime: Option<&str>,
    value: Value,
) -> McpResult<Vec<ResourceContents>> {
    if let Value::Object(map) = &value {
        if let Some(Value::String(blob)) = map.get("blob") {
            let mime = map
                .get("mimeType")
                .and_then(Value::as_str)
                .or(registered_mime)
                .unwrap_or("application/octet-stream");
            return Ok(vec![ResourceContents::blob(uri, blob.clone(), mime)]);
        }
        if let Some(Value::String(text)) = map.get("text") {
            let mime = map
                .get("mimeType")
                .and_then(Value::as_str)
                .or(registered_mime)
                .unwrap_or("text/plain");
            return Ok(vec![ResourceContents::text(uri, text.clone(), mime)]);
        }
    }

    match &value {
        Value::Object(_) | Value::Array(_) => {
            let mime = match registered_mime {
                Some(mime) if mime.contains("json") => mime.to_string(),
                Some(mime) => {
                    warn!(
                        "resource {} registered as {} but returned a structure; serving application/json",
                        uri, mime
                    );
                    "application/json".to_string()
                }
                None => "application/json".to_string(),
            };
            Ok(vec![ResourceContents::text(uri, pretty_json(&value), mime)])
        }
        _ => Err(McpError::internal(format!(
            "resource handler for {} returned an unformattable value",
            uri
        ))),
    }
}

/// What a prompt handler may return.
#[derive(Debug, Clone)]
pub enum PromptOutput {
    Messages(Vec<PromptMessage>),
    /// `{user: …, assistant: …}` shorthand or a sequence of
    /// `{role, content}` maps.
    Json(Value),
}

impl From<Vec<PromptMessage>> for PromptOutput {
    fn from(messages: Vec<PromptMessage>) -> Self {
        PromptOutput::Messages(messages)
    }
}

impl From<Value> for PromptOutput {
    fn from(value: Value) -> Self {
        PromptOutput::Json(value)
    }
}

/// Coerce a prompt result into a message sequence.
pub fn format_prompt_output(output: PromptOutput) -> McpResult<Vec<PromptMessage>> {
    let value = match output {
        PromptOutput::Messages(messages) => return Ok(messages),
        PromptOutput::Json(value) => value,
    };

    // {user: "...", assistant: "..."} shorthand.
    if let Value::Object(map) = &value {
        if !map.is_empty()
            && map.keys().all(|k| k.as_str() == "user" || k.as_str() == "assistant")
        {
            let mut messages = Vec::new();
            if let Some(text) = map.get("user") {
                messages.push(PromptMessage::new(Role::User, shorthand_content(text)?));
            }
            if let Some(text) = map.get("assistant") {
                messages.push(PromptMessage::new(Role::Assistant, shorthand_content(text)?));
            }
            return Ok(messages);
        }
    }

    let Value::Array(items) = value else {
        return Err(McpError::internal(
            "prompt handler returned neither messages nor a message list",
        ));
    };

    let mut messages = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        messages.push(parse_prompt_message(index, item)?);
    }
    Ok(messages)
}

fn shorthand_content(value: &Value) -> McpResult<Content> {
    match value {
        Value::String(text) => Ok(Content::text(text.clone())),
        other => content_from_value(other.clone())
            .ok_or_else(|| McpError::internal("prompt shorthand content must be text or a content object")),
    }
}

fn parse_prompt_message(index: usize, item: Value) -> McpResult<PromptMessage> {
    // Already a full message object?
    if let Ok(message) = serde_json::from_value::<PromptMessage>(item.clone()) {
        return Ok(message);
    }

    let Value::Object(map) = item else {
        return Err(McpError::internal(format!(
            "prompt message at index {} is not an object",
            index
        )));
    };

    let role = map
        .get("role")
        .and_then(Value::as_str)
        .and_then(Role::parse)
        .ok_or_else(|| {
            McpError::internal(format!("prompt message at index {} has an unknown role", index))
        })?;

    let content_value = map.get("content").cloned().ok_or_else(|| {
        McpError::internal(format!("prompt message at index {} is missing content", index))
    })?;

    let content = match content_value {
        Value::String(text) => Content::text(text),
        other => content_from_value(other).ok_or_else(|| {
            McpError::internal(format!(
                "prompt message at index {} has an invalid content type",
                index
            ))
        })?,
    };

    Ok(PromptMessage::new(role, content))
}

fn content_from_value(value: Value) -> Option<Content> {
    serde_json::from_value::<Content>(value).ok()
}
