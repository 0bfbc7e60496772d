//! Attribute-driven discovery, exercised through a real server build.

use std::sync::Arc;

use serde_json::{Value, json};

use kestrel_mcp_derive::{mcp_prompt, mcp_resource, mcp_resource_template, mcp_tool};
use kestrel_mcp_server::prelude::*;
use kestrel_mcp_server::registry::CACHE_SCHEMA_TAG;
use kestrel_mcp_server::{Dispatcher, ToolOutput};

/// Adds two integers.
#[mcp_tool]
async fn add_numbers(a: i64, b: i64) -> McpResult<i64> {
    Ok(a + b)
}

#[mcp_tool(name = "shout", description = "Upper-cases text", read_only)]
async fn shout_text(
    #[param(description = "Text to upper-case")] text: String,
    suffix: Option<String>,
) -> McpResult<String> {
    let mut result = text.to_uppercase();
    if let Some(suffix) = suffix {
        result.push_str(&suffix);
    }
    Ok(result)
}

/// Echoes a user id back.
#[mcp_tool]
async fn echo_user(#[param(name = "userId")] user_id: i64) -> McpResult<i64> {
    Ok(user_id)
}

/// Message of the day.
#[mcp_resource(uri = "sys://motd", mime_type = "text/plain")]
async fn motd() -> McpResult<String> {
    Ok("be kind to your transports".to_string())
}

#[mcp_resource_template(uri_template = "note://{slug}", mime_type = "text/plain")]
async fn note(#[complete("welcome", "farewell")] slug: String, uri: String) -> McpResult<String> {
    Ok(format!("note {} at {}", slug, uri))
}

/// Summarize a topic.
#[mcp_prompt]
async fn summarize(topic: String, style: Option<String>) -> McpResult<Value> {
    let style = style.unwrap_or_else(|| "short".to_string());
    Ok(json!({"user": format!("Give a {} summary of {}", style, topic)}))
}

async fn handshake(dispatcher: &Arc<Dispatcher>, session_id: &str) {
    dispatcher
        .dispatch_frame(
            session_id,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"0"}}}"#,
        )
        .await
        .unwrap();
    let none = dispatcher
        .dispatch_frame(session_id, r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await;
    assert!(none.is_none());
}

async fn send(dispatcher: &Arc<Dispatcher>, session_id: &str, frame: &str) -> Value {
    let response = dispatcher.dispatch_frame(session_id, frame).await.unwrap();
    serde_json::from_str(&response).unwrap()
}

#[tokio::test]
async fn discovered_elements_register_and_serve() {
    let server = McpServer::builder()
        .name("discovered")
        .version("0")
        .with_discovery()
        .build()
        .unwrap();

    {
        let registry = server.registry().read().await;
        assert!(registry.find_tool("add_numbers").is_some());
        assert!(registry.find_tool("shout").is_some());
        assert!(registry.find_resource("sys://motd").is_some());
        assert!(registry.find_template("note://{slug}").is_some());
        assert!(registry.find_prompt("summarize").is_some());
    }

    let session_id = server.sessions().create_session().await.unwrap();
    let dispatcher = server.dispatcher();
    handshake(dispatcher, &session_id).await;

    // Doc summary became the description; the signature became the schema.
    let response = send(dispatcher, &session_id, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
    let tools = response["result"]["tools"].as_array().unwrap();
    let add = tools.iter().find(|t| t["name"] == "add_numbers").unwrap();
    assert_eq!(add["description"], "Adds two integers.");
    assert_eq!(add["inputSchema"]["properties"]["a"]["type"], "integer");
    let mut required: Vec<&str> = add["inputSchema"]["required"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    required.sort();
    assert_eq!(required, vec!["a", "b"]);

    let shout = tools.iter().find(|t| t["name"] == "shout").unwrap();
    assert_eq!(shout["annotations"]["readOnlyHint"], true);
    assert_eq!(
        shout["inputSchema"]["properties"]["text"]["description"],
        "Text to upper-case"
    );
    assert_eq!(
        shout["inputSchema"]["properties"]["suffix"]["type"],
        json!(["string", "null"])
    );

    // Call a discovered tool end to end.
    let response = send(
        dispatcher,
        &session_id,
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"add_numbers","arguments":{"a":"2","b":40}}}"#,
    )
    .await;
    assert_eq!(response["result"]["content"][0]["text"], "42");
    assert_eq!(response["result"]["isError"], false);

    // #[param(name = "...")] binds camelCase wire names to snake_case params.
    let response = send(
        dispatcher,
        &session_id,
        r#"{"jsonrpc":"2.0","id":33,"method":"tools/call","params":{"name":"echo_user","arguments":{"userId":7}}}"#,
    )
    .await;
    assert_eq!(response["result"]["content"][0]["text"], "7");

    // Template variables bind by name; `uri` receives the original URI.
    let response = send(
        dispatcher,
        &session_id,
        r#"{"jsonrpc":"2.0","id":4,"method":"resources/read","params":{"uri":"note://welcome"}}"#,
    )
    .await;
    assert_eq!(
        response["result"]["contents"][0]["text"],
        "note welcome at note://welcome"
    );

    // The #[complete(...)] values answer completion requests.
    let response = send(
        dispatcher,
        &session_id,
        r#"{"jsonrpc":"2.0","id":5,"method":"completion/complete","params":{"ref":{"type":"ref/resource","uri":"note://{slug}"},"argument":{"name":"slug","value":"w"}}}"#,
    )
    .await;
    assert_eq!(response["result"]["completion"]["values"], json!(["welcome"]));

    // Discovered prompt renders through the shorthand form.
    let response = send(
        dispatcher,
        &session_id,
        r#"{"jsonrpc":"2.0","id":6,"method":"prompts/get","params":{"name":"summarize","arguments":{"topic":"kestrels"}}}"#,
    )
    .await;
    assert_eq!(
        response["result"]["messages"][0]["content"]["text"],
        "Give a short summary of kestrels"
    );
}

#[tokio::test]
async fn manual_registration_shadows_discovered() {
    let server = McpServer::builder()
        .name("shadowed")
        .version("0")
        .with_discovery()
        .tool(
            ToolDef::new("add_numbers")
                .description("manual replacement")
                .handler_fn(|_args| Box::pin(async { Ok(ToolOutput::from("manual")) })),
        )
        .build()
        .unwrap();

    let registry = server.registry().read().await;
    let entry = registry.find_tool("add_numbers").unwrap();
    assert!(entry.is_manual);
    assert_eq!(entry.tool.description.as_deref(), Some("manual replacement"));
}

#[tokio::test]
async fn rediscovery_restores_discovered_entries() {
    let server = McpServer::builder()
        .name("rediscover")
        .version("0")
        .with_discovery()
        .build()
        .unwrap();

    server.registry().write().await.clear_discovered(false);
    assert!(server.registry().read().await.find_tool("add_numbers").is_none());

    server.rediscover().await;
    assert!(server.registry().read().await.find_tool("add_numbers").is_some());
}

#[tokio::test]
async fn cache_round_trip_and_schema_tag() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("registry.json");

    // First build scans and saves the cache.
    let server = McpServer::builder()
        .name("cached")
        .version("0")
        .cache_path(&cache_path)
        .with_discovery()
        .build()
        .unwrap();
    assert!(cache_path.exists());
    let tool_count = server.registry().read().await.tool_count();
    assert!(tool_count >= 2);

    // Second build loads from the cache and ends up with the same catalog.
    let reloaded = McpServer::builder()
        .name("cached")
        .version("0")
        .cache_path(&cache_path)
        .with_discovery()
        .build()
        .unwrap();
    let registry = reloaded.registry().read().await;
    assert_eq!(registry.tool_count(), tool_count);
    assert!(registry.find_tool("add_numbers").is_some());
    assert!(registry.find_resource("sys://motd").is_some());
    assert!(registry.find_prompt("summarize").is_some());
    drop(registry);

    // A manual entry shadows its cached counterpart on load.
    let shadowed = McpServer::builder()
        .name("cached")
        .version("0")
        .cache_path(&cache_path)
        .with_discovery()
        .tool(
            ToolDef::new("add_numbers")
                .description("manual wins over cache")
                .handler_fn(|_args| Box::pin(async { Ok(ToolOutput::from("manual")) })),
        )
        .build()
        .unwrap();
    let registry = shadowed.registry().read().await;
    assert!(registry.find_tool("add_numbers").unwrap().is_manual);
    drop(registry);

    // A schema-tag mismatch is a miss: discovery scans again and rewrites.
    std::fs::write(
        &cache_path,
        r#"{"schema":"someone-elses-v9","tools":[],"resources":[],"templates":[],"prompts":[]}"#,
    )
    .unwrap();
    let rescanned = McpServer::builder()
        .name("cached")
        .version("0")
        .cache_path(&cache_path)
        .with_discovery()
        .build()
        .unwrap();
    assert_eq!(rescanned.registry().read().await.tool_count(), tool_count);
    let rewritten = std::fs::read_to_string(&cache_path).unwrap();
    assert!(rewritten.contains(CACHE_SCHEMA_TAG));
}
