//! End-to-end dispatcher scenarios: a built server driven frame by frame.

use std::sync::Arc;

use serde_json::{Value, json};

use kestrel_mcp_server::prelude::*;
use kestrel_mcp_server::{Dispatcher, ToolOutput};

/// A server with one tool, one resource, one template and one prompt.
async fn build_server() -> McpServer {
    McpServer::builder()
        .name("scenario-server")
        .version("0.1.0")
        .tool(
            ToolDef::new("greet_user")
                .description("Greets a user by name")
                .param(ParamSpec::string("name"))
                .param(ParamSpec::integer("count").with_default(json!(1)))
                .handler_fn(|args| {
                    Box::pin(async move {
                        let name = args.str_arg("name").unwrap_or("world").to_string();
                        let count = args.int_arg("count").unwrap_or(1);
                        let one = format!("Hello, {}!", name);
                        let text = vec![one; count.max(1) as usize].join(" ");
                        Ok(ToolOutput::from(text))
                    })
                }),
        )
        .tool(
            ToolDef::new("explode")
                .description("Always fails")
                .handler_fn(|_args| {
                    Box::pin(async { Err(McpError::internal("the tool exploded")) })
                }),
        )
        .resource(
            ResourceDef::new("config://app/name", "app_name")
                .mime_type("text/plain")
                .handler_fn(|_uri| Box::pin(async { Ok("kestrel".into()) })),
        )
        .resource_template(
            TemplateDef::new("user://{userId}/profile", "user_profile")
                .completion("userId", CompletionSource::Values(vec!["42".into(), "43".into()]))
                .handler_fn(|_uri, vars| {
                    Box::pin(async move {
                        let user_id = vars.get("userId").cloned().unwrap_or_default();
                        Ok(json!({
                            "id": user_id,
                            "name": format!("User {}", user_id),
                            "email": format!("{}@example.com", user_id),
                        })
                        .into())
                    })
                }),
        )
        .prompt(
            PromptDef::new("code_review")
                .description("Review some code")
                .argument(PromptArgument::new("language").required())
                .completion(
                    "language",
                    CompletionSource::Values(vec!["python".into(), "php".into(), "rust".into()]),
                )
                .handler_fn(|args| {
                    Box::pin(async move {
                        let language = args
                            .get("language")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown")
                            .to_string();
                        Ok(json!({"user": format!("Review this {} code", language)}).into())
                    })
                }),
        )
        .build()
        .unwrap()
}

struct Client {
    dispatcher: Arc<Dispatcher>,
    session_id: String,
}

impl Client {
    async fn connect(server: &McpServer) -> Self {
        let session_id = server.sessions().create_session().await.unwrap();
        Self {
            dispatcher: Arc::clone(server.dispatcher()),
            session_id,
        }
    }

    async fn send(&self, frame: &str) -> Option<Value> {
        let response = self.dispatcher.dispatch_frame(&self.session_id, frame).await?;
        Some(serde_json::from_str(&response).unwrap())
    }

    /// Run the initialize + initialized handshake.
    async fn handshake(&self) -> Value {
        let response = self
            .send(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"0"}}}"#,
            )
            .await
            .unwrap();
        let none = self
            .send(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(none.is_none(), "notifications never produce responses");
        response
    }
}

#[tokio::test]
async fn scenario_initialize_then_call_tool() {
    let server = build_server().await;
    let client = Client::connect(&server).await;

    let init = client.handshake().await;
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["serverInfo"]["name"], "scenario-server");
    assert_eq!(init["result"]["protocolVersion"], "2024-11-05");
    assert!(init["result"]["capabilities"]["tools"].is_object());

    let response = client
        .send(
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"greet_user","arguments":{"name":"Kyrian"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(
        response,
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {
                "content": [{"type": "text", "text": "Hello, Kyrian!"}],
                "isError": false
            }
        })
    );
}

#[tokio::test]
async fn scenario_unknown_tool() {
    let server = build_server().await;
    let client = Client::connect(&server).await;
    client.handshake().await;

    let response = client
        .send(r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"nope","arguments":{}}}"#)
        .await
        .unwrap();
    assert_eq!(response["id"], 3);
    assert_eq!(response["error"]["code"], -32602);
    assert_eq!(response["error"]["message"], "Tool not found: nope");
}

#[tokio::test]
async fn scenario_argument_coercion() {
    let server = build_server().await;
    let client = Client::connect(&server).await;
    client.handshake().await;

    // "3" coerces to the integer 3.
    let response = client
        .send(
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"greet_user","arguments":{"name":"Ada","count":"3"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(
        response["result"]["content"][0]["text"],
        "Hello, Ada! Hello, Ada! Hello, Ada!"
    );

    // "3.5" is rejected with the parameter named.
    let response = client
        .send(
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"greet_user","arguments":{"name":"Ada","count":"3.5"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], -32602);
    assert!(response["error"]["message"].as_str().unwrap().contains("count"));
}

#[tokio::test]
async fn scenario_tool_failure_is_not_a_protocol_error() {
    let server = build_server().await;
    let client = Client::connect(&server).await;
    client.handshake().await;

    let response = client
        .send(r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"explode","arguments":{}}}"#)
        .await
        .unwrap();
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    assert!(
        response["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("exploded")
    );
}

#[tokio::test]
async fn scenario_resource_read_via_template() {
    let server = build_server().await;
    let client = Client::connect(&server).await;
    client.handshake().await;

    let response = client
        .send(r#"{"jsonrpc":"2.0","id":7,"method":"resources/read","params":{"uri":"user://42/profile"}}"#)
        .await
        .unwrap();
    let contents = &response["result"]["contents"][0];
    assert_eq!(contents["uri"], "user://42/profile");
    assert_eq!(contents["mimeType"], "application/json");

    let body: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert_eq!(
        body,
        json!({"id": "42", "name": "User 42", "email": "42@example.com"})
    );
}

#[tokio::test]
async fn scenario_exact_resource_wins_over_template() {
    let server = build_server().await;
    let client = Client::connect(&server).await;
    client.handshake().await;

    let response = client
        .send(r#"{"jsonrpc":"2.0","id":8,"method":"resources/read","params":{"uri":"config://app/name"}}"#)
        .await
        .unwrap();
    let contents = &response["result"]["contents"][0];
    assert_eq!(contents["text"], "kestrel");
    assert_eq!(contents["mimeType"], "text/plain");

    let response = client
        .send(r#"{"jsonrpc":"2.0","id":9,"method":"resources/read","params":{"uri":"nowhere://else"}}"#)
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn scenario_subscribe_and_update_fanout() {
    let server = build_server().await;
    let session_a = Client::connect(&server).await;
    let session_b = Client::connect(&server).await;
    session_a.handshake().await;
    session_b.handshake().await;

    let response = session_a
        .send(r#"{"jsonrpc":"2.0","id":10,"method":"resources/subscribe","params":{"uri":"config://app/name"}}"#)
        .await
        .unwrap();
    assert_eq!(response["result"], json!({}));

    // Subscribing twice is idempotent: still exactly one frame per update.
    session_a
        .send(r#"{"jsonrpc":"2.0","id":11,"method":"resources/subscribe","params":{"uri":"config://app/name"}}"#)
        .await
        .unwrap();

    server.notify_resource_updated("config://app/name").await;

    let frames_a = server.sessions().drain_frames(&session_a.session_id).await;
    assert_eq!(frames_a.len(), 1);
    let frame: Value = serde_json::from_str(&frames_a[0]).unwrap();
    assert_eq!(frame["method"], "notifications/resources/updated");
    assert_eq!(frame["params"]["uri"], "config://app/name");

    assert!(server.sessions().drain_frames(&session_b.session_id).await.is_empty());

    // After unsubscribe the updates stop.
    session_a
        .send(r#"{"jsonrpc":"2.0","id":12,"method":"resources/unsubscribe","params":{"uri":"config://app/name"}}"#)
        .await
        .unwrap();
    server.notify_resource_updated("config://app/name").await;
    assert!(server.sessions().drain_frames(&session_a.session_id).await.is_empty());
}

#[tokio::test]
async fn resource_read_equals_direct_handler_plus_formatter() {
    use kestrel_mcp_server::format::format_resource_output;

    let server = build_server().await;
    let client = Client::connect(&server).await;
    client.handshake().await;

    let wire = client
        .send(r#"{"jsonrpc":"2.0","id":60,"method":"resources/read","params":{"uri":"config://app/name"}}"#)
        .await
        .unwrap();
    let wire_contents: Vec<ResourceContents> =
        serde_json::from_value(wire["result"]["contents"].clone()).unwrap();

    let entry = server
        .registry()
        .read()
        .await
        .find_resource("config://app/name")
        .cloned()
        .unwrap();
    let direct = entry.handler.read("config://app/name").await.unwrap();
    let direct_contents = format_resource_output(
        "config://app/name",
        entry.resource.mime_type.as_deref(),
        direct,
    )
    .unwrap();

    assert_eq!(wire_contents, direct_contents);
}

#[tokio::test]
async fn unknown_protocol_version_falls_back_to_latest() {
    let server = build_server().await;
    let client = Client::connect(&server).await;

    let response = client
        .send(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1999-01-01","capabilities":{},"clientInfo":{"name":"t","version":"0"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(response["result"]["protocolVersion"], "2025-06-18");
}

#[tokio::test]
async fn scenario_batch_with_mixed_messages() {
    let server = build_server().await;
    let client = Client::connect(&server).await;
    client.handshake().await;

    let response = client
        .send(
            r#"[
                {"jsonrpc":"2.0","id":10,"method":"tools/list"},
                {"jsonrpc":"2.0","method":"notifications/initialized"},
                {"jsonrpc":"2.0","id":11,"method":"tools/call","params":{"name":"unknown"}}
            ]"#,
        )
        .await
        .unwrap();

    let batch = response.as_array().unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0]["id"], 10);
    assert!(batch[0]["result"]["tools"].is_array());
    assert_eq!(batch[1]["id"], 11);
    assert_eq!(batch[1]["error"]["code"], -32602);
}

#[tokio::test]
async fn lifecycle_gate_rejects_methods_before_handshake() {
    let server = build_server().await;
    let client = Client::connect(&server).await;

    for method in ["tools/list", "resources/read", "prompts/get", "completion/complete"] {
        let frame = format!(r#"{{"jsonrpc":"2.0","id":1,"method":"{}"}}"#, method);
        let response = client.send(&frame).await.unwrap();
        assert_eq!(response["error"]["code"], -32600, "method {}", method);
        assert_eq!(response["error"]["message"], "Session not initialized");
    }

    // ping is exempt even before the handshake.
    let response = client.send(r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#).await.unwrap();
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn initialize_alone_is_not_enough() {
    let server = build_server().await;
    let client = Client::connect(&server).await;

    client
        .send(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"0"}}}"#,
        )
        .await
        .unwrap();

    // Still gated until notifications/initialized arrives.
    let response = client.send(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await.unwrap();
    assert_eq!(response["error"]["code"], -32600);

    let none = client
        .send(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await;
    assert!(none.is_none());
    let response = client.send(r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#).await.unwrap();
    assert!(response["result"]["tools"].is_array());
}

#[tokio::test]
async fn prompts_get_and_required_arguments() {
    let server = build_server().await;
    let client = Client::connect(&server).await;
    client.handshake().await;

    let response = client
        .send(
            r#"{"jsonrpc":"2.0","id":20,"method":"prompts/get","params":{"name":"code_review","arguments":{"language":"rust"}}}"#,
        )
        .await
        .unwrap();
    let message = &response["result"]["messages"][0];
    assert_eq!(message["role"], "user");
    assert_eq!(message["content"]["text"], "Review this rust code");

    let response = client
        .send(r#"{"jsonrpc":"2.0","id":21,"method":"prompts/get","params":{"name":"code_review"}}"#)
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], -32602);
    assert!(response["error"]["message"].as_str().unwrap().contains("language"));
}

#[tokio::test]
async fn completion_for_prompt_and_template() {
    let server = build_server().await;
    let client = Client::connect(&server).await;
    client.handshake().await;

    let response = client
        .send(
            r#"{"jsonrpc":"2.0","id":30,"method":"completion/complete","params":{"ref":{"type":"ref/prompt","name":"code_review"},"argument":{"name":"language","value":"p"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(response["result"]["completion"]["values"], json!(["python", "php"]));

    let response = client
        .send(
            r#"{"jsonrpc":"2.0","id":31,"method":"completion/complete","params":{"ref":{"type":"ref/resource","uri":"user://{userId}/profile"},"argument":{"name":"userId","value":"4"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(response["result"]["completion"]["values"], json!(["42", "43"]));
}

#[tokio::test]
async fn logging_set_level_gates_messages() {
    let server = build_server().await;
    let client = Client::connect(&server).await;
    client.handshake().await;

    let response = client
        .send(r#"{"jsonrpc":"2.0","id":40,"method":"logging/setLevel","params":{"level":"warning"}}"#)
        .await
        .unwrap();
    assert_eq!(response["result"], json!({}));

    server.send_log_message(LoggingLevel::Info, json!("not for you")).await;
    assert!(server.sessions().drain_frames(&client.session_id).await.is_empty());

    server.send_log_message(LoggingLevel::Error, json!("this one matters")).await;
    let frames = server.sessions().drain_frames(&client.session_id).await;
    assert_eq!(frames.len(), 1);
    assert!(frames[0].contains("notifications/message"));
}

#[tokio::test]
async fn pagination_walks_every_tool_exactly_once() {
    let mut builder = McpServer::builder().name("paged").version("0").page_size(3);
    for index in 0..8 {
        builder = builder.tool(
            ToolDef::new(format!("tool_{:02}", index))
                .handler_fn(|_args| Box::pin(async { Ok(ToolOutput::from("ok")) })),
        );
    }
    let server = builder.build().unwrap();
    let client = Client::connect(&server).await;
    client.handshake().await;

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    let mut id = 100;
    loop {
        let frame = match &cursor {
            Some(cursor) => format!(
                r#"{{"jsonrpc":"2.0","id":{},"method":"tools/list","params":{{"cursor":"{}"}}}}"#,
                id, cursor
            ),
            None => format!(r#"{{"jsonrpc":"2.0","id":{},"method":"tools/list"}}"#, id),
        };
        id += 1;
        let response = client.send(&frame).await.unwrap();
        for tool in response["result"]["tools"].as_array().unwrap() {
            seen.push(tool["name"].as_str().unwrap().to_string());
        }
        match response["result"]["nextCursor"].as_str() {
            Some(next) => cursor = Some(next.to_string()),
            None => break,
        }
    }

    let expected: Vec<String> = (0..8).map(|i| format!("tool_{:02}", i)).collect();
    assert_eq!(seen, expected);

    // Bad cursors are invalid params.
    let response = client
        .send(r#"{"jsonrpc":"2.0","id":200,"method":"tools/list","params":{"cursor":"?????"}}"#)
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn subscribe_without_capability_is_method_not_found() {
    // Explicit capabilities without resources.subscribe.
    let server = McpServer::builder()
        .name("no-subscribe")
        .version("0")
        .capabilities(ServerCapabilities::default().with_tools(true))
        .tool(
            ToolDef::new("t").handler_fn(|_args| Box::pin(async { Ok(ToolOutput::from("ok")) })),
        )
        .build()
        .unwrap();
    let client = Client::connect(&server).await;
    client.handshake().await;

    let response = client
        .send(r#"{"jsonrpc":"2.0","id":50,"method":"resources/subscribe","params":{"uri":"x://y"}}"#)
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], -32601);
}
