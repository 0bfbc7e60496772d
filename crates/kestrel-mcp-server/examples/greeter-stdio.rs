//! Minimal stdio server with manually registered elements.
//!
//! Run with an MCP client, or poke it by hand:
//!
//! ```text
//! echo '{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"shell","version":"0"}}}' \
//!   | cargo run --example greeter-stdio
//! ```

use serde_json::json;

use kestrel_mcp_server::prelude::*;

#[tokio::main]
async fn main() -> McpResult<()> {
    // stdout is the protocol channel; diagnostics go to stderr only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let server = McpServer::builder()
        .name("greeter")
        .version(env!("CARGO_PKG_VERSION"))
        .instructions("Call greet_user to say hello.")
        .tool(
            ToolDef::new("greet_user")
                .description("Greets a user by name")
                .param(ParamSpec::string("name").describe("Who to greet"))
                .param(ParamSpec::integer("count").with_default(json!(1)))
                .handler_fn(|args| {
                    Box::pin(async move {
                        let name = args.str_arg("name").unwrap_or("world").to_string();
                        let count = args.int_arg("count").unwrap_or(1).max(1);
                        let greeting = format!("Hello, {}!", name);
                        Ok(ToolOutput::from(vec![greeting; count as usize].join(" ")))
                    })
                }),
        )
        .resource(
            ResourceDef::new("config://app/name", "app_name")
                .description("The application display name")
                .mime_type("text/plain")
                .handler_fn(|_uri| Box::pin(async { Ok("greeter".into()) })),
        )
        .build()?;

    server.run_stdio().await
}
