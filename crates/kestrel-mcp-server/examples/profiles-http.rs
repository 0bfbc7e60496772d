//! HTTP+SSE server whose catalog comes entirely from attribute discovery.
//!
//! ```text
//! cargo run --example profiles-http
//! curl -N http://127.0.0.1:8080/mcp/sse
//! ```

use serde_json::{Value, json};

use kestrel_mcp_derive::{mcp_prompt, mcp_resource_template, mcp_tool};
use kestrel_mcp_server::prelude::*;

/// Looks up a user's display name.
#[mcp_tool(read_only)]
async fn lookup_user(id: i64) -> McpResult<String> {
    Ok(format!("User {}", id))
}

/// A user profile document.
#[mcp_resource_template(uri_template = "user://{userId}/profile", mime_type = "application/json")]
async fn user_profile(
    #[param(name = "userId")]
    #[complete("42", "43")]
    user_id: String,
) -> McpResult<Value> {
    Ok(json!({
        "id": user_id,
        "name": format!("User {}", user_id),
        "email": format!("{}@example.com", user_id),
    }))
}

/// Drafts a friendly welcome message.
#[mcp_prompt]
async fn welcome(name: String, tone: Option<String>) -> McpResult<Value> {
    let tone = tone.unwrap_or_else(|| "warm".to_string());
    Ok(json!({"user": format!("Write a {} welcome for {}", tone, name)}))
}

#[tokio::main]
async fn main() -> McpResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    McpServer::builder()
        .name("profiles")
        .version(env!("CARGO_PKG_VERSION"))
        .with_discovery()
        .http_bind("127.0.0.1", 8080)
        .build()?
        .run_http()
        .await
}
