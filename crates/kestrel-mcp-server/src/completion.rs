//! Argument completion sources for prompts and resource templates.

use std::sync::Arc;

use async_trait::async_trait;

use kestrel_mcp_protocol::{Completion, McpResult};

/// Produces completion candidates for a partial argument value.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, current: &str) -> McpResult<Vec<String>>;
}

/// Where an argument's completions come from: a static value list
/// (prefix-filtered) or a provider implementation.
#[derive(Clone)]
pub enum CompletionSource {
    Values(Vec<String>),
    Provider(Arc<dyn CompletionProvider>),
}

impl std::fmt::Debug for CompletionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionSource::Values(values) => {
                f.debug_tuple("Values").field(&values.len()).finish()
            }
            CompletionSource::Provider(_) => f.debug_tuple("Provider").finish(),
        }
    }
}

impl CompletionSource {
    /// Resolve candidates for the current partial value, capped at `limit`.
    pub async fn complete(&self, current: &str, limit: usize) -> McpResult<Completion> {
        let values = match self {
            CompletionSource::Values(values) => {
                let needle = current.to_ascii_lowercase();
                values
                    .iter()
                    .filter(|v| v.to_ascii_lowercase().starts_with(&needle))
                    .cloned()
                    .collect()
            }
            CompletionSource::Provider(provider) => provider.complete(current).await?,
        };
        Ok(Completion::paginated(values, limit))
    }
}
