//! Argument-completion request and result payloads.

use serde::{Deserialize, Serialize};

/// The element a completion request targets: a prompt by name, or a
/// resource template by its URI template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompletionReference {
    #[serde(rename = "ref/prompt")]
    Prompt { name: String },
    #[serde(rename = "ref/resource")]
    Resource { uri: String },
}

/// The argument being completed and its partial value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteArgument {
    pub name: String,
    pub value: String,
}

/// `completion/complete` request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteParams {
    #[serde(rename = "ref")]
    pub reference: CompletionReference,
    pub argument: CompleteArgument,
}

/// A page of completion values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

impl Completion {
    pub fn new(values: Vec<String>) -> Self {
        Self {
            values,
            total: None,
            has_more: None,
        }
    }

    /// Cap to `limit` values, recording the uncapped total and whether more
    /// remain.
    pub fn paginated(mut values: Vec<String>, limit: usize) -> Self {
        let total = values.len() as u64;
        let has_more = values.len() > limit;
        values.truncate(limit);
        Self {
            values,
            total: Some(total),
            has_more: Some(has_more),
        }
    }
}

/// `completion/complete` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteResult {
    pub completion: Completion,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_discriminants() {
        let prompt: CompletionReference =
            serde_json::from_value(json!({"type": "ref/prompt", "name": "greet"})).unwrap();
        assert_eq!(prompt, CompletionReference::Prompt { name: "greet".to_string() });

        let resource: CompletionReference =
            serde_json::from_value(json!({"type": "ref/resource", "uri": "user://{userId}/profile"}))
                .unwrap();
        assert_eq!(
            resource,
            CompletionReference::Resource { uri: "user://{userId}/profile".to_string() }
        );
    }

    #[test]
    fn test_params_ref_field_name() {
        let params: CompleteParams = serde_json::from_value(json!({
            "ref": {"type": "ref/prompt", "name": "greet"},
            "argument": {"name": "language", "value": "ru"}
        }))
        .unwrap();
        assert_eq!(params.argument.name, "language");
    }

    #[test]
    fn test_paginated_caps_values() {
        let values: Vec<String> = (0..120).map(|i| format!("v{}", i)).collect();
        let completion = Completion::paginated(values, 100);
        assert_eq!(completion.values.len(), 100);
        assert_eq!(completion.total, Some(120));
        assert_eq!(completion.has_more, Some(true));
    }

    #[test]
    fn test_paginated_under_limit() {
        let completion = Completion::paginated(vec!["a".to_string()], 100);
        assert_eq!(completion.total, Some(1));
        assert_eq!(completion.has_more, Some(false));
    }
}
