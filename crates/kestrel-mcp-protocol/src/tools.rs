//! Tool descriptors and the tools/* request/result payloads.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::Content;

/// Behavioral hints a tool may advertise. All hints are advisory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

/// JSON Schema object advertised as a tool's input contract. Property
/// schemas are raw JSON values so generated entries and explicit overrides
/// share one representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
}

impl ToolSchema {
    /// An empty `{"type": "object"}` schema.
    pub fn object() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: None,
            required: None,
            additional_properties: None,
        }
    }

    pub fn with_properties(mut self, properties: HashMap<String, Value>) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = Some(required);
        self
    }

    pub fn sealed(mut self) -> Self {
        self.additional_properties = Some(false);
        self
    }
}

/// A tool descriptor as advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: ToolSchema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

impl Tool {
    pub fn new(name: impl Into<String>, input_schema: ToolSchema) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema,
            annotations: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }
}

/// `tools/call` request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, Value>>,
}

/// `tools/call` result. A handler failure is a *successful* response with
/// `isError: true`; JSON-RPC errors are reserved for protocol problems.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<Content>,
    pub is_error: bool,
}

impl CallToolResult {
    pub fn success(content: Vec<Content>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(content: Vec<Content>) -> Self {
        Self {
            content,
            is_error: true,
        }
    }
}

/// `tools/list` result page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_schema_wire_shape() {
        let schema = ToolSchema::object()
            .with_properties(HashMap::from([
                ("name".to_string(), json!({"type": "string"})),
                ("count".to_string(), json!({"type": "integer", "default": 1})),
            ]))
            .with_required(vec!["name".to_string()])
            .sealed();

        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["type"], "object");
        assert_eq!(value["properties"]["name"]["type"], "string");
        assert_eq!(value["required"], json!(["name"]));
        assert_eq!(value["additionalProperties"], false);
    }

    #[test]
    fn test_tool_descriptor_round_trip() {
        let tool = Tool::new("greet_user", ToolSchema::object())
            .with_description("Greets a user by name")
            .with_annotations(ToolAnnotations {
                read_only_hint: Some(true),
                ..Default::default()
            });

        let text = serde_json::to_string(&tool).unwrap();
        let back: Tool = serde_json::from_str(&text).unwrap();
        assert_eq!(back, tool);
        assert!(text.contains("inputSchema"));
        assert!(text.contains("readOnlyHint"));
    }

    #[test]
    fn test_call_tool_result_is_error_always_present() {
        let ok = CallToolResult::success(vec![Content::text("done")]);
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["isError"], false);

        let failed = CallToolResult::error(vec![Content::text("boom")]);
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["isError"], true);
    }

    #[test]
    fn test_call_tool_params_optional_arguments() {
        let params: CallToolParams = serde_json::from_value(json!({"name": "greet_user"})).unwrap();
        assert!(params.arguments.is_none());
    }
}
