//! JSON Schema generation from handler parameter lists.
//!
//! Every tool advertises an `inputSchema` built from its declared
//! parameters. A [`ParamSpec`] captures what a handler signature declares;
//! the generator maps it to a schema property. Explicit per-parameter schema
//! fragments override generated keys, strongest last.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use kestrel_mcp_protocol::ToolSchema;

/// The declared type of one handler parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamKind {
    Integer,
    Number,
    String,
    Boolean,
    Array(Box<ParamKind>),
    Object,
    /// String-backed enumeration matched by backing value.
    StringEnum(Vec<String>),
    /// Integer-backed enumeration matched by backing value.
    IntEnum(Vec<i64>),
    /// Unit enumeration matched by case name.
    UnitEnum(Vec<String>),
    /// Untyped: the schema omits `type`.
    Any,
}

impl ParamKind {
    /// Human label used in coercion error messages.
    pub fn expected(&self) -> String {
        match self {
            ParamKind::Integer => "integer".to_string(),
            ParamKind::Number => "number".to_string(),
            ParamKind::String => "string".to_string(),
            ParamKind::Boolean => "boolean".to_string(),
            ParamKind::Array(_) => "array".to_string(),
            ParamKind::Object => "object".to_string(),
            ParamKind::StringEnum(values) => format!("one of {:?}", values),
            ParamKind::IntEnum(values) => format!("one of {:?}", values),
            ParamKind::UnitEnum(names) => format!("one of {:?}", names),
            ParamKind::Any => "any value".to_string(),
        }
    }
}

/// One declared parameter: type, documentation, defaults and overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<Value>,
    pub nullable: bool,
    /// Explicit schema keys merged over the generated property.
    pub overrides: Option<Map<String, Value>>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            required: true,
            default: None,
            nullable: false,
            overrides: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Integer)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Boolean)
    }

    pub fn array(name: impl Into<String>, items: ParamKind) -> Self {
        Self::new(name, ParamKind::Array(Box::new(items)))
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Object)
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Any)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// A default makes the parameter optional.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self.required = false;
        self
    }

    /// Nullable parameters admit null and are not required.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self.required = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Merge explicit schema keys (format, minimum, pattern, ...) over the
    /// generated property.
    pub fn with_schema(mut self, fragment: Value) -> Self {
        if let Value::Object(map) = fragment {
            self.overrides = Some(map);
        }
        self
    }
}

fn kind_schema(kind: &ParamKind) -> Map<String, Value> {
    let value = match kind {
        ParamKind::Integer => json!({"type": "integer"}),
        ParamKind::Number => json!({"type": "number"}),
        ParamKind::String => json!({"type": "string"}),
        ParamKind::Boolean => json!({"type": "boolean"}),
        ParamKind::Array(items) => json!({"type": "array", "items": kind_schema(items)}),
        ParamKind::Object => json!({"type": "object"}),
        ParamKind::StringEnum(values) => json!({"type": "string", "enum": values}),
        ParamKind::IntEnum(values) => json!({"type": "integer", "enum": values}),
        ParamKind::UnitEnum(names) => json!({"type": "string", "enum": names}),
        ParamKind::Any => json!({}),
    };
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Build one property schema for a parameter.
pub fn param_schema(spec: &ParamSpec) -> Value {
    let mut schema = kind_schema(&spec.kind);

    if spec.nullable {
        if let Some(Value::String(t)) = schema.get("type").cloned() {
            schema.insert("type".to_string(), json!([t, "null"]));
        }
    }
    if let Some(description) = &spec.description {
        schema.insert("description".to_string(), json!(description));
    }
    if let Some(default) = &spec.default {
        schema.insert("default".to_string(), default.clone());
    }
    if let Some(overrides) = &spec.overrides {
        for (key, value) in overrides {
            schema.insert(key.clone(), value.clone());
        }
    }

    Value::Object(schema)
}

/// Build the `inputSchema` object for a parameter list.
pub fn generate_input_schema(specs: &[ParamSpec]) -> ToolSchema {
    let mut properties = HashMap::new();
    let mut required = Vec::new();

    for spec in specs {
        properties.insert(spec.name.clone(), param_schema(spec));
        if spec.required {
            required.push(spec.name.clone());
        }
    }

    let mut schema = ToolSchema::object().sealed();
    if !properties.is_empty() {
        schema = schema.with_properties(properties);
    }
    if !required.is_empty() {
        schema = schema.with_required(required);
    }
    schema
}
