//! Argument marshalling: coercing a decoded JSON argument map onto a
//! handler's declared parameter list.
//!
//! The output is a positional vector aligned with the spec order. Missing
//! values fall back to the declared default, then to null for nullable
//! parameters; a missing required value is an invalid-params error naming
//! the parameter. Unknown extra keys are ignored.

use std::collections::HashMap;

use serde_json::{Number, Value};

use kestrel_mcp_protocol::{McpError, McpResult};

use crate::schema_gen::{ParamKind, ParamSpec};

/// Marshalled arguments: positional values plus name lookup.
#[derive(Debug, Clone)]
pub struct Arguments {
    names: Vec<String>,
    values: Vec<Value>,
}

impl Arguments {
    pub fn empty() -> Self {
        Self {
            names: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let index = self.names.iter().position(|n| n == name)?;
        self.values.get(index)
    }

    pub fn positional(&self) -> &[Value] {
        &self.values
    }

    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    pub fn int_arg(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_i64()
    }

    pub fn float_arg(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }

    pub fn bool_arg(&self, name: &str) -> Option<bool> {
        self.get(name)?.as_bool()
    }
}

/// Coerce an argument map to the declared parameter list.
pub fn marshal_arguments(
    specs: &[ParamSpec],
    supplied: &HashMap<String, Value>,
) -> McpResult<Arguments> {
    let mut names = Vec::with_capacity(specs.len());
    let mut values = Vec::with_capacity(specs.len());

    for spec in specs {
        let value = match supplied.get(&spec.name) {
            Some(value) => coerce(spec, value)?,
            None => {
                if let Some(default) = &spec.default {
                    default.clone()
                } else if spec.nullable || !spec.required {
                    Value::Null
                } else {
                    return Err(McpError::missing_param(spec.name.clone()));
                }
            }
        };
        names.push(spec.name.clone());
        values.push(value);
    }

    Ok(Arguments { names, values })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(spec: &ParamSpec, value: &Value) -> McpError {
    McpError::invalid_param_type(
        spec.name.clone(),
        spec.kind.expected(),
        format!("{} {}", type_name(value), value),
    )
}

fn coerce(spec: &ParamSpec, value: &Value) -> McpResult<Value> {
    if value.is_null() {
        if spec.nullable {
            return Ok(Value::Null);
        }
        return Err(mismatch(spec, value));
    }

    match &spec.kind {
        ParamKind::Integer => coerce_integer(spec, value).map(Value::from),
        ParamKind::Number => coerce_number(spec, value),
        ParamKind::Boolean => coerce_boolean(spec, value).map(Value::from),
        ParamKind::String => coerce_string(spec, value).map(Value::from),
        ParamKind::Array(items) => {
            let Value::Array(elements) = value else {
                return Err(mismatch(spec, value));
            };
            for element in elements {
                if !element_matches(items, element) {
                    return Err(mismatch(spec, value));
                }
            }
            Ok(value.clone())
        }
        ParamKind::Object => {
            if value.is_object() {
                Ok(value.clone())
            } else {
                Err(mismatch(spec, value))
            }
        }
        ParamKind::StringEnum(allowed) => {
            let text = coerce_string(spec, value)?;
            if allowed.contains(&text) {
                Ok(Value::String(text))
            } else {
                Err(mismatch(spec, value))
            }
        }
        ParamKind::IntEnum(allowed) => {
            let number = coerce_integer(spec, value)?;
            if allowed.contains(&number) {
                Ok(Value::from(number))
            } else {
                Err(mismatch(spec, value))
            }
        }
        ParamKind::UnitEnum(cases) => match value.as_str() {
            Some(name) if cases.iter().any(|c| c == name) => Ok(value.clone()),
            _ => Err(mismatch(spec, value)),
        },
        ParamKind::Any => Ok(value.clone()),
    }
}

fn coerce_integer(spec: &ParamSpec, value: &Value) -> McpResult<i64> {
    match value {
        Value::Number(number) => number.as_i64().ok_or_else(|| mismatch(spec, value)),
        Value::String(text) => {
            let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(mismatch(spec, value));
            }
            text.parse::<i64>().map_err(|_| mismatch(spec, value))
        }
        _ => Err(mismatch(spec, value)),
    }
}

fn coerce_number(spec: &ParamSpec, value: &Value) -> McpResult<Value> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(text) => {
            let parsed: f64 = text.parse().map_err(|_| mismatch(spec, value))?;
            Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| mismatch(spec, value))
        }
        _ => Err(mismatch(spec, value)),
    }
}

fn coerce_boolean(spec: &ParamSpec, value: &Value) -> McpResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(mismatch(spec, value)),
        },
        Value::String(text) => match text.to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            _ => Err(mismatch(spec, value)),
        },
        _ => Err(mismatch(spec, value)),
    }
}

fn coerce_string(spec: &ParamSpec, value: &Value) -> McpResult<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(mismatch(spec, value)),
    }
}

fn element_matches(kind: &ParamKind, value: &Value) -> bool {
    match kind {
        ParamKind::Integer => value.as_i64().is_some(),
        ParamKind::Number => value.is_number(),
        ParamKind::String => value.is_string(),
        ParamKind::Boolean => value.is_boolean(),
        ParamKind::Array(_) => value.is_array(),
        ParamKind::Object => value.is_object(),
        ParamKind::StringEnum(allowed) => {
            value.as_str().is_some_and(|s| allowed.iter().any(|a| a == s))
        }
        ParamKind::IntEnum(allowed) => value.as_i64().is_some_and(|n| allowed.contains(&n)),
        ParamKind::UnitEnum(cases) => value.as_str().is_some_and(|s| cases.iter().any(|c| c == s)),
        ParamKind::Any => true,
    }
}
