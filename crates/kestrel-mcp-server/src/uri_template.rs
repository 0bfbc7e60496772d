//! RFC 6570 Level-1 URI templates.
//!
//! A template like `user://{userId}/profile` compiles once to an anchored
//! regex where each `{var}` becomes a named `[^/]+` capture. Captures never
//! span path segments: `scheme://{x}/{y}` does not match `scheme://a/b/c`.

use std::collections::HashMap;

use regex::Regex;

use kestrel_mcp_protocol::{McpError, McpResult};

/// A compiled URI template.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    pattern: String,
    regex: Regex,
    variables: Vec<String>,
}

impl UriTemplate {
    /// Compile a template pattern. Fails on empty or malformed variable
    /// expressions and on duplicate variable names.
    pub fn compile(pattern: &str) -> McpResult<Self> {
        let mut variables = Vec::new();
        let mut regex_pattern = String::from("^");
        let mut rest = pattern;

        while let Some(open) = rest.find('{') {
            let (literal, tail) = rest.split_at(open);
            regex_pattern.push_str(&regex::escape(literal));

            let close = tail.find('}').ok_or_else(|| {
                McpError::configuration(format!("unterminated variable in template: {}", pattern))
            })?;
            let name = &tail[1..close];
            if name.is_empty()
                || !name.chars().next().unwrap().is_ascii_alphabetic() && !name.starts_with('_')
                || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(McpError::configuration(format!(
                    "invalid variable name '{}' in template: {}",
                    name, pattern
                )));
            }
            if variables.iter().any(|v| v == name) {
                return Err(McpError::configuration(format!(
                    "duplicate variable '{}' in template: {}",
                    name, pattern
                )));
            }
            variables.push(name.to_string());
            regex_pattern.push_str(&format!("(?P<{}>[^/]+)", name));
            rest = &tail[close + 1..];
        }
        regex_pattern.push_str(&regex::escape(rest));
        regex_pattern.push('$');

        let regex = Regex::new(&regex_pattern).map_err(|err| {
            McpError::configuration(format!("failed to compile template {}: {}", pattern, err))
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            variables,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn matches(&self, uri: &str) -> bool {
        self.regex.is_match(uri)
    }

    /// Match a URI and return the captured variables, or `None` on miss.
    pub fn extract(&self, uri: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(uri)?;
        let mut variables = HashMap::new();
        for name in &self.variables {
            if let Some(capture) = captures.name(name) {
                variables.insert(name.clone(), capture.as_str().to_string());
            }
        }
        Some(variables)
    }

    /// Substitute variables back into the pattern.
    pub fn expand(&self, variables: &HashMap<String, String>) -> McpResult<String> {
        let mut result = self.pattern.clone();
        for name in &self.variables {
            let value = variables
                .get(name)
                .ok_or_else(|| McpError::missing_param(name.clone()))?;
            result = result.replace(&format!("{{{}}}", name), value);
        }
        Ok(result)
    }
}

/// Whether a URI string contains template expressions.
pub fn is_template(uri: &str) -> bool {
    uri.contains('{')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_and_extract() {
        let template = UriTemplate::compile("user://{userId}/profile").unwrap();
        assert_eq!(template.variables(), &["userId"]);

        let vars = template.extract("user://42/profile").unwrap();
        assert_eq!(vars.get("userId").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_captures_are_per_segment() {
        let template = UriTemplate::compile("scheme://{x}/{y}").unwrap();
        assert!(template.extract("scheme://a/b/c").is_none());

        let vars = template.extract("scheme://a/b").unwrap();
        assert_eq!(vars.get("x").map(String::as_str), Some("a"));
        assert_eq!(vars.get("y").map(String::as_str), Some("b"));
    }

    #[test]
    fn test_anchored_match() {
        let template = UriTemplate::compile("file:///{name}.json").unwrap();
        assert!(template.matches("file:///a.json"));
        assert!(!template.matches("file:///a.json.bak"));
        assert!(!template.matches("xfile:///a.json"));
    }

    #[test]
    fn test_multiple_variables() {
        let template = UriTemplate::compile("user://{userId}/avatar/{format}").unwrap();
        let vars = template.extract("user://alice/avatar/png").unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.get("format").map(String::as_str), Some("png"));
    }

    #[test]
    fn test_literal_dots_are_escaped() {
        let template = UriTemplate::compile("file:///report.v1/{id}").unwrap();
        assert!(!template.matches("file:///reportXv1/7"));
        assert!(template.matches("file:///report.v1/7"));
    }

    #[test]
    fn test_expand_round_trip() {
        let template = UriTemplate::compile("user://{userId}/profile").unwrap();
        let vars = template.extract("user://42/profile").unwrap();
        assert_eq!(template.expand(&vars).unwrap(), "user://42/profile");
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert!(UriTemplate::compile("user://{unterminated").is_err());
        assert!(UriTemplate::compile("user://{}").is_err());
        assert!(UriTemplate::compile("user://{bad-name}").is_err());
        assert!(UriTemplate::compile("user://{x}/{x}").is_err());
    }

    #[test]
    fn test_empty_segment_does_not_match() {
        let template = UriTemplate::compile("user://{userId}/profile").unwrap();
        assert!(template.extract("user:///profile").is_none());
    }

    #[test]
    fn test_is_template() {
        assert!(is_template("user://{userId}"));
        assert!(!is_template("user://42"));
    }
}
