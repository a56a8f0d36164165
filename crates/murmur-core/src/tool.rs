use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use murmur_provider::ToolDef;

pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    /// Success result carrying the structured JSON the model sees.
    pub fn ok(value: serde_json::Value) -> Self {
        Self {
            content: value.to_string(),
            is_error: false,
        }
    }

    /// Structured failure: `{success:false, error}`.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            content: serde_json::json!({"success": false, "error": error.into()}).to_string(),
            is_error: true,
        }
    }
}

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn definition(&self) -> ToolDef;
    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput>;
}

pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Box<dyn ToolExecutor>) {
        let name = tool.definition().name.clone();
        self.tools.insert(name, tool);
    }

    pub fn tool_defs(&self) -> Vec<ToolDef> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Execute a tool by name. The input is validated against the tool's
    /// declared schema first; a violation comes back as a structured error
    /// result without reaching the executor.
    pub async fn execute(&self, name: &str, input: serde_json::Value) -> Result<ToolOutput> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow!("tool not found: {name}"))?;
        if let Err(reason) = validate_input(&tool.definition().input_schema, &input) {
            return Ok(ToolOutput::failure(format!("invalid input: {reason}")));
        }
        tool.execute(input).await
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks an input object against the declarative parameter schema: every
/// required field present, every declared field of the expected primitive
/// type. Undeclared fields pass through untouched.
pub fn validate_input(schema: &serde_json::Value, input: &serde_json::Value) -> Result<(), String> {
    if !input.is_object() {
        return Err("expected an object".into());
    }

    if let Some(required) = schema["required"].as_array() {
        for field in required.iter().filter_map(|f| f.as_str()) {
            if input.get(field).is_none() {
                return Err(format!("missing required field '{field}'"));
            }
        }
    }

    if let Some(props) = schema["properties"].as_object() {
        for (field, decl) in props {
            let Some(value) = input.get(field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let expected = decl["type"].as_str().unwrap_or("");
            let ok = match expected {
                "string" => value.is_string(),
                "integer" | "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !ok {
                return Err(format!("field '{field}' must be of type {expected}"));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl ToolExecutor for EchoTool {
        fn definition(&self) -> ToolDef {
            ToolDef {
                name: "echo".into(),
                description: "Echo input".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "text": {"type": "string"},
                        "count": {"type": "integer"}
                    },
                    "required": ["text"]
                }),
            }
        }

        async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
            let text = input["text"].as_str().unwrap_or("").to_string();
            Ok(ToolOutput {
                content: text,
                is_error: false,
            })
        }
    }

    #[test]
    fn registry_register_and_list() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let defs = registry.tool_defs();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert!(registry.contains("echo"));
    }

    #[tokio::test]
    async fn registry_execute_known_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let result = registry
            .execute("echo", serde_json::json!({"text": "hello"}))
            .await
            .unwrap();
        assert_eq!(result.content, "hello");
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn registry_execute_unknown_tool() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nonexistent", serde_json::json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn registry_rejects_missing_required_field() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let result = registry
            .execute("echo", serde_json::json!({}))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("missing required field 'text'"));
    }

    #[tokio::test]
    async fn registry_rejects_wrong_type() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let result = registry
            .execute("echo", serde_json::json!({"text": "hi", "count": "three"}))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("'count' must be of type integer"));
    }

    #[test]
    fn validate_input_allows_null_optional() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"reason": {"type": "string"}},
            "required": []
        });
        assert!(validate_input(&schema, &serde_json::json!({"reason": null})).is_ok());
        assert!(validate_input(&schema, &serde_json::json!({})).is_ok());
    }

    #[test]
    fn tool_output_failure_shape() {
        let out = ToolOutput::failure("Channel not found");
        assert!(out.is_error);
        let parsed: serde_json::Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(parsed["success"], false);
        assert_eq!(parsed["error"], "Channel not found");
    }
}
