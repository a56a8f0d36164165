use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use murmur_provider::{LlmProvider, LlmRequest, ToolDef};

use crate::tool::{ToolExecutor, ToolOutput};

/// Web search delegated to a search-capable model on the configured
/// provider. Provider errors propagate as tool failure; a missing search
/// result must not read as "nothing found".
pub struct SearchWebTool {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl SearchWebTool {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ToolExecutor for SearchWebTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "search_web".into(),
            description: "Search the web for information".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query, can be a question, a subject, or a topic"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let query = input["query"]
            .as_str()
            .ok_or_else(|| anyhow!("missing 'query' field"))?;

        tracing::info!("web search requested: {query}");
        let response = self
            .provider
            .chat(LlmRequest::simple(
                self.model.clone(),
                None,
                query.to_string(),
            ))
            .await?;

        Ok(ToolOutput::ok(serde_json::json!({"text": response.text})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_provider::{LlmResponse, StubProvider};

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        async fn chat(&self, _request: LlmRequest) -> Result<LlmResponse> {
            anyhow::bail!("search provider unreachable")
        }
    }

    #[tokio::test]
    async fn returns_model_text() {
        let tool = SearchWebTool::new(Arc::new(StubProvider), "sonar");
        let out = tool
            .execute(serde_json::json!({"query": "rust 2026 roadmap"}))
            .await
            .unwrap();
        assert!(!out.is_error);
        let json: serde_json::Value = serde_json::from_str(&out.content).unwrap();
        assert!(json["text"].as_str().unwrap().contains("rust 2026 roadmap"));
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let tool = SearchWebTool::new(Arc::new(FailingProvider), "sonar");
        let err = tool
            .execute(serde_json::json!({"query": "anything"}))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("unreachable"));
    }
}
