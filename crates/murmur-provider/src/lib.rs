pub mod anthropic;
pub mod types;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use anthropic::AnthropicProvider;
pub use types::*;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
}

/// Provider type identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Anthropic,
    /// Offline stub, for local development and tests.
    Stub,
}

/// Configuration for the provider instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Create a provider from configuration.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider_type {
        ProviderType::Anthropic => {
            let key = config
                .api_key
                .as_ref()
                .ok_or_else(|| anyhow!("anthropic requires api_key"))?;
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or("https://api.anthropic.com");
            Arc::new(AnthropicProvider::new(key.clone(), base_url))
        }
        ProviderType::Stub => Arc::new(StubProvider),
    };
    Ok(provider)
}

pub struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let user_text = request
            .messages
            .last()
            .map(|m| m.text())
            .unwrap_or_default();
        let full_text = format!("[stub:{}] {}", request.model, user_text);
        Ok(LlmResponse {
            text: full_text.clone(),
            content: vec![ContentBlock::Text { text: full_text }],
            input_tokens: None,
            output_tokens: None,
            stop_reason: Some("end_turn".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_provider_echoes_last_message() {
        let provider = StubProvider;
        let req = LlmRequest::simple("my-model".into(), None, "ping".into());
        let resp = provider.chat(req).await.unwrap();
        assert!(resp.text.contains("stub:my-model"));
        assert!(resp.text.contains("ping"));
        assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn create_provider_anthropic_requires_key() {
        let config = ProviderConfig {
            provider_type: ProviderType::Anthropic,
            api_key: None,
            base_url: None,
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn create_provider_stub_needs_nothing() {
        let config = ProviderConfig {
            provider_type: ProviderType::Stub,
            api_key: None,
            base_url: None,
        };
        assert!(create_provider(&config).is_ok());
    }

    #[test]
    fn provider_config_deserializes_type_tag() {
        let config: ProviderConfig =
            serde_yaml_like(r#"{"type": "anthropic", "api_key": "sk-test"}"#);
        assert_eq!(config.provider_type, ProviderType::Anthropic);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }

    fn serde_yaml_like(json: &str) -> ProviderConfig {
        serde_json::from_str(json).unwrap()
    }
}
