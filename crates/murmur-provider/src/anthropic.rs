use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{ContentBlock, LlmProvider, LlmRequest, LlmResponse, ToolChoice};

#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderErrorKind {
    RateLimit,
    ServerError,
    Timeout,
    AuthError,
    InvalidRequest,
    Unknown,
}

impl ProviderErrorKind {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::RateLimit,
            401 | 403 => Self::AuthError,
            400 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::ServerError | Self::Timeout)
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn to_api_request(request: LlmRequest) -> ApiRequest {
        let tool_choice = if request.tools.is_empty() {
            None
        } else {
            Some(match request.tool_choice {
                ToolChoice::Auto => serde_json::json!({"type": "auto"}),
                ToolChoice::Required => serde_json::json!({"type": "any"}),
                ToolChoice::None => serde_json::json!({"type": "none"}),
            })
        };
        let tools: Vec<ApiToolDef> = request
            .tools
            .into_iter()
            .map(|t| ApiToolDef {
                name: t.name,
                description: t.description,
                input_schema: t.input_schema,
            })
            .collect();

        ApiRequest {
            model: request.model,
            system: request.system,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: request
                .messages
                .into_iter()
                .map(|m| {
                    let has_non_text = m
                        .content
                        .iter()
                        .any(|b| !matches!(b, ContentBlock::Text { .. }));
                    if has_non_text {
                        // Send as array for tool_use/tool_result messages
                        let blocks: Vec<serde_json::Value> = m
                            .content
                            .iter()
                            .map(|b| match b {
                                ContentBlock::Text { text } => {
                                    serde_json::json!({"type": "text", "text": text})
                                }
                                ContentBlock::ToolUse { id, name, input } => {
                                    serde_json::json!({"type": "tool_use", "id": id, "name": name, "input": input})
                                }
                                ContentBlock::ToolResult {
                                    tool_use_id,
                                    content,
                                    is_error,
                                } => {
                                    serde_json::json!({"type": "tool_result", "tool_use_id": tool_use_id, "content": content, "is_error": is_error})
                                }
                            })
                            .collect();
                        ApiMessage {
                            role: m.role,
                            content: serde_json::Value::Array(blocks),
                        }
                    } else {
                        let text = m.text();
                        ApiMessage {
                            role: m.role,
                            content: serde_json::Value::String(text),
                        }
                    }
                })
                .collect(),
            tools: if tools.is_empty() { None } else { Some(tools) },
            tool_choice,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/v1/messages", self.api_base);
        let payload = Self::to_api_request(request);

        let resp = self
            .client
            .post(url)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .header("x-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(anyhow!(
                    "anthropic api error (timeout) [retryable]: request timed out after 60s"
                ));
            }
            Err(e) if e.is_connect() => {
                return Err(anyhow!("anthropic api error (connect) [retryable]: {e}"));
            }
            Err(e) => return Err(e.into()),
        };

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await?;
            let parsed = serde_json::from_str::<ApiError>(&text).ok();
            return Err(format_api_error(status, parsed));
        }

        let body: ApiResponse = resp.json().await?;
        let content_blocks: Vec<ContentBlock> = body
            .content
            .iter()
            .filter_map(|block| match block.block_type.as_str() {
                "text" => block
                    .text
                    .as_ref()
                    .map(|t| ContentBlock::Text { text: t.clone() }),
                "tool_use" => {
                    let id = block.id.as_ref()?.clone();
                    let name = block.name.as_ref()?.clone();
                    let input = block
                        .input
                        .clone()
                        .unwrap_or(serde_json::Value::Object(Default::default()));
                    Some(ContentBlock::ToolUse { id, name, input })
                }
                _ => None,
            })
            .collect();
        let text = body
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(LlmResponse {
            text,
            content: content_blocks,
            input_tokens: body.usage.as_ref().map(|u| u.input_tokens),
            output_tokens: body.usage.as_ref().map(|u| u.output_tokens),
            stop_reason: body.stop_reason,
        })
    }
}

fn format_api_error(status: StatusCode, parsed: Option<ApiError>) -> anyhow::Error {
    let kind = ProviderErrorKind::from_status(status);
    let retryable = if kind.is_retryable() { " [retryable]" } else { "" };
    match parsed {
        Some(err) => anyhow!(
            "anthropic api error (HTTP {status}){retryable}: {}: {}",
            err.error.r#type,
            err.error.message
        ),
        None => anyhow!("anthropic api error (HTTP {status}){retryable}"),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiToolDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ApiToolDef {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
    stop_reason: Option<String>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
    id: Option<String>,
    name: Option<String>,
    input: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    r#type: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LlmMessage, ToolDef};

    #[test]
    fn to_api_request_plain_text_message_is_string() {
        let req = LlmRequest::simple("claude-sonnet-4-5".into(), Some("sys".into()), "hi".into());
        let api = AnthropicProvider::to_api_request(req);
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["messages"][0]["content"], "hi");
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
    }

    #[test]
    fn to_api_request_maps_required_tool_choice_to_any() {
        let mut req = LlmRequest::simple("m".into(), None, "hi".into());
        req.tools = vec![ToolDef {
            name: "skip".into(),
            description: "d".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        }];
        req.tool_choice = ToolChoice::Required;
        let api = AnthropicProvider::to_api_request(req);
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["tool_choice"]["type"], "any");
        assert_eq!(json["tools"][0]["name"], "skip");
    }

    #[test]
    fn to_api_request_tool_result_message_is_block_array() {
        let mut req = LlmRequest::simple("m".into(), None, "hi".into());
        req.messages.push(LlmMessage {
            role: "user".into(),
            content: vec![ContentBlock::ToolResult {
                tool_use_id: "t1".into(),
                content: "{\"success\":true}".into(),
                is_error: false,
            }],
        });
        let api = AnthropicProvider::to_api_request(req);
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["messages"][1]["content"][0]["type"], "tool_result");
        assert_eq!(json["messages"][1]["content"][0]["tool_use_id"], "t1");
    }

    #[test]
    fn to_api_request_carries_temperature() {
        let mut req = LlmRequest::simple("m".into(), None, "hi".into());
        req.temperature = Some(0.7);
        let api = AnthropicProvider::to_api_request(req);
        let json = serde_json::to_value(&api).unwrap();
        assert!((json["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn provider_error_kind_classification() {
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::TOO_MANY_REQUESTS),
            ProviderErrorKind::RateLimit
        );
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            ProviderErrorKind::ServerError
        );
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::UNAUTHORIZED),
            ProviderErrorKind::AuthError
        );
        assert!(ProviderErrorKind::RateLimit.is_retryable());
        assert!(!ProviderErrorKind::InvalidRequest.is_retryable());
    }

    #[test]
    fn format_api_error_with_parsed_body() {
        let parsed = Some(ApiError {
            error: ApiErrorDetail {
                r#type: "invalid_request_error".into(),
                message: "messages: required".into(),
            },
        });
        let err = format_api_error(StatusCode::BAD_REQUEST, parsed);
        let text = err.to_string();
        assert!(text.contains("400"));
        assert!(text.contains("messages: required"));
        assert!(!text.contains("[retryable]"));
    }

    #[test]
    fn format_api_error_server_error_is_retryable() {
        let err = format_api_error(StatusCode::INTERNAL_SERVER_ERROR, None);
        assert!(err.to_string().contains("[retryable]"));
    }

    #[tokio::test]
    #[ignore]
    async fn integration_real_api_call() {
        let api_key = match std::env::var("ANTHROPIC_API_KEY") {
            Ok(api_key) if !api_key.is_empty() => api_key,
            _ => return,
        };
        let provider = AnthropicProvider::new(api_key, "https://api.anthropic.com");
        let request = LlmRequest::simple(
            "claude-3-5-haiku-latest".to_string(),
            Some("Reply with exactly: pong".to_string()),
            "ping".to_string(),
        );
        let response = provider.chat(request).await.unwrap();
        assert!(!response.text.trim().is_empty());
    }
}
