use std::sync::Arc;

use anyhow::Result;
use murmur_provider::{ContentBlock, LlmMessage, LlmProvider, LlmRequest, ToolChoice};

use crate::tool::ToolRegistry;

/// One executed tool call, kept for the per-turn observability log.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub name: String,
    pub input: serde_json::Value,
    pub is_error: bool,
}

/// What a finished turn produced.
#[derive(Debug, Clone, Default)]
pub struct TurnReport {
    pub final_text: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub steps: usize,
}

pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
    max_steps: usize,
    max_tokens: u32,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        temperature: f32,
        max_steps: usize,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_steps,
            max_tokens: 2048,
        }
    }

    /// Run one conversational turn: system prompt + chronological history +
    /// the turn's bound tools, with a tool call required at every step.
    ///
    /// Tool calls execute strictly sequentially in the order the model
    /// requests them; step k's results are appended to the message list
    /// before step k+1 is requested. `skip` ends the turn (the model's
    /// zero-effect way out while tool choice is forced). Exhausting the
    /// step budget ends the turn with whatever text exists, not an error.
    pub async fn run(
        &self,
        system: String,
        history: Vec<LlmMessage>,
        registry: &ToolRegistry,
    ) -> Result<TurnReport> {
        let mut messages = history;
        let tool_defs = registry.tool_defs();
        let mut report = TurnReport::default();

        for _step in 0..self.max_steps {
            report.steps += 1;

            let req = LlmRequest {
                model: self.model.clone(),
                system: Some(system.clone()),
                messages: messages.clone(),
                max_tokens: self.max_tokens,
                temperature: Some(self.temperature),
                tools: tool_defs.clone(),
                tool_choice: ToolChoice::Required,
            };
            let resp = self.provider.chat(req).await?;

            if !resp.text.is_empty() {
                report.final_text = resp.text.clone();
            }

            let tool_uses = resp.tool_uses();
            if tool_uses.is_empty() || resp.stop_reason.as_deref() != Some("tool_use") {
                return Ok(report);
            }

            messages.push(LlmMessage {
                role: "assistant".into(),
                content: resp.content.clone(),
            });

            let mut results = Vec::new();
            let mut saw_skip = false;
            for (id, name, input) in tool_uses {
                let output = match registry.execute(&name, input.clone()).await {
                    Ok(output) => output,
                    Err(e) => {
                        tracing::warn!("tool {name} failed: {e}");
                        crate::tool::ToolOutput {
                            content: format!("Tool execution error: {e}"),
                            is_error: true,
                        }
                    }
                };
                report.tool_calls.push(ToolCallRecord {
                    name: name.clone(),
                    input,
                    is_error: output.is_error,
                });
                if name == "skip" {
                    saw_skip = true;
                }
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id,
                    content: output.content,
                    is_error: output.is_error,
                });
            }

            messages.push(LlmMessage {
                role: "user".into(),
                content: results,
            });

            if saw_skip {
                return Ok(report);
            }
        }

        tracing::warn!(
            "agent loop exhausted {} steps, ending turn with accumulated text",
            self.max_steps
        );
        Ok(report)
    }
}
