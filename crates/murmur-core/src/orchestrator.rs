use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use murmur_memory::MemoryStore;
use murmur_provider::LlmProvider;
use murmur_schema::InboundEvent;

use crate::agent::{AgentLoop, TurnReport};
use crate::binder::{build_tool_registry, WebSearchBinding};
use crate::client::ChatClient;
use crate::config::MainConfig;
use crate::context::{assemble_context, should_respond, TriggerPolicy};
use crate::persona::Persona;

/// The one message users see when a turn fails unexpectedly. Never raw
/// errors or internal identifiers.
pub const FALLBACK_MESSAGE: &str = "Hey! I'm having a bit of trouble processing that right now 😅";

/// How a turn ended, for callers and tests. Logging is the only other
/// observer; it never steers control flow.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Trigger decision said no; nothing happened.
    Skipped,
    Completed(TurnReport),
    /// Turn-level failure; the fallback message was attempted.
    Failed,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub model: String,
    pub temperature: f32,
    pub max_steps: usize,
    pub history_limit: usize,
    pub trigger: TriggerPolicy,
    pub web_search_model: Option<String>,
}

impl OrchestratorSettings {
    pub fn from_config(config: &MainConfig) -> Self {
        Self {
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_steps: config.agent.max_steps,
            history_limit: config.agent.history_limit,
            trigger: config.agent.trigger.policy(),
            web_search_model: config
                .web_search
                .enabled
                .then(|| {
                    config
                        .web_search
                        .model
                        .clone()
                        .unwrap_or_else(|| config.provider.model.clone())
                }),
        }
    }
}

pub struct Orchestrator {
    store: Arc<MemoryStore>,
    provider: Arc<dyn LlmProvider>,
    persona: Persona,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        store: Arc<MemoryStore>,
        provider: Arc<dyn LlmProvider>,
        persona: Persona,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            provider,
            persona,
            settings,
        }
    }

    /// One complete turn for one inbound event: trigger decision, context
    /// assembly, tool binding, agent loop. Failures past the trigger
    /// decision end with a single fixed fallback message to the triggering
    /// channel.
    pub async fn handle_event(
        &self,
        client: Arc<dyn ChatClient>,
        event: InboundEvent,
    ) -> TurnOutcome {
        match self.run_turn(&client, &event).await {
            Ok(Some(report)) => {
                tracing::info!(
                    user_id = %event.author_id,
                    response_length = report.final_text.len(),
                    tool_calls = report.tool_calls.len(),
                    steps = report.steps,
                    "turn completed"
                );
                TurnOutcome::Completed(report)
            }
            Ok(None) => {
                tracing::debug!(user_id = %event.author_id, "no trigger, staying silent");
                TurnOutcome::Skipped
            }
            Err(err) => {
                tracing::error!(user_id = %event.author_id, "turn failed: {err:#}");
                if let Err(send_err) = client.send(&event.channel_id, FALLBACK_MESSAGE).await {
                    tracing::error!("failed to send fallback message: {send_err}");
                }
                TurnOutcome::Failed
            }
        }
    }

    async fn run_turn(
        &self,
        client: &Arc<dyn ChatClient>,
        event: &InboundEvent,
    ) -> Result<Option<TurnReport>> {
        let window = client
            .recent_messages(&event.channel_id, self.settings.history_limit)
            .await?;

        let agent_id = client.current_user_id();
        if !should_respond(&agent_id, event, &window, &self.settings.trigger) {
            return Ok(None);
        }

        tracing::info!(
            user_id = %event.author_id,
            username = %event.author_handle,
            channel_id = %event.channel_id,
            "processing message"
        );
        client.typing(&event.channel_id).await;

        let assembled = assemble_context(client.as_ref(), event, window).await;
        let system = self.persona.system_prompt(Utc::now(), &assembled.context);

        let web_search = self.settings.web_search_model.as_ref().map(|model| {
            WebSearchBinding {
                provider: self.provider.clone(),
                model: model.clone(),
            }
        });
        let registry = build_tool_registry(
            assembled.context.clone(),
            client.clone(),
            self.store.clone(),
            web_search,
        );

        let agent_loop = AgentLoop::new(
            self.provider.clone(),
            self.settings.model.clone(),
            self.settings.temperature,
            self.settings.max_steps,
        );
        let report = agent_loop.run(system, assembled.history, &registry).await?;
        Ok(Some(report))
    }
}
