use std::sync::Arc;

use murmur_provider::{ContentBlock, LlmMessage};
use murmur_schema::{ChannelMessage, InboundEvent, InvocationContext};

use crate::client::ChatClient;

/// How the response-trigger decision is tuned.
#[derive(Debug, Clone)]
pub struct TriggerPolicy {
    /// How many of the newest window messages the broadened check scans.
    pub window: usize,
    /// Whether being mentioned anywhere in the recent window counts as an
    /// ongoing exchange. Known to respond to messages that do not address
    /// the agent in busy channels; kept as observed behavior.
    pub broadened: bool,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self {
            window: 10,
            broadened: true,
        }
    }
}

/// Decide whether the agent answers this event. Pure: depends only on the
/// event and the already-fetched message window, so the same inputs always
/// give the same answer.
pub fn should_respond(
    agent_id: &str,
    event: &InboundEvent,
    window: &[ChannelMessage],
    policy: &TriggerPolicy,
) -> bool {
    if event.mentions.iter().any(|m| m == agent_id) {
        return true;
    }
    if let Some(reply) = &event.reply_to {
        if reply.author_id == agent_id {
            return true;
        }
    }
    if policy.broadened {
        return window
            .iter()
            .take(policy.window)
            .any(|m| m.mentions.iter().any(|m| m == agent_id));
    }
    false
}

/// Everything one turn runs on: the immutable context snapshot shared with
/// the bound tools, and the chronological role-tagged history for the model.
pub struct AssembledContext {
    pub context: Arc<InvocationContext>,
    pub history: Vec<LlmMessage>,
}

/// Gather the turn's situational snapshot. Roster fetches run concurrently
/// and each degrades to an empty roster on failure; the agent still
/// answers with reduced awareness rather than aborting the turn.
pub async fn assemble_context(
    client: &dyn ChatClient,
    event: &InboundEvent,
    window: Vec<ChannelMessage>,
) -> AssembledContext {
    let agent_id = client.current_user_id();

    let (users, channels, emojis) = match &event.guild_id {
        Some(guild_id) => {
            let (users, channels, emojis) = tokio::join!(
                client.guild_members(guild_id),
                client.guild_channels(guild_id),
                client.guild_emojis(guild_id),
            );
            (
                users.unwrap_or_else(|e| {
                    tracing::warn!("member roster fetch failed, continuing without: {e}");
                    Vec::new()
                }),
                channels.unwrap_or_else(|e| {
                    tracing::warn!("channel roster fetch failed, continuing without: {e}");
                    Vec::new()
                }),
                emojis.unwrap_or_else(|e| {
                    tracing::warn!("emoji roster fetch failed, continuing without: {e}");
                    Vec::new()
                }),
            )
        }
        None => (Vec::new(), Vec::new(), Vec::new()),
    };

    // The transport delivers newest-first; the model wants chronological.
    let history = window
        .iter()
        .rev()
        .map(|m| project_message(&agent_id, m))
        .collect();

    let context = Arc::new(InvocationContext {
        message_id: event.message_id.clone(),
        author_id: event.author_id.clone(),
        author_handle: event.author_handle.clone(),
        channel_id: event.channel_id.clone(),
        guild_id: event.guild_id.clone(),
        content: event.clean_content.clone(),
        users,
        channels,
        emojis,
    });

    AssembledContext { context, history }
}

/// One window message as a role-tagged turn. The fixed template embeds the
/// message id and author handle so the model can reference them in
/// reply/reaction tool calls.
fn project_message(agent_id: &str, message: &ChannelMessage) -> LlmMessage {
    let role = if message.author_id == agent_id {
        "assistant"
    } else {
        "user"
    };
    LlmMessage {
        role: role.into(),
        content: vec![ContentBlock::Text {
            text: format!(
                "ID:{} - Author:{} - Content:{}",
                message.id, message.author_handle, message.clean_content
            ),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use murmur_schema::{GuildChannelInfo, GuildEmoji, GuildUser, ReplyRef};

    const AGENT: &str = "bot-1";

    fn event() -> InboundEvent {
        InboundEvent {
            message_id: "m9".into(),
            author_id: "u1".into(),
            author_handle: "ada".into(),
            channel_id: "c1".into(),
            guild_id: Some("g1".into()),
            content: "hi there".into(),
            clean_content: "hi there".into(),
            mentions: vec![],
            reply_to: None,
        }
    }

    fn window_message(id: &str, author: &str, mentions: Vec<String>) -> ChannelMessage {
        ChannelMessage {
            id: id.into(),
            author_id: author.into(),
            author_handle: format!("handle-{author}"),
            content: "text".into(),
            clean_content: "text".into(),
            mentions,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn responds_when_mentioned() {
        let mut event = event();
        event.mentions = vec![AGENT.into()];
        assert!(should_respond(AGENT, &event, &[], &TriggerPolicy::default()));
    }

    #[test]
    fn responds_when_replying_to_agent() {
        let mut event = event();
        event.reply_to = Some(ReplyRef {
            message_id: "m1".into(),
            author_id: AGENT.into(),
        });
        assert!(should_respond(AGENT, &event, &[], &TriggerPolicy::default()));
    }

    #[test]
    fn responds_when_mentioned_in_recent_window() {
        let window = vec![
            window_message("m1", "u2", vec![]),
            window_message("m2", "u3", vec![AGENT.into()]),
        ];
        assert!(should_respond(
            AGENT,
            &event(),
            &window,
            &TriggerPolicy::default()
        ));
    }

    #[test]
    fn window_check_respects_attention_bound() {
        // Mention sits outside the scanned window prefix.
        let mut window: Vec<ChannelMessage> = (0..10)
            .map(|i| window_message(&format!("m{i}"), "u2", vec![]))
            .collect();
        window.push(window_message("m10", "u3", vec![AGENT.into()]));
        assert!(!should_respond(
            AGENT,
            &event(),
            &window,
            &TriggerPolicy::default()
        ));
    }

    #[test]
    fn narrowed_policy_ignores_window() {
        let window = vec![window_message("m1", "u2", vec![AGENT.into()])];
        let policy = TriggerPolicy {
            window: 10,
            broadened: false,
        };
        assert!(!should_respond(AGENT, &event(), &window, &policy));
    }

    #[test]
    fn stays_silent_without_any_trigger() {
        assert!(!should_respond(
            AGENT,
            &event(),
            &[],
            &TriggerPolicy::default()
        ));
    }

    #[test]
    fn trigger_is_deterministic() {
        let window = vec![window_message("m1", "u2", vec![AGENT.into()])];
        let policy = TriggerPolicy::default();
        let first = should_respond(AGENT, &event(), &window, &policy);
        let second = should_respond(AGENT, &event(), &window, &policy);
        assert_eq!(first, second);
    }

    struct FlakyRosterClient;

    #[async_trait]
    impl ChatClient for FlakyRosterClient {
        fn current_user_id(&self) -> String {
            AGENT.into()
        }

        async fn recent_messages(
            &self,
            _channel_id: &str,
            _limit: usize,
        ) -> anyhow::Result<Vec<ChannelMessage>> {
            Ok(vec![])
        }

        async fn guild_members(&self, _guild_id: &str) -> anyhow::Result<Vec<GuildUser>> {
            anyhow::bail!("members unavailable")
        }

        async fn guild_channels(&self, _guild_id: &str) -> anyhow::Result<Vec<GuildChannelInfo>> {
            Ok(vec![GuildChannelInfo {
                id: "c1".into(),
                name: "general".into(),
                kind_label: "text".into(),
            }])
        }

        async fn guild_emojis(&self, _guild_id: &str) -> anyhow::Result<Vec<GuildEmoji>> {
            anyhow::bail!("emojis unavailable")
        }

        async fn reply(
            &self,
            _channel_id: &str,
            _message_id: &str,
            _content: &str,
        ) -> Result<String, crate::client::ActionError> {
            unreachable!()
        }

        async fn send(
            &self,
            _channel_id: &str,
            _content: &str,
        ) -> Result<String, crate::client::ActionError> {
            unreachable!()
        }

        async fn react(
            &self,
            _channel_id: &str,
            _message_id: &str,
            _emoji: &str,
        ) -> Result<u64, crate::client::ActionError> {
            unreachable!()
        }

        async fn unreact(
            &self,
            _channel_id: &str,
            _message_id: &str,
            _emoji: &str,
        ) -> Result<u64, crate::client::ActionError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn roster_failures_degrade_to_empty() {
        let assembled = assemble_context(&FlakyRosterClient, &event(), vec![]).await;
        assert!(assembled.context.users.is_empty());
        assert!(assembled.context.emojis.is_empty());
        assert_eq!(assembled.context.channels.len(), 1);
    }

    #[tokio::test]
    async fn history_is_chronological_and_role_tagged() {
        let window = vec![
            window_message("m3", "u1", vec![]),
            window_message("m2", AGENT, vec![]),
            window_message("m1", "u1", vec![]),
        ];
        let assembled = assemble_context(&FlakyRosterClient, &event(), window).await;

        assert_eq!(assembled.history.len(), 3);
        assert_eq!(assembled.history[0].role, "user");
        assert!(assembled.history[0].text().starts_with("ID:m1 - Author:handle-u1 - Content:"));
        assert_eq!(assembled.history[1].role, "assistant");
        assert!(assembled.history[2].text().starts_with("ID:m3"));
    }
}
