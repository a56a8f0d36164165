use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serenity::all::{
    Channel, ChannelId, ChannelType, Client, Context, EmojiId, EventHandler, GatewayIntents,
    GetMessages, GuildId, Http, Message, MessageId, Ready, ReactionType,
};
use serenity::cache::Cache;

use murmur_core::{ActionError, ChatClient, Orchestrator};
use murmur_schema::{
    channel_kind_label, ChannelMessage, GuildChannelInfo, GuildEmoji, GuildUser, InboundEvent,
    ReplyRef,
};

pub struct DiscordBot {
    token: String,
    orchestrator: Arc<Orchestrator>,
}

impl DiscordBot {
    pub fn new(token: String, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            token,
            orchestrator,
        }
    }

    pub async fn run_impl(self) -> anyhow::Result<()> {
        let intents = GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let handler = DiscordHandler {
            orchestrator: self.orchestrator,
        };

        let mut client = Client::builder(self.token, intents)
            .event_handler(handler)
            .await?;
        client.start().await?;
        Ok(())
    }
}

#[async_trait]
impl crate::ChannelBot for DiscordBot {
    fn channel_type(&self) -> &str {
        "discord"
    }

    async fn run(self: Box<Self>) -> anyhow::Result<()> {
        (*self).run_impl().await
    }
}

struct DiscordHandler {
    orchestrator: Arc<Orchestrator>,
}

#[serenity::async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!("discord bot connected: {}", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Never feed on bot output, our own included.
        if msg.author.bot {
            return;
        }
        if msg.content.trim().is_empty() {
            return;
        }

        let event = to_inbound_event(&ctx, &msg);
        let chat_client: Arc<dyn ChatClient> = Arc::new(SerenityChatClient::new(
            ctx.http.clone(),
            ctx.cache.clone(),
            ctx.cache.current_user().id.to_string(),
        ));

        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator.handle_event(chat_client, event).await;
        });
    }
}

fn to_inbound_event(ctx: &Context, msg: &Message) -> InboundEvent {
    InboundEvent {
        message_id: msg.id.to_string(),
        author_id: msg.author.id.to_string(),
        author_handle: msg.author.name.clone(),
        channel_id: msg.channel_id.to_string(),
        guild_id: msg.guild_id.map(|g| g.to_string()),
        content: msg.content.clone(),
        clean_content: msg.content_safe(ctx.cache.clone()),
        mentions: msg.mentions.iter().map(|u| u.id.to_string()).collect(),
        reply_to: msg.referenced_message.as_ref().map(|replied| ReplyRef {
            message_id: replied.id.to_string(),
            author_id: replied.author.id.to_string(),
        }),
    }
}

/// `ChatClient` over the serenity HTTP client. Everything leaves here as a
/// value snapshot; no serenity type crosses into the core.
pub struct SerenityChatClient {
    http: Arc<Http>,
    cache: Arc<Cache>,
    bot_user_id: String,
}

impl SerenityChatClient {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>, bot_user_id: String) -> Self {
        Self {
            http,
            cache,
            bot_user_id,
        }
    }

    /// Resolve and gate a channel id: it must exist and be text-capable.
    async fn text_channel(&self, channel_id: &str) -> Result<ChannelId, ActionError> {
        let id = parse_snowflake(channel_id).ok_or(ActionError::ChannelNotFound)?;
        let channel = ChannelId::new(id)
            .to_channel(&self.http)
            .await
            .map_err(|e| classify(e, ActionError::ChannelNotFound))?;
        match channel {
            Channel::Guild(guild_channel) => {
                let (is_text, _, _) = kind_flags(guild_channel.kind);
                if is_text {
                    Ok(guild_channel.id)
                } else {
                    Err(ActionError::NotTextChannel)
                }
            }
            Channel::Private(private) => Ok(private.id),
            _ => Err(ActionError::NotTextChannel),
        }
    }

    async fn fetch_message(
        &self,
        channel: ChannelId,
        message_id: &str,
    ) -> Result<Message, ActionError> {
        let id = parse_snowflake(message_id).ok_or(ActionError::MessageNotFound)?;
        channel
            .message(&self.http, MessageId::new(id))
            .await
            .map_err(|e| classify(e, ActionError::MessageNotFound))
    }

    fn to_channel_message(&self, message: &Message) -> ChannelMessage {
        ChannelMessage {
            id: message.id.to_string(),
            author_id: message.author.id.to_string(),
            author_handle: message.author.name.clone(),
            content: message.content.clone(),
            clean_content: message.content_safe(self.cache.clone()),
            mentions: message.mentions.iter().map(|u| u.id.to_string()).collect(),
            timestamp: message.timestamp.with_timezone(&Utc),
        }
    }
}

#[async_trait]
impl ChatClient for SerenityChatClient {
    fn current_user_id(&self) -> String {
        self.bot_user_id.clone()
    }

    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ChannelMessage>> {
        let id =
            parse_snowflake(channel_id).ok_or_else(|| anyhow::anyhow!("invalid channel id"))?;
        let messages = ChannelId::new(id)
            .messages(&self.http, GetMessages::new().limit(limit.min(100) as u8))
            .await?;
        Ok(messages
            .iter()
            .map(|m| self.to_channel_message(m))
            .collect())
    }

    async fn guild_members(&self, guild_id: &str) -> anyhow::Result<Vec<GuildUser>> {
        let id = parse_snowflake(guild_id).ok_or_else(|| anyhow::anyhow!("invalid guild id"))?;
        let members = GuildId::new(id).members(&self.http, None, None).await?;
        Ok(members
            .iter()
            .map(|m| GuildUser {
                id: m.user.id.to_string(),
                handle: m.user.name.clone(),
                display_name: m.display_name().to_string(),
            })
            .collect())
    }

    async fn guild_channels(&self, guild_id: &str) -> anyhow::Result<Vec<GuildChannelInfo>> {
        let id = parse_snowflake(guild_id).ok_or_else(|| anyhow::anyhow!("invalid guild id"))?;
        let channels = GuildId::new(id).channels(&self.http).await?;
        Ok(channels
            .into_values()
            .map(|c| {
                let (is_text, is_voice, is_thread) = kind_flags(c.kind);
                GuildChannelInfo {
                    id: c.id.to_string(),
                    name: c.name.clone(),
                    kind_label: channel_kind_label(is_text, is_voice, is_thread),
                }
            })
            .collect())
    }

    async fn guild_emojis(&self, guild_id: &str) -> anyhow::Result<Vec<GuildEmoji>> {
        let id = parse_snowflake(guild_id).ok_or_else(|| anyhow::anyhow!("invalid guild id"))?;
        let emojis = GuildId::new(id).emojis(&self.http).await?;
        Ok(emojis
            .iter()
            .map(|e| GuildEmoji {
                name: e.name.clone(),
                id: e.id.to_string(),
            })
            .collect())
    }

    async fn reply(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<String, ActionError> {
        let channel = self.text_channel(channel_id).await?;
        let message = self.fetch_message(channel, message_id).await?;
        let sent = message
            .reply(&self.http, content)
            .await
            .map_err(|e| classify(e, ActionError::MessageNotFound))?;
        Ok(sent.id.to_string())
    }

    async fn send(&self, channel_id: &str, content: &str) -> Result<String, ActionError> {
        let channel = self.text_channel(channel_id).await?;
        let sent = channel
            .say(&self.http, content)
            .await
            .map_err(|e| classify(e, ActionError::ChannelNotFound))?;
        Ok(sent.id.to_string())
    }

    async fn react(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<u64, ActionError> {
        let channel = self.text_channel(channel_id).await?;
        let message = self.fetch_message(channel, message_id).await?;
        let reaction = parse_reaction(emoji)?;
        message
            .react(&self.http, reaction.clone())
            .await
            .map_err(|e| classify(e, ActionError::MessageNotFound))?;

        let refreshed = self.fetch_message(channel, message_id).await?;
        Ok(reaction_count(&refreshed, &reaction))
    }

    async fn unreact(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<u64, ActionError> {
        let channel = self.text_channel(channel_id).await?;
        let message = self.fetch_message(channel, message_id).await?;
        let reaction = parse_reaction(emoji)?;
        if !message
            .reactions
            .iter()
            .any(|r| r.reaction_type == reaction)
        {
            return Err(ActionError::ReactionNotFound);
        }

        message
            .delete_reaction(&self.http, None, reaction.clone())
            .await
            .map_err(|e| classify(e, ActionError::MessageNotFound))?;

        let refreshed = self.fetch_message(channel, message_id).await?;
        Ok(reaction_count(&refreshed, &reaction))
    }

    async fn typing(&self, channel_id: &str) {
        if let Some(id) = parse_snowflake(channel_id) {
            let _ = ChannelId::new(id).broadcast_typing(&self.http).await;
        }
    }
}

fn parse_snowflake(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|id| *id != 0)
}

/// Accepts unicode emoji as-is and custom emoji in the `<:name:id>` /
/// `<a:name:id>` platform form.
fn parse_reaction(emoji: &str) -> Result<ReactionType, ActionError> {
    let trimmed = emoji.trim();
    if trimmed.is_empty() {
        return Err(ActionError::Transport("empty emoji".into()));
    }

    if trimmed.starts_with('<') {
        let animated = trimmed.starts_with("<a:");
        let body = trimmed
            .strip_prefix("<a:")
            .or_else(|| trimmed.strip_prefix("<:"))
            .and_then(|b| b.strip_suffix('>'));
        if let Some((name, id)) = body.and_then(|b| b.rsplit_once(':')) {
            if let Some(id) = parse_snowflake(id) {
                return Ok(ReactionType::Custom {
                    animated,
                    id: EmojiId::new(id),
                    name: Some(name.to_string()),
                });
            }
        }
        return Err(ActionError::Transport(format!(
            "unrecognized emoji: {emoji}"
        )));
    }

    Ok(ReactionType::Unicode(trimmed.to_string()))
}

fn reaction_count(message: &Message, reaction: &ReactionType) -> u64 {
    message
        .reactions
        .iter()
        .find(|r| &r.reaction_type == reaction)
        .map(|r| r.count)
        .unwrap_or(0)
}

/// Platform predicates feeding the composite kind label. Voice channels
/// carry a text chat on this platform, so they satisfy both predicates.
fn kind_flags(kind: ChannelType) -> (bool, bool, bool) {
    let is_thread = matches!(
        kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    );
    let is_voice = matches!(kind, ChannelType::Voice | ChannelType::Stage);
    let is_text = is_thread
        || is_voice
        || matches!(kind, ChannelType::Text | ChannelType::News | ChannelType::Private);
    (is_text, is_voice, is_thread)
}

fn classify(err: serenity::Error, not_found: ActionError) -> ActionError {
    if let serenity::Error::Http(serenity::http::HttpError::UnsuccessfulRequest(ref resp)) = err {
        if resp.status_code.as_u16() == 404 {
            return not_found;
        }
    }
    ActionError::Transport(err.to_string())
}
