use async_trait::async_trait;
use thiserror::Error;

use murmur_schema::{ChannelMessage, GuildChannelInfo, GuildEmoji, GuildUser};

/// Failures of a single platform action, split so the tool layer can tell
/// the model what went wrong without surfacing transport internals.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Channel not found")]
    ChannelNotFound,
    #[error("Channel not found or not text-based")]
    NotTextChannel,
    #[error("Message not found")]
    MessageNotFound,
    #[error("Reaction not found")]
    ReactionNotFound,
    #[error("platform transport error: {0}")]
    Transport(String),
}

/// The chat-platform boundary. Fetch methods feed context assembly; action
/// methods are the effect boundary, each performing exactly one platform
/// mutation. Implementations never leak live platform objects upward;
/// everything crosses as value snapshots.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// The agent's own user id on the platform.
    fn current_user_id(&self) -> String;

    /// Last `limit` messages of a channel, newest first as the transport
    /// delivers them.
    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ChannelMessage>>;

    async fn guild_members(&self, guild_id: &str) -> anyhow::Result<Vec<GuildUser>>;

    async fn guild_channels(&self, guild_id: &str) -> anyhow::Result<Vec<GuildChannelInfo>>;

    async fn guild_emojis(&self, guild_id: &str) -> anyhow::Result<Vec<GuildEmoji>>;

    /// Reply to a message. Returns the created message id.
    async fn reply(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<String, ActionError>;

    /// Send a message to a channel. Returns the created message id.
    async fn send(&self, channel_id: &str, content: &str) -> Result<String, ActionError>;

    /// Add the agent's reaction. Returns the reaction count after the add.
    async fn react(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<u64, ActionError>;

    /// Remove the agent's reaction. Returns the reaction count after the
    /// removal.
    async fn unreact(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<u64, ActionError>;

    /// Best-effort typing indicator; cosmetic, never fails a turn.
    async fn typing(&self, _channel_id: &str) {}
}
