pub mod discord;

use async_trait::async_trait;

pub use discord::{DiscordBot, SerenityChatClient};

/// A platform connector that owns its gateway connection for the lifetime
/// of the process.
#[async_trait]
pub trait ChannelBot: Send {
    fn channel_type(&self) -> &str;
    async fn run(self: Box<Self>) -> anyhow::Result<()>;
}
