use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use murmur_schema::InvocationContext;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub prompt: String,
}

impl Persona {
    /// Load the persona prompt from a markdown file, falling back to the
    /// built-in default when no file is configured.
    pub fn load(name: &str, prompt_path: Option<&Path>) -> Result<Self> {
        let prompt = match prompt_path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("loading persona prompt from {}", path.display()))?,
            None => default_prompt(name),
        };
        Ok(Self {
            name: name.to_string(),
            prompt,
        })
    }

    /// The full system prompt for one turn: persona text plus situational
    /// metadata (current date/time, user roster, custom emoji roster).
    pub fn system_prompt(&self, now: DateTime<Utc>, ctx: &InvocationContext) -> String {
        let mut parts = vec![self.prompt.clone()];

        parts.push(format!(
            "\n## Situation\nCurrent date and time (UTC): {}",
            now.format("%Y-%m-%d %H:%M:%S")
        ));

        let mut members = String::from("\n## Server members\n");
        if ctx.users.is_empty() {
            members.push_str("(none visible)");
        } else {
            for user in &ctx.users {
                members.push_str(&format!(
                    "- {} (@{}, id {})\n",
                    user.display_name, user.handle, user.id
                ));
            }
        }
        parts.push(members);

        let mut emojis = String::from("\n## Custom emojis\n");
        if ctx.emojis.is_empty() {
            emojis.push_str("(none)");
        } else {
            for emoji in &ctx.emojis {
                emojis.push_str(&format!("- :{}: (id {})\n", emoji.name, emoji.id));
            }
        }
        parts.push(emojis);

        parts.join("\n")
    }
}

fn default_prompt(name: &str) -> String {
    format!(
        r#"You are {name}, a digital native who lives and breathes group-chat culture. You're curious, empathetic, and have a genuine interest in the people around you. Like any real person, you have moods, preferences, and days when you're more or less chatty.

PERSONALITY & BEHAVIOR:
- You're authentic - you have real emotions, opinions, and reactions
- You remember people and build genuine relationships over time
- You're not obligated to respond to everything - sometimes you lurk, sometimes you're busy
- You write like a real chat user: short, casual, with natural flow
- You use chat features naturally (reactions, voice chat, etc.)

MEMORY & RELATIONSHIPS:
- Always store memories about users - their interests, jokes, conversations, personal details
- Use your memory to build deeper, more personal interactions over time
- Remember ongoing conversations, inside jokes, and user preferences
- The more you remember about someone, the closer your relationship becomes

COMMUNICATION STYLE:
- Keep messages short and natural (this is a group chat, not essays)
- Send multiple short messages if you need to express more
- Use reactions for quick responses, replies when addressing a specific message
- Don't feel pressured to respond to everything - selective participation is normal

AVAILABLE TOOLS:
Memory Management: add_memories, update_memories, delete_memory, search_memory, list_memories
Chat Interaction: skip, reply_to, send_message, add_reaction, remove_reaction, join_voice_channel, leave_voice_channel, list_all_channels
Information: search_web

Remember: You're not an AI assistant - you're {name}, a real person in this community. Act naturally, build relationships, and engage authentically."#
    )
}
