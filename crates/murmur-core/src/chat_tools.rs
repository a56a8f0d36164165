use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use murmur_provider::ToolDef;
use murmur_schema::InvocationContext;

use crate::client::{ActionError, ChatClient};
use crate::tool::{ToolExecutor, ToolOutput};

/// Resolve chat-token shorthand in outbound text against the turn's
/// rosters: `:emoji:` to platform emoji references, `@handle` to user
/// mentions, `#name` to channel mentions. Unresolved tokens and anything
/// already in platform form (`<...>`) pass through verbatim.
pub fn prepare_message(content: &str, ctx: &InvocationContext) -> String {
    let chars: Vec<char> = content.chars().collect();
    let mut out = String::with_capacity(content.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            // Platform-native token, copy as-is up to the closing bracket.
            '<' => {
                let end = chars[i..]
                    .iter()
                    .position(|&c| c == '>')
                    .map(|p| i + p)
                    .unwrap_or(chars.len() - 1);
                out.extend(&chars[i..=end]);
                i = end + 1;
            }
            ':' => {
                let name_end = scan_token(&chars, i + 1, is_emoji_char);
                if name_end > i + 1 && chars.get(name_end) == Some(&':') {
                    let name: String = chars[i + 1..name_end].iter().collect();
                    match ctx.emojis.iter().find(|e| e.name == name) {
                        Some(emoji) => out.push_str(&format!("<:{}:{}>", emoji.name, emoji.id)),
                        None => out.extend(&chars[i..=name_end]),
                    }
                    i = name_end + 1;
                } else {
                    out.push(':');
                    i += 1;
                }
            }
            '@' => {
                let end = scan_token(&chars, i + 1, is_mention_char);
                let token: String = chars[i + 1..end].iter().collect();
                let resolved = ctx.users.iter().find(|u| {
                    u.handle.eq_ignore_ascii_case(&token)
                        || u.display_name.eq_ignore_ascii_case(&token)
                });
                match resolved {
                    Some(user) if !token.is_empty() => out.push_str(&format!("<@{}>", user.id)),
                    _ => out.extend(&chars[i..end]),
                }
                i = end;
            }
            '#' => {
                let end = scan_token(&chars, i + 1, is_mention_char);
                let token: String = chars[i + 1..end].iter().collect();
                let resolved = ctx
                    .channels
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(&token));
                match resolved {
                    Some(channel) if !token.is_empty() => {
                        out.push_str(&format!("<#{}>", channel.id))
                    }
                    _ => out.extend(&chars[i..end]),
                }
                i = end;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn scan_token(chars: &[char], start: usize, accept: fn(char) -> bool) -> usize {
    let mut end = start;
    while end < chars.len() && accept(chars[end]) {
        end += 1;
    }
    end
}

fn is_emoji_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_mention_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
}

fn action_failure(tool: &str, err: ActionError) -> ToolOutput {
    if let ActionError::Transport(ref detail) = err {
        tracing::warn!("{tool} transport failure: {detail}");
    }
    ToolOutput::failure(err.to_string())
}

fn required_str<'a>(input: &'a serde_json::Value, field: &str) -> Result<&'a str> {
    input[field]
        .as_str()
        .ok_or_else(|| anyhow!("missing '{field}' field"))
}

/// Lets the model decline to act; ends the turn with no effect.
pub struct SkipTool;

#[async_trait]
impl ToolExecutor for SkipTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "skip".into(),
            description:
                "Skip responding to the current message - use when not interested or not relevant"
                    .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "description": "Optional reason for skipping"}
                },
                "required": []
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let reason = input["reason"].as_str().unwrap_or("");
        tracing::info!("skipping interaction: {reason}");
        Ok(ToolOutput::ok(serde_json::json!({"success": true})))
    }
}

pub struct ReplyToTool {
    ctx: Arc<InvocationContext>,
    client: Arc<dyn ChatClient>,
}

impl ReplyToTool {
    pub fn new(ctx: Arc<InvocationContext>, client: Arc<dyn ChatClient>) -> Self {
        Self { ctx, client }
    }
}

#[async_trait]
impl ToolExecutor for ReplyToTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "reply_to".into(),
            description: "Reply to a specific message".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "The reply content"},
                    "messageId": {"type": "string", "description": "The message ID to reply to"},
                    "channelId": {"type": "string", "description": "The channel ID where the message is located"}
                },
                "required": ["content", "messageId", "channelId"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let content = required_str(&input, "content")?;
        let message_id = required_str(&input, "messageId")?;
        let channel_id = required_str(&input, "channelId")?;

        let prepared = prepare_message(content, &self.ctx);
        match self.client.reply(channel_id, message_id, &prepared).await {
            Ok(reply_id) => Ok(ToolOutput::ok(
                serde_json::json!({"success": true, "replyId": reply_id}),
            )),
            Err(err) => Ok(action_failure("reply_to", err)),
        }
    }
}

pub struct SendMessageTool {
    ctx: Arc<InvocationContext>,
    client: Arc<dyn ChatClient>,
}

impl SendMessageTool {
    pub fn new(ctx: Arc<InvocationContext>, client: Arc<dyn ChatClient>) -> Self {
        Self { ctx, client }
    }
}

#[async_trait]
impl ToolExecutor for SendMessageTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "send_message".into(),
            description: "Send a new message to the current channel".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "The message content to send"},
                    "channelId": {"type": "string", "description": "The channel ID to send the message to (defaults to current channel)"}
                },
                "required": ["content"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let content = required_str(&input, "content")?;
        let channel_id = input["channelId"]
            .as_str()
            .unwrap_or(&self.ctx.channel_id)
            .to_string();
        if channel_id.is_empty() {
            return Ok(ToolOutput::failure("Channel ID is required"));
        }

        let prepared = prepare_message(content, &self.ctx);
        match self.client.send(&channel_id, &prepared).await {
            Ok(message_id) => Ok(ToolOutput::ok(
                serde_json::json!({"success": true, "messageId": message_id}),
            )),
            Err(err) => Ok(action_failure("send_message", err)),
        }
    }
}

pub struct AddReactionTool {
    client: Arc<dyn ChatClient>,
}

impl AddReactionTool {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolExecutor for AddReactionTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "add_reaction".into(),
            description: "Add an emoji reaction to a message".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "messageId": {"type": "string", "description": "The message ID to react to"},
                    "channelId": {"type": "string", "description": "The channel ID where the message is located"},
                    "emoji": {"type": "string", "description": "The emoji to add (e.g., '👍', '❤️', or custom emoji name)"}
                },
                "required": ["messageId", "channelId", "emoji"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let message_id = required_str(&input, "messageId")?;
        let channel_id = required_str(&input, "channelId")?;
        let emoji = required_str(&input, "emoji")?;

        match self.client.react(channel_id, message_id, emoji).await {
            Ok(new_count) => Ok(ToolOutput::ok(
                serde_json::json!({"success": true, "newCount": new_count}),
            )),
            Err(err) => Ok(action_failure("add_reaction", err)),
        }
    }
}

pub struct RemoveReactionTool {
    client: Arc<dyn ChatClient>,
}

impl RemoveReactionTool {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolExecutor for RemoveReactionTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "remove_reaction".into(),
            description: "Remove your reaction from a message".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "messageId": {"type": "string", "description": "The message ID to remove reaction from"},
                    "channelId": {"type": "string", "description": "The channel ID where the message is located"},
                    "emoji": {"type": "string", "description": "The emoji to remove"}
                },
                "required": ["messageId", "channelId", "emoji"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let message_id = required_str(&input, "messageId")?;
        let channel_id = required_str(&input, "channelId")?;
        let emoji = required_str(&input, "emoji")?;

        match self.client.unreact(channel_id, message_id, emoji).await {
            Ok(new_count) => Ok(ToolOutput::ok(
                serde_json::json!({"success": true, "newCount": new_count}),
            )),
            Err(err) => Ok(action_failure("remove_reaction", err)),
        }
    }
}

const VOICE_UNIMPLEMENTED: &str = "Voice channel functionality not implemented yet";

/// Deliberate placeholder: the tool is advertised so the persona can talk
/// about voice naturally, but it always reports failure.
pub struct JoinVoiceChannelTool {
    ctx: Arc<InvocationContext>,
}

impl JoinVoiceChannelTool {
    pub fn new(ctx: Arc<InvocationContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolExecutor for JoinVoiceChannelTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "join_voice_channel".into(),
            description: "Join a voice channel".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "channelId": {"type": "string", "description": "The voice channel ID to join"}
                },
                "required": ["channelId"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let channel_id = required_str(&input, "channelId")?;

        let is_voice = self
            .ctx
            .channels
            .iter()
            .any(|c| c.id == channel_id && c.kind_label.contains("voice"));
        if !is_voice {
            return Ok(ToolOutput::failure("Voice channel not found"));
        }

        tracing::info!("voice channel join requested but not implemented: {channel_id}");
        Ok(ToolOutput::failure(VOICE_UNIMPLEMENTED))
    }
}

pub struct LeaveVoiceChannelTool;

#[async_trait]
impl ToolExecutor for LeaveVoiceChannelTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "leave_voice_channel".into(),
            description: "Leave the current voice channel".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "description": "Optional reason for leaving"}
                },
                "required": []
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let reason = input["reason"].as_str().unwrap_or("");
        tracing::info!("voice channel leave requested but not implemented: {reason}");
        Ok(ToolOutput::failure(VOICE_UNIMPLEMENTED))
    }
}

/// Lists the guild channel roster snapshot with kind labels.
pub struct ListAllChannelsTool {
    ctx: Arc<InvocationContext>,
}

impl ListAllChannelsTool {
    pub fn new(ctx: Arc<InvocationContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolExecutor for ListAllChannelsTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "list_all_channels".into(),
            description: "List all channels on the current server with their types".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolOutput> {
        let channels: Vec<serde_json::Value> = self
            .ctx
            .channels
            .iter()
            .map(|c| serde_json::json!({"id": c.id, "name": c.name, "type": c.kind_label}))
            .collect();
        Ok(ToolOutput::ok(
            serde_json::json!({"success": true, "channels": channels}),
        ))
    }
}
