use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The message an inbound event replies to, when the platform reports one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRef {
    pub message_id: String,
    pub author_id: String,
}

/// One inbound platform event, snapshotted at the gateway boundary.
///
/// Everything the trigger decision needs is carried on the event itself so
/// that decision stays a pure function of its inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub message_id: String,
    pub author_id: String,
    pub author_handle: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    pub content: String,
    /// Content with platform markup resolved to plain mentions.
    pub clean_content: String,
    /// User ids mentioned in the message.
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub reply_to: Option<ReplyRef>,
}

/// One entry of the fetched channel message window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub id: String,
    pub author_id: String,
    pub author_handle: String,
    pub content: String,
    pub clean_content: String,
    #[serde(default)]
    pub mentions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Guild member snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildUser {
    pub id: String,
    pub handle: String,
    pub display_name: String,
}

/// Guild channel snapshot with its composite kind label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildChannelInfo {
    pub id: String,
    pub name: String,
    pub kind_label: String,
}

/// Custom guild emoji snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildEmoji {
    pub name: String,
    pub id: String,
}

/// Immutable per-turn snapshot of the triggering message and the guild
/// rosters. Built once by the context assembler, shared read-only by every
/// tool bound for that turn, and discarded when the turn ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationContext {
    pub message_id: String,
    pub author_id: String,
    pub author_handle: String,
    /// Default reply channel: the channel the triggering message arrived in.
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    pub content: String,
    pub users: Vec<GuildUser>,
    pub channels: Vec<GuildChannelInfo>,
    pub emojis: Vec<GuildEmoji>,
}

/// Builds the channel kind label from the platform predicates.
///
/// A channel satisfying several predicates gets the ordered combination
/// ("text & voice"); one satisfying none is "unknown".
pub fn channel_kind_label(is_text: bool, is_voice: bool, is_thread: bool) -> String {
    let mut kinds = Vec::new();
    if is_text {
        kinds.push("text");
    }
    if is_voice {
        kinds.push("voice");
    }
    if is_thread {
        kinds.push("thread");
    }
    if kinds.is_empty() {
        return "unknown".to_string();
    }
    kinds.join(" & ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_label_single_predicate() {
        assert_eq!(channel_kind_label(true, false, false), "text");
        assert_eq!(channel_kind_label(false, true, false), "voice");
    }

    #[test]
    fn kind_label_composite_keeps_order() {
        assert_eq!(channel_kind_label(true, true, false), "text & voice");
        assert_eq!(channel_kind_label(true, false, true), "text & thread");
        assert_eq!(channel_kind_label(true, true, true), "text & voice & thread");
    }

    #[test]
    fn kind_label_none_is_unknown() {
        assert_eq!(channel_kind_label(false, false, false), "unknown");
    }

    #[test]
    fn inbound_event_optional_fields_default() {
        let json = serde_json::json!({
            "message_id": "m1",
            "author_id": "u1",
            "author_handle": "ada",
            "channel_id": "c1",
            "content": "hello",
            "clean_content": "hello"
        });
        let event: InboundEvent = serde_json::from_value(json).unwrap();
        assert!(event.guild_id.is_none());
        assert!(event.mentions.is_empty());
        assert!(event.reply_to.is_none());
    }

    #[test]
    fn invocation_context_roundtrip() {
        let ctx = InvocationContext {
            message_id: "m1".into(),
            author_id: "u1".into(),
            author_handle: "ada".into(),
            channel_id: "c1".into(),
            guild_id: Some("g1".into()),
            content: "hi".into(),
            users: vec![GuildUser {
                id: "u1".into(),
                handle: "ada".into(),
                display_name: "Ada".into(),
            }],
            channels: vec![GuildChannelInfo {
                id: "c1".into(),
                name: "general".into(),
                kind_label: "text".into(),
            }],
            emojis: vec![GuildEmoji {
                name: "wave".into(),
                id: "e1".into(),
            }],
        };
        let json = serde_json::to_string(&ctx).unwrap();
        let parsed: InvocationContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.channel_id, "c1");
        assert_eq!(parsed.users[0].display_name, "Ada");
        assert_eq!(parsed.emojis[0].name, "wave");
    }
}
