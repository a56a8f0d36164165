use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One durable fact the agent has stored about a user.
///
/// Serialized field names are the wire contract the model sees in tool
/// results, so they stay camelCase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: Uuid,
    pub user_id: String,
    pub memory: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// None until the record is first updated.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    /// Case-insensitive match against content or any tag.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.memory.to_lowercase().contains(&needle)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(memory: &str, tags: &[&str]) -> MemoryRecord {
        MemoryRecord {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            memory: memory.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            timestamp: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn matches_content_case_insensitively() {
        let r = record("Loves a good Joke about compilers", &[]);
        assert!(r.matches("JOKE"));
        assert!(r.matches("joke"));
        assert!(!r.matches("cooking"));
    }

    #[test]
    fn matches_tags_case_insensitively() {
        let r = record("something", &["joke", "humor"]);
        assert!(r.matches("JOKE"));
        assert!(r.matches("Hum"));
    }

    #[test]
    fn serializes_camel_case() {
        let r = record("fact", &[]);
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("user_id").is_none());
    }
}
