use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use murmur_memory::MemoryStore;
use murmur_provider::ToolDef;
use uuid::Uuid;

use crate::tool::{ToolExecutor, ToolOutput};

fn required_str<'a>(input: &'a serde_json::Value, field: &str) -> Result<&'a str> {
    input[field]
        .as_str()
        .ok_or_else(|| anyhow!("missing '{field}' field"))
}

fn tags_from(input: &serde_json::Value) -> Option<Vec<String>> {
    input["tags"].as_array().map(|tags| {
        tags.iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect()
    })
}

pub struct AddMemoryTool {
    store: Arc<MemoryStore>,
}

impl AddMemoryTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolExecutor for AddMemoryTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "add_memories".into(),
            description: "Store a new memory about a user or conversation".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "userId": {"type": "string", "description": "The user ID the memory is about"},
                    "memory": {"type": "string", "description": "The memory to store"},
                    "tags": {"type": "array", "items": {"type": "string"}, "description": "Optional tags for categorization"}
                },
                "required": ["userId", "memory"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let user_id = required_str(&input, "userId")?;
        let memory = required_str(&input, "memory")?;
        let tags = tags_from(&input).unwrap_or_default();

        match self.store.add(user_id, memory, tags).await {
            Ok(record) => {
                tracing::info!("memory stored: {} for user {user_id}", record.id);
                Ok(ToolOutput::ok(
                    serde_json::json!({"success": true, "memoryId": record.id}),
                ))
            }
            Err(err) => {
                tracing::warn!("memory store write failed: {err}");
                Ok(ToolOutput::failure(err.to_string()))
            }
        }
    }
}

pub struct SearchMemoryTool {
    store: Arc<MemoryStore>,
}

impl SearchMemoryTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolExecutor for SearchMemoryTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "search_memory".into(),
            description: "Search for memories about a specific user".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "userId": {"type": "string", "description": "The user ID to search memories for"},
                    "query": {"type": "string", "description": "Optional search query to filter memories"}
                },
                "required": ["userId"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let user_id = required_str(&input, "userId")?;
        let query = input["query"].as_str();

        // An empty memory view is a safe default; store errors stay in logs.
        let memories = match self.store.search(user_id, query).await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!("memory search failed for {user_id}, returning empty: {err}");
                Vec::new()
            }
        };
        tracing::info!("memory search for {user_id}: {} found", memories.len());
        Ok(ToolOutput::ok(serde_json::json!({"memories": memories})))
    }
}

pub struct UpdateMemoryTool {
    store: Arc<MemoryStore>,
}

impl UpdateMemoryTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolExecutor for UpdateMemoryTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "update_memories".into(),
            description: "Update an existing memory".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "memoryId": {"type": "string", "description": "The memory ID to update"},
                    "memory": {"type": "string", "description": "The updated memory content"},
                    "tags": {"type": "array", "items": {"type": "string"}, "description": "Updated tags"}
                },
                "required": ["memoryId", "memory"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let memory_id = required_str(&input, "memoryId")?;
        let memory = required_str(&input, "memory")?;
        let tags = tags_from(&input);

        let Ok(id) = memory_id.parse::<Uuid>() else {
            return Ok(ToolOutput::failure("Memory not found"));
        };

        match self.store.update(id, memory, tags).await {
            Ok(true) => Ok(ToolOutput::ok(serde_json::json!({"success": true}))),
            Ok(false) => Ok(ToolOutput::failure("Memory not found")),
            Err(err) => {
                tracing::warn!("memory update failed for {memory_id}: {err}");
                Ok(ToolOutput::failure(err.to_string()))
            }
        }
    }
}

pub struct DeleteMemoryTool {
    store: Arc<MemoryStore>,
}

impl DeleteMemoryTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolExecutor for DeleteMemoryTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "delete_memory".into(),
            description: "Delete a memory".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "memoryId": {"type": "string", "description": "The memory ID to delete"}
                },
                "required": ["memoryId"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let memory_id = required_str(&input, "memoryId")?;

        let deleted = match memory_id.parse::<Uuid>() {
            Ok(id) => self.store.delete(id).await.unwrap_or_else(|err| {
                tracing::warn!("memory delete failed for {memory_id}: {err}");
                false
            }),
            Err(_) => false,
        };
        tracing::info!("memory deletion: {memory_id} success={deleted}");

        // Not-found is an unexceptional {success:false}, never an error.
        Ok(ToolOutput {
            content: serde_json::json!({"success": deleted}).to_string(),
            is_error: !deleted,
        })
    }
}

pub struct ListMemoriesTool {
    store: Arc<MemoryStore>,
}

impl ListMemoriesTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

const DEFAULT_LIST_LIMIT: usize = 50;

#[async_trait]
impl ToolExecutor for ListMemoriesTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "list_memories".into(),
            description: "List all memories for a user".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "userId": {"type": "string", "description": "The user ID"},
                    "limit": {"type": "integer", "description": "Limit the number of memories returned"}
                },
                "required": ["userId"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let user_id = required_str(&input, "userId")?;
        let limit = input["limit"]
            .as_u64()
            .map(|l| l as usize)
            .unwrap_or(DEFAULT_LIST_LIMIT);

        let memories = match self.store.list(user_id, limit).await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!("memory list failed for {user_id}, returning empty: {err}");
                Vec::new()
            }
        };
        tracing::info!("memory list for {user_id}: {} returned", memories.len());
        Ok(ToolOutput::ok(serde_json::json!({"memories": memories})))
    }
}
