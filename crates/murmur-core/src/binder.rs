use std::sync::Arc;

use murmur_memory::MemoryStore;
use murmur_provider::LlmProvider;
use murmur_schema::InvocationContext;

use crate::chat_tools::{
    AddReactionTool, JoinVoiceChannelTool, LeaveVoiceChannelTool, ListAllChannelsTool,
    RemoveReactionTool, ReplyToTool, SendMessageTool, SkipTool,
};
use crate::client::ChatClient;
use crate::memory_tools::{
    AddMemoryTool, DeleteMemoryTool, ListMemoriesTool, SearchMemoryTool, UpdateMemoryTool,
};
use crate::tool::ToolRegistry;
use crate::web_search_tool::SearchWebTool;

/// Provider + model the `search_web` tool delegates to. Absent when web
/// search is disabled.
pub struct WebSearchBinding {
    pub provider: Arc<dyn LlmProvider>,
    pub model: String,
}

/// Build the tool registry for one turn. Every action tool closes over
/// this invocation's context snapshot, so defaults like "the current
/// channel" resolve against the triggering message and never leak between
/// turns. Nothing here is shared mutable state: a new registry per turn.
pub fn build_tool_registry(
    ctx: Arc<InvocationContext>,
    client: Arc<dyn ChatClient>,
    store: Arc<MemoryStore>,
    web_search: Option<WebSearchBinding>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    // Chat interaction tools
    registry.register(Box::new(SkipTool));
    registry.register(Box::new(ReplyToTool::new(ctx.clone(), client.clone())));
    registry.register(Box::new(SendMessageTool::new(ctx.clone(), client.clone())));
    registry.register(Box::new(AddReactionTool::new(client.clone())));
    registry.register(Box::new(RemoveReactionTool::new(client.clone())));
    registry.register(Box::new(JoinVoiceChannelTool::new(ctx.clone())));
    registry.register(Box::new(LeaveVoiceChannelTool));
    registry.register(Box::new(ListAllChannelsTool::new(ctx)));

    // Memory tools
    registry.register(Box::new(AddMemoryTool::new(store.clone())));
    registry.register(Box::new(SearchMemoryTool::new(store.clone())));
    registry.register(Box::new(UpdateMemoryTool::new(store.clone())));
    registry.register(Box::new(DeleteMemoryTool::new(store.clone())));
    registry.register(Box::new(ListMemoriesTool::new(store)));

    // Information tools
    if let Some(web) = web_search {
        registry.register(Box::new(SearchWebTool::new(web.provider, web.model)));
    }

    registry
}
