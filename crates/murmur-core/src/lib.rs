pub mod agent;
pub mod binder;
pub mod chat_tools;
pub mod client;
pub mod config;
pub mod context;
pub mod memory_tools;
pub mod orchestrator;
pub mod persona;
pub mod tool;
pub mod web_search_tool;

pub use agent::*;
pub use binder::*;
pub use chat_tools::*;
pub use client::*;
pub use config::*;
pub use context::*;
pub use memory_tools::*;
pub use orchestrator::*;
pub use persona::*;
pub use tool::*;
pub use web_search_tool::*;
