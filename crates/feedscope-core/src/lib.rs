pub mod error;
pub mod llm;
pub mod tools;
pub mod query;
pub mod store;
pub mod session;
pub mod context;
pub mod config;
pub mod agent;

// Re-export key types
pub use error::{FeedError, Result};
pub use agent::{AgentEvent, AskResponse, Orchestrator, ToolExecution, TurnState};
pub use llm::{LlmClient, LlmResponse, Message, Role};
pub use tools::{Tool, ToolDefinition, ToolRegistry, ToolResult};
pub use query::{QueryError, QuerySpec, SearchResult};
pub use store::{DataSource, DirectorySource, RecordStore};
pub use session::{SessionError, SessionStore};
pub use context::SYSTEM_PROMPT;
pub use config::Settings;
