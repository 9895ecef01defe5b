mod orchestrator;

pub use orchestrator::{
    AgentEvent, AskResponse, Orchestrator, ToolExecution, TurnState, INTERRUPTED_TOOL_RESULT,
};
