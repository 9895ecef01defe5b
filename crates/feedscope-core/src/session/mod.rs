//! Chat sessions: creation, lazy expiry, and history replay.

mod clock;
mod message;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use message::{ChatMessage, ChatSession, MessageRole, NewMessage};
pub use store::{InFlight, SessionStore};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Tool result in session {0} has no invocation id")]
    MissingToolCallId(String),

    #[error("Tool result {tool_call_id} in session {session_id} answers no recorded invocation")]
    OrphanToolResult {
        session_id: String,
        tool_call_id: String,
    },

    #[error("Tool result {tool_call_id} in session {session_id} is already recorded")]
    DuplicateToolResult {
        session_id: String,
        tool_call_id: String,
    },
}
