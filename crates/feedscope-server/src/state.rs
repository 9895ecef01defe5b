//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use feedscope_core::{LlmClient, Orchestrator, RecordStore, SessionStore, ToolRegistry};

/// Upper bound on one `/ask` request when nothing else is configured.
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(180);

/// Shared application state. Cheap to clone; every field is an `Arc` or `Copy`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub sessions: Arc<SessionStore>,
    pub orchestrator: Arc<Orchestrator>,
    /// Deadline for a whole question turn, model calls included.
    pub turn_timeout: Duration,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the orchestrator over the store's tools and the given model.
    pub fn new(store: Arc<RecordStore>, sessions: Arc<SessionStore>, llm: Arc<dyn LlmClient>) -> Self {
        let tools = Arc::new(ToolRegistry::for_store(store.clone()));
        let orchestrator = Arc::new(Orchestrator::new(llm, tools, sessions.clone()));
        Self {
            store,
            sessions,
            orchestrator,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
            start_time: Instant::now(),
        }
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }
}
