//! HTTP API for feedscope.
//!
//! Exposes question answering, session management and a health check over
//! the core orchestrator, plus a background task that sweeps idle sessions.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, spawn_session_reaper, start_server};
pub use state::AppState;
