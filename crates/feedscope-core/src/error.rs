use std::path::PathBuf;
use thiserror::Error;

use crate::query::QueryError;
use crate::session::SessionError;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Tool error: {tool}: {message}")]
    Tool { tool: String, message: String },

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{block} parameters validation failed: {message}")]
    Validation { block: String, message: String },

    #[error("Record store not loaded. Call load() first.")]
    NotReady,

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Other(String),
}

impl FeedError {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn invalid_arguments(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// True when the failure means the caller named a session that does not exist.
    pub fn is_session_not_found(&self) -> bool {
        matches!(self, Self::Session(SessionError::NotFound(_)))
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
