//! Route handler functions for all API endpoints.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use feedscope_core::llm::ToolCall;
use feedscope_core::session::{ChatMessage, MessageRole};
use feedscope_core::{AskResponse, SessionError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl From<ChatMessage> for HistoryMessage {
    fn from(msg: ChatMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content,
            timestamp: msg.timestamp,
            tool_calls: msg.tool_calls.filter(|calls| !calls.is_empty()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<HistoryMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataStatus {
    pub feeds_loaded: usize,
    pub encoder_loaded: bool,
    pub decoder_loaded: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub data: DataStatus,
    pub active_sessions: usize,
    pub uptime_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET / - service banner.
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Feedscope query API is running",
        "endpoints": {
            "ask": "POST /ask - Submit a natural language question",
            "new_session": "POST /session/new - Create a new chat session",
            "get_history": "GET /session/{session_id}/history - Get chat history",
            "clear_session": "DELETE /session/{session_id}/clear - Clear session history",
            "delete_session": "DELETE /session/{session_id} - Delete a session",
            "health": "GET /health - Data and session status"
        }
    }))
}

/// GET /health - data load status and live session count.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.store.status();
    Json(HealthResponse {
        status: if status.ready { "healthy" } else { "unhealthy" }.to_string(),
        data: DataStatus {
            feeds_loaded: status.feeds_loaded,
            encoder_loaded: status.encoder_loaded,
            decoder_loaded: status.decoder_loaded,
        },
        active_sessions: state.sessions.count(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        error: (!status.ready).then(|| "Record store not loaded".to_string()),
    })
}

/// POST /session/new
pub async fn new_session(State(state): State<AppState>) -> Json<NewSessionResponse> {
    Json(NewSessionResponse {
        session_id: state.sessions.create(),
    })
}

/// GET /session/{id}/history
pub async fn session_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    Ok(Json(HistoryResponse {
        session_id,
        messages: session.messages.into_iter().map(HistoryMessage::from).collect(),
    }))
}

/// DELETE /session/{id}/clear
pub async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.sessions.clear(&session_id).map_err(|e| match e {
        SessionError::NotFound(_) => ApiError::NotFound("Session not found".to_string()),
        other => ApiError::BadRequest(other.to_string()),
    })?;

    Ok(Json(MessageResponse {
        message: "Session history cleared successfully".to_string(),
    }))
}

/// DELETE /session/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.sessions.delete(&session_id) {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }
    tracing::info!(session_id = %session_id, "session deleted");

    Ok(Json(MessageResponse {
        message: "Session deleted successfully".to_string(),
    }))
}

/// POST /ask - answer one question, optionally inside an existing session.
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("Question must not be empty".to_string()));
    }

    let turn = state
        .orchestrator
        .ask(question, request.session_id.as_deref());

    let response = tokio::time::timeout(state.turn_timeout, turn)
        .await
        .map_err(|_| {
            tracing::warn!(
                timeout_secs = state.turn_timeout.as_secs(),
                "question turn timed out"
            );
            ApiError::GatewayTimeout("The model did not answer in time".to_string())
        })??;

    tracing::info!(
        session_id = %response.session_id,
        tool_calls = response.tool_calls.len(),
        "question answered"
    );
    Ok(Json(response))
}
