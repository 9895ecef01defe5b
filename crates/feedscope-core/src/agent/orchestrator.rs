use crate::error::{FeedError, Result};
use crate::llm::{LlmClient, LlmResponse, Message, ToolCall};
use crate::session::{NewMessage, SessionError, SessionStore};
use crate::tools::{ToolDefinition, ToolFailure, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Result recorded for invocations that were cut off by a crash or timeout.
pub const INTERRUPTED_TOOL_RESULT: &str = "Tool call was interrupted before producing a result";

/// Where a single request is in its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    AwaitingModel,
    ModelResponded,
    ExecutingTools,
    AwaitingModelFinal,
    Done,
}

/// Events emitted while a question is answered.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    SessionCreated { session_id: String },
    State(TurnState),
    ToolStart { name: String },
    ToolResult { name: String, success: bool, summary: String },
    Complete { tool_calls: usize },
    Error(String),
}

/// One executed tool call as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub name: String,
    pub arguments: Value,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub tool_calls: Vec<ToolExecution>,
    pub session_id: String,
}

/// Drives one question through the model, the tools and the session store.
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    sessions: Arc<SessionStore>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, sessions: Arc<SessionStore>) -> Self {
        Self {
            llm,
            tools,
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Answer a question, creating a session when none is given.
    pub async fn ask(&self, question: impl Into<String>, session_id: Option<&str>) -> Result<AskResponse> {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        self.ask_with_events(question, session_id, tx).await
    }

    /// Answer a question, emitting [`AgentEvent`]s through the channel.
    pub async fn ask_with_events(
        &self,
        question: impl Into<String>,
        session_id: Option<&str>,
        event_tx: UnboundedSender<AgentEvent>,
    ) -> Result<AskResponse> {
        let question = question.into();
        let session_id = self.resolve_session(session_id, &event_tx)?;

        self.close_interrupted(&session_id)?;
        self.sessions.append(&session_id, NewMessage::user(&question))?;

        self.enter(TurnState::AwaitingModel, &session_id, &event_tx);
        let definitions = self.tools.definitions();
        let response = self
            .call_model(&session_id, &definitions, &event_tx)
            .await?;
        self.enter(TurnState::ModelResponded, &session_id, &event_tx);

        let invocations: Vec<ToolCall> = response.message.invocations().to_vec();
        if invocations.is_empty() {
            let answer = response.message.content;
            return self.finish(session_id, answer, Vec::new(), &event_tx);
        }

        let running = self.sessions.begin_invocations(
            &session_id,
            response.message.content,
            invocations.clone(),
        )?;
        self.enter(TurnState::ExecutingTools, &session_id, &event_tx);

        let mut executions = Vec::with_capacity(invocations.len());
        for call in &invocations {
            let execution = self.execute_invocation(call, &event_tx).await;
            let content = serde_json::to_string(&execution.result)?;
            self.sessions
                .append(&session_id, NewMessage::tool_result(&call.id, content))?;
            executions.push(execution);
        }
        drop(running);

        self.enter(TurnState::AwaitingModelFinal, &session_id, &event_tx);
        let final_response = self.call_model(&session_id, &[], &event_tx).await?;
        if final_response.has_tool_calls() {
            let err = FeedError::Llm("model requested tool calls while producing its final answer".into());
            let _ = event_tx.send(AgentEvent::Error(err.to_string()));
            return Err(err);
        }

        self.finish(session_id, final_response.message.content, executions, &event_tx)
    }

    fn resolve_session(
        &self,
        session_id: Option<&str>,
        event_tx: &UnboundedSender<AgentEvent>,
    ) -> Result<String> {
        match session_id {
            Some(id) if self.sessions.exists(id) => Ok(id.to_string()),
            Some(id) => Err(SessionError::NotFound(id.to_string()).into()),
            None => {
                let id = self.sessions.create();
                let _ = event_tx.send(AgentEvent::SessionCreated {
                    session_id: id.clone(),
                });
                Ok(id)
            }
        }
    }

    /// Record a visible failure result for invocations left without one by
    /// an earlier, aborted turn. Invocations another turn is still running
    /// are left alone.
    fn close_interrupted(&self, session_id: &str) -> Result<()> {
        let content = ToolFailure::new(INTERRUPTED_TOOL_RESULT).into_value().to_string();
        let closed = self.sessions.close_interrupted(session_id, &content)?;
        for call in closed {
            tracing::warn!(
                session_id,
                tool_call_id = %call.id,
                tool = %call.function.name,
                "closed interrupted tool invocation"
            );
        }
        Ok(())
    }

    async fn call_model(
        &self,
        session_id: &str,
        tools: &[ToolDefinition],
        event_tx: &UnboundedSender<AgentEvent>,
    ) -> Result<LlmResponse> {
        let messages: Vec<Message> = self
            .sessions
            .history(session_id, true)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        self.llm
            .chat(&messages, tools)
            .await
            .inspect_err(|e| {
                tracing::warn!(session_id, error = %e, "model call failed");
                let _ = event_tx.send(AgentEvent::Error(e.to_string()));
            })
    }

    async fn execute_invocation(
        &self,
        call: &ToolCall,
        event_tx: &UnboundedSender<AgentEvent>,
    ) -> ToolExecution {
        let name = call.function.name.clone();
        let _ = event_tx.send(AgentEvent::ToolStart { name: name.clone() });

        let (arguments, outcome) = match call.parse_arguments() {
            Ok(arguments) => {
                let outcome = self.tools.dispatch(&name, arguments.clone()).await;
                (arguments, outcome)
            }
            Err(e) => (
                Value::String(call.function.arguments.clone()),
                Err(ToolFailure::new(format!("Failed to parse tool arguments: {e}"))),
            ),
        };

        let success = outcome.is_ok();
        let result = outcome.unwrap_or_else(ToolFailure::into_value);

        let _ = event_tx.send(AgentEvent::ToolResult {
            name: name.clone(),
            success,
            summary: truncate_str(&result.to_string(), 200),
        });

        ToolExecution {
            name,
            arguments,
            result,
        }
    }

    fn finish(
        &self,
        session_id: String,
        answer: String,
        tool_calls: Vec<ToolExecution>,
        event_tx: &UnboundedSender<AgentEvent>,
    ) -> Result<AskResponse> {
        self.sessions
            .append(&session_id, NewMessage::assistant(&answer))?;
        self.enter(TurnState::Done, &session_id, event_tx);
        let _ = event_tx.send(AgentEvent::Complete {
            tool_calls: tool_calls.len(),
        });

        Ok(AskResponse {
            answer,
            tool_calls,
            session_id,
        })
    }

    fn enter(&self, state: TurnState, session_id: &str, event_tx: &UnboundedSender<AgentEvent>) {
        tracing::debug!(session_id, ?state, "turn state");
        let _ = event_tx.send(AgentEvent::State(state));
    }
}

fn truncate_str(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("abcdef", 3), "abc...");
        assert_eq!(truncate_str("ééééé", 2), "éé...");
    }
}
