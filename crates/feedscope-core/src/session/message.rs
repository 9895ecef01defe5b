use crate::llm::{Message, ToolCall};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

/// A message as recorded in a session. Never modified after it is appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Translate into the shape the model consumes.
    pub fn to_model_message(&self) -> Message {
        match (self.role, &self.tool_calls, &self.tool_call_id) {
            (MessageRole::Tool, _, Some(id)) => Message::tool_result(id.clone(), self.content.clone()),
            (MessageRole::Tool, _, None) => Message {
                role: crate::llm::Role::Tool,
                content: self.content.clone(),
                tool_calls: None,
                tool_call_id: None,
            },
            (MessageRole::Assistant, Some(calls), _) if !calls.is_empty() => {
                Message::assistant_with_tools(self.content.clone(), calls.clone())
            }
            (MessageRole::Assistant, _, _) => Message::assistant(self.content.clone()),
            (MessageRole::User, _, _) => Message::user(self.content.clone()),
        }
    }
}

/// A message about to be appended; the store stamps the time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub(crate) fn stamp(self, timestamp: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content,
            timestamp,
            tool_calls: self.tool_calls,
            tool_call_id: self.tool_call_id,
        }
    }
}

/// One conversation. Message order is conversation order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether an earlier assistant message issued this invocation id.
    pub fn has_invocation(&self, tool_call_id: &str) -> bool {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .flat_map(|m| m.tool_calls.iter().flatten())
            .any(|call| call.id == tool_call_id)
    }

    /// Whether a tool message already answers this invocation id.
    pub fn has_result(&self, tool_call_id: &str) -> bool {
        self.messages
            .iter()
            .any(|m| m.role == MessageRole::Tool && m.tool_call_id.as_deref() == Some(tool_call_id))
    }

    /// Invocations that never received a tool result, oldest first.
    pub fn pending_invocations(&self) -> Vec<ToolCall> {
        let answered: HashSet<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();

        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .flat_map(|m| m.tool_calls.iter().flatten())
            .filter(|call| !answered.contains(call.id.as_str()))
            .cloned()
            .collect()
    }

    /// Rebuild the model-facing history, optionally behind a system preamble.
    pub fn to_model_messages(&self, system_prompt: Option<&str>) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system) = system_prompt {
            messages.push(Message::system(system));
        }
        messages.extend(self.messages.iter().map(ChatMessage::to_model_message));
        messages
    }
}
