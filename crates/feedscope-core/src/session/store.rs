use super::clock::{Clock, SystemClock};
use super::message::{ChatSession, MessageRole, NewMessage};
use super::SessionError;
use crate::config::SessionSettings;
use crate::context::SYSTEM_PROMPT;
use crate::error::FeedError;
use crate::llm::{Message, ToolCall};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Registry {
    sessions: HashMap<String, ChatSession>,
    /// Invocation ids per session whose tools are still running.
    in_flight: HashMap<String, HashSet<String>>,
}

/// In-memory registry of chat sessions with lazy expiry.
///
/// Every operation takes the store lock once, so an append is never observed
/// half-done. Sessions idle for longer than the timeout are evicted the next
/// time anything looks them up, or by [`SessionStore::purge_expired`].
pub struct SessionStore {
    registry: Mutex<Registry>,
    timeout: Duration,
    system_prompt: String,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            timeout,
            system_prompt: SYSTEM_PROMPT.to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_settings(settings: &SessionSettings) -> Result<Self, FeedError> {
        let timeout = i64::try_from(settings.timeout_hours)
            .ok()
            .and_then(Duration::try_hours)
            .ok_or_else(|| {
                FeedError::Config(format!(
                    "sessions.timeout_hours is out of range: {}",
                    settings.timeout_hours
                ))
            })?;
        Ok(Self::new(timeout))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, session: &ChatSession, now: DateTime<Utc>) -> bool {
        now - session.last_activity > self.timeout
    }

    /// Live session by id, evicting it first if it has expired.
    fn live<'a>(
        &self,
        sessions: &'a mut HashMap<String, ChatSession>,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a mut ChatSession> {
        let expired = self.is_expired(sessions.get(session_id)?, now);
        if expired {
            sessions.remove(session_id);
            tracing::info!(session_id, "session expired");
            return None;
        }
        sessions.get_mut(session_id)
    }

    pub fn create(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = ChatSession::new(session_id.clone(), self.clock.now());
        self.lock().sessions.insert(session_id.clone(), session);
        tracing::debug!(session_id = %session_id, "session created");
        session_id
    }

    /// Snapshot of a live session.
    pub fn get(&self, session_id: &str) -> Option<ChatSession> {
        let now = self.clock.now();
        let mut registry = self.lock();
        self.live(&mut registry.sessions, session_id, now).map(|s| s.clone())
    }

    pub fn exists(&self, session_id: &str) -> bool {
        let now = self.clock.now();
        let mut registry = self.lock();
        self.live(&mut registry.sessions, session_id, now).is_some()
    }

    pub fn append(&self, session_id: &str, message: NewMessage) -> Result<(), SessionError> {
        let now = self.clock.now();
        let mut registry = self.lock();
        let session = self
            .live(&mut registry.sessions, session_id, now)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if message.role == MessageRole::Tool {
            let tool_call_id = message
                .tool_call_id
                .as_deref()
                .ok_or_else(|| SessionError::MissingToolCallId(session_id.to_string()))?;
            if !session.has_invocation(tool_call_id) {
                return Err(SessionError::OrphanToolResult {
                    session_id: session_id.to_string(),
                    tool_call_id: tool_call_id.to_string(),
                });
            }
            if session.has_result(tool_call_id) {
                return Err(SessionError::DuplicateToolResult {
                    session_id: session_id.to_string(),
                    tool_call_id: tool_call_id.to_string(),
                });
            }
        }

        session.messages.push(message.stamp(now));
        session.last_activity = now;
        Ok(())
    }

    /// Append an assistant message carrying invocations and mark them as
    /// running until the returned guard is dropped.
    ///
    /// Running invocations are left alone by
    /// [`SessionStore::close_interrupted`], so a concurrent turn on the same
    /// session cannot answer them with a false failure.
    pub fn begin_invocations(
        &self,
        session_id: &str,
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Result<InFlight<'_>, SessionError> {
        let ids: Vec<String> = tool_calls.iter().map(|call| call.id.clone()).collect();
        let now = self.clock.now();
        let mut registry = self.lock();
        let session = self
            .live(&mut registry.sessions, session_id, now)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        session
            .messages
            .push(NewMessage::assistant_with_tools(content, tool_calls).stamp(now));
        session.last_activity = now;

        registry
            .in_flight
            .entry(session_id.to_string())
            .or_default()
            .extend(ids.iter().cloned());

        Ok(InFlight {
            store: self,
            session_id: session_id.to_string(),
            ids,
        })
    }

    /// Answer every invocation that has no result and is not running with a
    /// tool message carrying `content`. Returns the invocations closed.
    pub fn close_interrupted(
        &self,
        session_id: &str,
        content: &str,
    ) -> Result<Vec<ToolCall>, SessionError> {
        let now = self.clock.now();
        let mut registry = self.lock();
        let Registry {
            sessions,
            in_flight,
        } = &mut *registry;
        let session = self
            .live(sessions, session_id, now)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let running = in_flight.get(session_id);
        let interrupted: Vec<ToolCall> = session
            .pending_invocations()
            .into_iter()
            .filter(|call| !running.is_some_and(|ids| ids.contains(&call.id)))
            .collect();

        for call in &interrupted {
            session
                .messages
                .push(NewMessage::tool_result(&call.id, content).stamp(now));
        }
        if !interrupted.is_empty() {
            session.last_activity = now;
        }
        Ok(interrupted)
    }

    fn release(&self, session_id: &str, ids: &[String]) {
        let mut registry = self.lock();
        if let Some(running) = registry.in_flight.get_mut(session_id) {
            for id in ids {
                running.remove(id);
            }
            if running.is_empty() {
                registry.in_flight.remove(session_id);
            }
        }
    }

    /// Model-facing history. Invocations that never got a result are kept as
    /// they were recorded; see [`SessionStore::pending_invocations`].
    pub fn history(&self, session_id: &str, include_system: bool) -> Option<Vec<Message>> {
        let session = self.get(session_id)?;
        let pending = session.pending_invocations();
        if !pending.is_empty() {
            tracing::warn!(
                session_id,
                pending = pending.len(),
                "history contains tool invocations without results"
            );
        }
        let system = include_system.then_some(self.system_prompt.as_str());
        Some(session.to_model_messages(system))
    }

    pub fn pending_invocations(&self, session_id: &str) -> Option<Vec<ToolCall>> {
        self.get(session_id).map(|s| s.pending_invocations())
    }

    /// Drop all messages but keep the session alive.
    pub fn clear(&self, session_id: &str) -> Result<(), SessionError> {
        let now = self.clock.now();
        let mut registry = self.lock();
        let session = self
            .live(&mut registry.sessions, session_id, now)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        session.messages.clear();
        session.last_activity = now;
        Ok(())
    }

    pub fn delete(&self, session_id: &str) -> bool {
        let mut registry = self.lock();
        registry.in_flight.remove(session_id);
        registry.sessions.remove(session_id).is_some()
    }

    /// Evict every expired session, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut registry = self.lock();
        let before = registry.sessions.len();
        registry
            .sessions
            .retain(|_, session| !self.is_expired(session, now));
        let removed = before - registry.sessions.len();
        if removed > 0 {
            tracing::info!(
                removed,
                remaining = registry.sessions.len(),
                "purged expired sessions"
            );
        }
        removed
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.purge_expired();
        self.lock().sessions.len()
    }

    /// Sessions currently held, including expired ones not yet swept.
    pub fn resident(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn clear_all(&self) {
        let mut registry = self.lock();
        registry.sessions.clear();
        registry.in_flight.clear();
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}

/// Invocations of one turn that are still executing. Dropping the guard,
/// including when the turn is cancelled, releases them.
pub struct InFlight<'a> {
    store: &'a SessionStore,
    session_id: String,
    ids: Vec<String>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.store.release(&self.session_id, &self.ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_rejects_out_of_range_timeout() {
        let settings = SessionSettings {
            timeout_hours: u64::MAX / 2,
            ..SessionSettings::default()
        };
        assert!(matches!(
            SessionStore::from_settings(&settings),
            Err(FeedError::Config(_))
        ));
    }

    #[test]
    fn test_from_settings_uses_configured_hours() {
        let settings = SessionSettings {
            timeout_hours: 2,
            ..SessionSettings::default()
        };
        let store = SessionStore::from_settings(&settings).unwrap();
        assert_eq!(store.timeout(), Duration::hours(2));
    }
}
