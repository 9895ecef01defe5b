use chrono::{Duration, TimeZone, Utc};
use feedscope_core::llm::{Role, ToolCall};
use feedscope_core::session::{ManualClock, NewMessage, SessionError, SessionStore};
use std::sync::Arc;

fn store_with_clock(timeout_hours: i64) -> (SessionStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
    let store = SessionStore::new(Duration::hours(timeout_hours))
        .with_system_prompt("You are a test assistant.")
        .with_clock(clock.clone());
    (store, clock)
}

#[test]
fn test_create_gives_unique_empty_sessions() {
    let store = SessionStore::default();
    let a = store.create();
    let b = store.create();

    assert_ne!(a, b);
    assert!(store.get(&a).unwrap().is_empty());
    assert_eq!(store.count(), 2);
}

#[test]
fn test_history_preserves_order_and_system_preamble() {
    let (store, _) = store_with_clock(24);
    let id = store.create();
    store.append(&id, NewMessage::user("Which feeds are in PAC?")).unwrap();
    store.append(&id, NewMessage::assistant("Two of them.")).unwrap();

    let with_system = store.history(&id, true).unwrap();
    assert_eq!(with_system.len(), 3);
    assert_eq!(with_system[0].role, Role::System);
    assert_eq!(with_system[0].content, "You are a test assistant.");
    assert_eq!(with_system[1].role, Role::User);
    assert_eq!(with_system[2].role, Role::Assistant);

    let without = store.history(&id, false).unwrap();
    assert_eq!(without.len(), 2);
    assert_eq!(without[0].content, "Which feeds are in PAC?");
}

#[test]
fn test_tool_exchange_round_trips_through_history() {
    let (store, _) = store_with_clock(24);
    let id = store.create();
    let call = ToolCall::function("call_1", "feeds_search", r#"{"top_k":1}"#);

    store.append(&id, NewMessage::user("one feed please")).unwrap();
    store
        .append(&id, NewMessage::assistant_with_tools("", vec![call.clone()]))
        .unwrap();
    store
        .append(&id, NewMessage::tool_result("call_1", r#"{"count":1}"#))
        .unwrap();

    let history = store.history(&id, false).unwrap();
    assert_eq!(history[1].invocations(), &[call]);
    assert_eq!(history[2].role, Role::Tool);
    assert_eq!(history[2].tool_call_id.as_deref(), Some("call_1"));
    assert!(store.pending_invocations(&id).unwrap().is_empty());
}

#[test]
fn test_orphan_tool_result_rejected() {
    let (store, _) = store_with_clock(24);
    let id = store.create();

    let err = store
        .append(&id, NewMessage::tool_result("call_missing", "{}"))
        .unwrap_err();
    assert!(matches!(err, SessionError::OrphanToolResult { .. }));
    assert!(store.get(&id).unwrap().is_empty());
}

#[test]
fn test_pending_invocations_listed_until_answered() {
    let (store, _) = store_with_clock(24);
    let id = store.create();
    let calls = vec![
        ToolCall::function("a", "encoder_get_params", "{}"),
        ToolCall::function("b", "decoder_get_params", "{}"),
    ];
    store
        .append(&id, NewMessage::assistant_with_tools("", calls))
        .unwrap();
    store.append(&id, NewMessage::tool_result("a", "{}")).unwrap();

    let pending = store.pending_invocations(&id).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, "b");

    // history stays lossless even with a dangling invocation
    assert_eq!(store.history(&id, false).unwrap().len(), 2);
}

#[test]
fn test_second_result_for_same_invocation_rejected() {
    let (store, _) = store_with_clock(24);
    let id = store.create();
    store
        .append(
            &id,
            NewMessage::assistant_with_tools("", vec![ToolCall::function("a", "echo", "{}")]),
        )
        .unwrap();
    store.append(&id, NewMessage::tool_result("a", r#"{"ok":true}"#)).unwrap();

    let err = store
        .append(&id, NewMessage::tool_result("a", r#"{"ok":false}"#))
        .unwrap_err();
    assert!(matches!(err, SessionError::DuplicateToolResult { ref tool_call_id, .. } if tool_call_id == "a"));
    assert_eq!(store.get(&id).unwrap().len(), 2);
}

#[test]
fn test_close_interrupted_skips_running_invocations() {
    let (store, _) = store_with_clock(24);
    let id = store.create();
    store
        .append(
            &id,
            NewMessage::assistant_with_tools("", vec![ToolCall::function("stale", "echo", "{}")]),
        )
        .unwrap();

    let running = store
        .begin_invocations(&id, "", vec![ToolCall::function("live", "echo", "{}")])
        .unwrap();

    let closed = store.close_interrupted(&id, r#"{"error":"interrupted"}"#).unwrap();
    let closed: Vec<&str> = closed.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(closed, vec!["stale"]);

    // the running turn can still record its own result
    store.append(&id, NewMessage::tool_result("live", r#"{"ok":true}"#)).unwrap();
    drop(running);
    assert!(store.pending_invocations(&id).unwrap().is_empty());
    assert!(store.close_interrupted(&id, "{}").unwrap().is_empty());
}

#[test]
fn test_dropped_guard_makes_invocations_closable() {
    let (store, _) = store_with_clock(24);
    let id = store.create();

    let running = store
        .begin_invocations(&id, "", vec![ToolCall::function("cut", "echo", "{}")])
        .unwrap();
    assert!(store.close_interrupted(&id, "{}").unwrap().is_empty());
    drop(running);

    let closed = store.close_interrupted(&id, r#"{"error":"interrupted"}"#).unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].id, "cut");
    let session = store.get(&id).unwrap();
    assert_eq!(session.messages[1].tool_call_id.as_deref(), Some("cut"));
}

#[test]
fn test_unknown_session_operations() {
    let store = SessionStore::default();

    assert!(store.get("nope").is_none());
    assert!(store.history("nope", true).is_none());
    assert!(!store.delete("nope"));
    assert!(matches!(
        store.append("nope", NewMessage::user("hi")),
        Err(SessionError::NotFound(_))
    ));
    assert!(matches!(store.clear("nope"), Err(SessionError::NotFound(_))));
}

#[test]
fn test_clear_keeps_session_delete_removes_it() {
    let (store, _) = store_with_clock(24);
    let id = store.create();
    store.append(&id, NewMessage::user("hello")).unwrap();

    store.clear(&id).unwrap();
    assert!(store.exists(&id));
    assert!(store.history(&id, false).unwrap().is_empty());

    assert!(store.delete(&id));
    assert!(!store.exists(&id));
}

#[test]
fn test_idle_session_expires_lazily() {
    let (store, clock) = store_with_clock(1);
    let id = store.create();

    clock.advance(Duration::minutes(59));
    assert!(store.exists(&id));

    // the lookup above refreshed nothing; activity comes only from writes
    store.append(&id, NewMessage::user("still here")).unwrap();
    clock.advance(Duration::minutes(60));
    assert!(store.exists(&id));

    clock.advance(Duration::minutes(1));
    assert!(store.get(&id).is_none());
    assert!(matches!(
        store.append(&id, NewMessage::user("too late")),
        Err(SessionError::NotFound(_))
    ));
}

#[test]
fn test_purge_expired_sweeps_only_idle_sessions() {
    let (store, clock) = store_with_clock(2);
    let stale = store.create();
    clock.advance(Duration::hours(1));
    let fresh = store.create();
    clock.advance(Duration::minutes(61));

    assert_eq!(store.purge_expired(), 1);
    assert!(!store.exists(&stale));
    assert!(store.exists(&fresh));
    assert_eq!(store.count(), 1);
}

#[test]
fn test_concurrent_appends_are_all_recorded() {
    let store = Arc::new(SessionStore::default());
    let id = store.create();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = store.clone();
            let id = id.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    store
                        .append(&id, NewMessage::user(format!("{t}-{i}")))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.get(&id).unwrap().len(), 200);
}
