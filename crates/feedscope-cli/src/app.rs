use anyhow::{Context, Result};
use feedscope_core::session::MessageRole;
use feedscope_core::context::SystemPromptBuilder;
use feedscope_core::store::DirectorySource;
use feedscope_core::{
    AgentEvent, AskResponse, Orchestrator, RecordStore, SessionStore, Settings, ToolRegistry,
};
use feedscope_server::{spawn_session_reaper, start_server, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::commands::{handle_command, CommandResult};

/// Load the record store from the configured data directory.
fn load_store(settings: &Settings) -> Result<Arc<RecordStore>> {
    let source = DirectorySource::from_settings(&settings.data);
    let store = RecordStore::from_source(&source)
        .with_context(|| format!("failed to load data from {}", source.dir().display()))?;
    let status = store.status();
    tracing::info!(
        dir = %source.dir().display(),
        feeds = status.feeds_loaded,
        "data loaded"
    );
    Ok(Arc::new(store))
}

/// Session store whose system prompt describes the loaded feed table.
fn session_store(settings: &Settings, store: &RecordStore) -> Result<SessionStore> {
    let feeds = store.feeds()?;
    let mut prompt = SystemPromptBuilder::new()
        .with_columns(feeds.column_names())
        .with_feed_count(feeds.len());
    if let Some(instructions) = &settings.llm.instructions {
        prompt = prompt.with_custom_instructions(instructions);
    }
    Ok(SessionStore::from_settings(&settings.sessions)?.with_system_prompt(prompt.build()))
}

fn turn_timeout(settings: &Settings) -> Duration {
    // two model calls plus tool time
    Duration::from_secs(settings.llm.request_timeout_secs.saturating_mul(2) + 30)
}

// ── serve ───────────────────────────────────────────────────────────────

pub async fn run_serve(settings: Settings) -> Result<()> {
    let store = load_store(&settings)?;
    let llm = settings.build_llm_client()?;
    let sessions = Arc::new(session_store(&settings, &store)?);

    let reaper = spawn_session_reaper(sessions.clone(), settings.sessions.sweep_interval());
    tracing::info!(
        timeout_hours = settings.sessions.timeout_hours,
        sweep_interval_secs = settings.sessions.sweep_interval_secs,
        "session reaper started"
    );
    let state = AppState::new(store, sessions, llm).with_turn_timeout(turn_timeout(&settings));

    let result = start_server(&settings.server, state).await;
    reaper.abort();
    tracing::info!("server stopped");
    result?;
    Ok(())
}

// ── ask ─────────────────────────────────────────────────────────────────

fn build_orchestrator(settings: &Settings) -> Result<Orchestrator> {
    let store = load_store(settings)?;
    let llm = settings.build_llm_client()?;
    let sessions = Arc::new(session_store(settings, &store)?);
    let tools = Arc::new(ToolRegistry::for_store(store));
    Ok(Orchestrator::new(llm, tools, sessions))
}

/// Answer one question and print the tool trace to stderr.
pub async fn run_single_question(settings: &Settings, question: &str) -> Result<()> {
    let orchestrator = build_orchestrator(settings)?;
    let response = ask_with_trace(&orchestrator, question, None).await?;
    println!("{}", response.answer);
    Ok(())
}

async fn ask_with_trace(
    orchestrator: &Orchestrator,
    question: &str,
    session_id: Option<&str>,
) -> Result<AskResponse> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AgentEvent>();

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                AgentEvent::ToolStart { name } => eprintln!("[tool: {name}]"),
                AgentEvent::ToolResult {
                    name,
                    success,
                    summary,
                } => {
                    let icon = if success { "ok" } else { "err" };
                    eprintln!("[{name}: {icon}] {summary}");
                }
                AgentEvent::Error(e) => eprintln!("Error: {e}"),
                _ => {}
            }
        }
    });

    let result = orchestrator
        .ask_with_events(question, session_id, event_tx)
        .await;
    let _ = printer.await;
    Ok(result?)
}

// ── chat ────────────────────────────────────────────────────────────────

pub async fn run_chat(settings: &Settings) -> Result<()> {
    let orchestrator = build_orchestrator(settings)?;
    let sessions = orchestrator.sessions().clone();
    let mut session_id = sessions.create();

    println!("feedscope chat ({}). Type /help for commands.", settings.llm.model);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match handle_command(line) {
            CommandResult::Quit => break,
            CommandResult::Message(msg) => println!("{msg}"),
            CommandResult::Clear => {
                sessions.clear(&session_id)?;
                println!("Session history cleared.");
            }
            CommandResult::NewSession => {
                sessions.delete(&session_id);
                session_id = sessions.create();
                tracing::debug!(session_id = %session_id, "chat session replaced");
                println!("Started session {session_id}.");
            }
            CommandResult::ShowHistory => print_history(&sessions, &session_id),
            CommandResult::ShowStatus => {
                let len = sessions.get(&session_id).map(|s| s.len()).unwrap_or(0);
                println!("session {session_id}: {len} messages");
                println!("tools: {}", orchestrator.tools().names().join(", "));
            }
            CommandResult::NotACommand => {
                if !sessions.exists(&session_id) {
                    tracing::info!(expired = %session_id, "chat session expired");
                    session_id = sessions.create();
                    eprintln!("(session expired, started a new one)");
                }
                match ask_with_trace(&orchestrator, line, Some(&session_id)).await {
                    Ok(response) => println!("{}\n", response.answer),
                    Err(e) => eprintln!("Error: {e:#}"),
                }
            }
        }
    }

    Ok(())
}

fn print_history(sessions: &SessionStore, session_id: &str) {
    let Some(session) = sessions.get(session_id) else {
        println!("Session not found.");
        return;
    };
    if session.is_empty() {
        println!("(no messages)");
        return;
    }
    for message in &session.messages {
        let time = message.timestamp.format("%H:%M:%S");
        match message.role {
            MessageRole::User => println!("[{time}] you: {}", message.content),
            MessageRole::Assistant => match &message.tool_calls {
                Some(calls) if !calls.is_empty() => {
                    let names: Vec<&str> = calls.iter().map(|c| c.function.name.as_str()).collect();
                    println!("[{time}] assistant called: {}", names.join(", "));
                }
                _ => println!("[{time}] assistant: {}", message.content),
            },
            MessageRole::Tool => {
                let preview: String = message.content.chars().take(120).collect();
                println!("[{time}] tool: {preview}");
            }
        }
    }
}

// ── check ───────────────────────────────────────────────────────────────

/// Report configuration, API key and data status. Fails if anything is missing.
pub fn run_check(settings: &Settings, config_path: &std::path::Path) -> Result<()> {
    let mut problems = 0;

    let config_state = if config_path.exists() { "found" } else { "not found, using defaults" };
    println!("config:   {} ({config_state})", config_path.display());
    println!("model:    {}", settings.llm.model);

    if settings.api_key().is_some() {
        println!("api key:  {} is set", settings.llm.api_key_env);
    } else {
        println!("api key:  {} is NOT set", settings.llm.api_key_env);
        problems += 1;
    }

    match load_store(settings) {
        Ok(store) => {
            let status = store.status();
            println!("data:     {}", settings.data.dir.display());
            println!("  feeds:           {}", status.feeds_loaded);
            println!("  encoder params:  {}", status.encoder_param_count);
            println!("  decoder params:  {}", status.decoder_param_count);
        }
        Err(e) => {
            println!("data:     {e:#}");
            problems += 1;
        }
    }

    if problems > 0 {
        anyhow::bail!("{problems} problem(s) found");
    }
    println!("All checks passed.");
    Ok(())
}
