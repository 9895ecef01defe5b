//! Router setup, server startup and the session reaper.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use feedscope_core::config::ServerSettings;
use feedscope_core::{FeedError, SessionStore};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/session/new", post(handlers::new_session))
        .route("/session/{id}", delete(handlers::delete_session))
        .route("/session/{id}/history", get(handlers::session_history))
        .route("/session/{id}/clear", delete(handlers::clear_session))
        .route("/ask", post(handlers::ask))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Periodically evict idle sessions. The first sweep happens one interval
/// after start.
pub fn spawn_session_reaper(sessions: Arc<SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = sessions.purge_expired();
            tracing::debug!(removed, "session sweep");
        }
    })
}

/// Bind and serve until Ctrl-C.
pub async fn start_server(settings: &ServerSettings, state: AppState) -> Result<(), FeedError> {
    let addr = settings.bind_addr();
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
