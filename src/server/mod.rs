//! HTTP server module for API and WebSocket endpoints.
//!
//! Exposes the usage queries as a JSON API for dashboards and pushes a
//! notification over WebSocket whenever the stored events change.

pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

use crate::config::EngineConfig;
use crate::database::Database;
use crate::server::routes::{config, events, health, history, rooms, stats};
use crate::server::state::AppState;
use crate::server::ws::ws_handler;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

/// Builds the router over a shared state.
pub fn router(state: Arc<AppState>) -> Router {
    // CORS layer for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Events API
        .route("/api/events", get(events::search_events))
        .route("/api/sessions", get(events::get_sessions))
        .route("/api/import", post(events::import_logs))
        .route("/api/clear", post(events::clear_events))
        // Computers and rooms
        .route("/api/computers", get(rooms::get_computers))
        .route("/api/rooms", get(rooms::get_rooms))
        // Ranked aggregates
        .route("/api/aggregates/:kind", get(stats::get_aggregate))
        .route("/api/view", get(stats::get_view))
        .route("/api/view/invert", post(stats::invert_view))
        .route("/api/view/limit", post(stats::set_view_limit))
        // Histories
        .route(
            "/api/history/computers",
            get(history::get_all_computer_history),
        )
        .route(
            "/api/history/computers/:name",
            get(history::get_computer_history),
        )
        .route("/api/history/rooms/:name", get(history::get_room_history))
        // Config API
        .route("/api/config", get(config::get_config))
        // WebSocket
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on a background thread.
///
/// Returns the thread handle; the thread ends if the server fails.
pub fn start_server(db: Arc<Database>, config: EngineConfig) -> std::thread::JoinHandle<()> {
    let (tx, _) = broadcast::channel::<String>(100);
    let state = Arc::new(AppState::new(db, config, tx));

    tracing::info!(port = config.server_port, "HTTP server starting");

    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!(?e, "Failed to create Tokio runtime");
                return;
            }
        };
        rt.block_on(async {
            if let Err(e) = run_server(state).await {
                tracing::error!(?e, "HTTP server stopped");
            }
        });
    })
}

/// Runs the axum server.
async fn run_server(state: Arc<AppState>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], state.config.server_port));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app).await
}
