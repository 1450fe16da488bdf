//! Event search, session listing, import and clear endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::database::{EventOrder, StoredEvent};
use crate::error::UsageError;
use crate::ingest::{collect_log_files, import_sources, ImportReport};
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::store::{load_sessions, EventStore, Session};

#[derive(Deserialize)]
pub struct SearchQuery {
    /// Substring matched against kind, timestamp, computer and user
    pub q: Option<String>,
    /// Limit results (default: 1000)
    pub limit: Option<usize>,
    /// date, user or computer (default: date)
    #[serde(default)]
    pub sort: EventOrder,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub events: Vec<StoredEvent>,
    pub total: usize,
}

/// GET /api/events?q=&sort=date|user|computer - Search stored events.
pub async fn search_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(1000).min(10_000);
    let mut events = state
        .db
        .search_events(query.q.as_deref().unwrap_or(""), query.sort)?;
    let total = events.len();
    events.truncate(limit);

    Ok(Json(EventsResponse { events, total }))
}

#[derive(Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<Session>,
    pub total_hours: f64,
}

/// GET /api/sessions - Paired sessions, oldest first.
pub async fn get_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let sessions = load_sessions(state.db.as_ref(), &state.rules())?;
    let total_hours = crate::store::round2(sessions.iter().map(Session::duration_hours).sum());

    Ok(Json(SessionsResponse {
        sessions,
        total_hours,
    }))
}

#[derive(Deserialize)]
pub struct ImportRequest {
    /// Log files or directories of `.log` files
    pub paths: Vec<PathBuf>,
}

/// POST /api/import - Import log files from the server's filesystem.
pub async fn import_logs(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportReport>, ApiError> {
    if request.paths.is_empty() {
        return Err(ApiError::BadRequest("no paths given".to_string()));
    }

    let db = Arc::clone(&state.db);
    let report = tokio::task::spawn_blocking(move || {
        let files = collect_log_files(&request.paths)?;
        Ok::<_, UsageError>(import_sources(db.as_ref(), &files))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("import task failed: {e}")))??;

    if !report.imported.is_empty() {
        state.broadcast_update("data_changed", &report);
    }

    Ok(Json(report))
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

/// POST /api/clear - Remove every event and imported source.
pub async fn clear_events(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClearResponse>, ApiError> {
    state.db.clear()?;
    state.broadcast_update("data_changed", &ClearResponse { cleared: true });

    Ok(Json(ClearResponse { cleared: true }))
}
