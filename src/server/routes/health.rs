//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::server::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub events: Option<i64>,
}

/// GET /health - Liveness plus the stored event count.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let events = match state.db.event_count() {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(?e, "Health check could not count events");
            None
        }
    };

    Json(HealthResponse {
        status: if events.is_some() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        events,
    })
}
