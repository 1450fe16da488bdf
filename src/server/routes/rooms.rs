//! Computer and room lookup endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::store::{search_computers, search_rooms, RoomGroups};

#[derive(Deserialize)]
pub struct NameQuery {
    /// Case-insensitive substring; empty matches everything
    pub q: Option<String>,
}

/// GET /api/computers?q= - Known computers, upper-cased.
pub async fn get_computers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NameQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let computers = search_computers(state.db.as_ref(), query.q.as_deref().unwrap_or(""))?;
    Ok(Json(computers))
}

/// GET /api/rooms?q= - Rooms with their member computers.
pub async fn get_rooms(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NameQuery>,
) -> Result<Json<RoomGroups>, ApiError> {
    let rooms = search_rooms(state.db.as_ref(), query.q.as_deref().unwrap_or(""))?;
    Ok(Json(rooms))
}
