//! Configuration endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::config::{EngineConfig, LIMIT_CHOICES};
use crate::server::error::ApiError;
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub settings: Vec<ConfigSetting>,
    /// Values in effect since startup
    pub active: EngineConfig,
    pub limit_choices: [Option<usize>; 4],
}

#[derive(Debug, Serialize)]
pub struct ConfigSetting {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

/// GET /api/config - Get all configuration settings
pub async fn get_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let settings = state
        .db
        .get_all_config()?
        .into_iter()
        .map(|(key, value, description)| ConfigSetting {
            key,
            value,
            description,
        })
        .collect();

    Ok(Json(ConfigResponse {
        settings,
        active: state.config,
        limit_choices: LIMIT_CHOICES,
    }))
}
