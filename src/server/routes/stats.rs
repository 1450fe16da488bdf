//! Ranked aggregate endpoints.
//!
//! All clients share one [`RankedView`](crate::store::RankedView): the
//! invert and limit endpoints act on whichever aggregate was served last.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::store::{AggregateKind, AggregateRequest, InvertOutcome, RankedAggregate};

/// GET /api/aggregates/:kind - Ranked aggregate with the current view settings.
pub async fn get_aggregate(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<RankedAggregate>, ApiError> {
    let kind = kind.parse::<AggregateKind>().map_err(ApiError::BadRequest)?;
    let request = AggregateRequest::new(kind, state.rules());

    let ranked = state.view()?.show(state.db.as_ref(), request)?;
    Ok(Json(ranked))
}

#[derive(Serialize)]
pub struct ViewResponse {
    pub descending: bool,
    pub limit: Option<usize>,
    pub last: Option<AggregateKind>,
}

/// GET /api/view - Current sort order, cap and last aggregate.
pub async fn get_view(State(state): State<Arc<AppState>>) -> Result<Json<ViewResponse>, ApiError> {
    let view = state.view()?;
    Ok(Json(ViewResponse {
        descending: view.descending(),
        limit: view.limit().map(NonZeroUsize::get),
        last: view.last_request().map(|r| r.kind),
    }))
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvertResponse {
    NothingToInvert { message: &'static str },
    Inverted { aggregate: RankedAggregate },
}

/// POST /api/view/invert - Flip the sort order of the last aggregate.
pub async fn invert_view(
    State(state): State<Arc<AppState>>,
) -> Result<Json<InvertResponse>, ApiError> {
    let outcome = state.view()?.invert(state.db.as_ref())?;

    Ok(Json(match outcome {
        InvertOutcome::NothingToInvert => InvertResponse::NothingToInvert {
            message: "show a ranked aggregate before inverting its order",
        },
        InvertOutcome::Redisplayed(aggregate) => InvertResponse::Inverted { aggregate },
    }))
}

#[derive(Deserialize)]
pub struct LimitRequest {
    /// Positive row count, or null for all rows
    pub limit: Option<usize>,
}

/// POST /api/view/limit - Change the row cap and redisplay the last aggregate.
pub async fn set_view_limit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LimitRequest>,
) -> Result<Json<Option<RankedAggregate>>, ApiError> {
    let limit = match request.limit {
        Some(n) => Some(
            NonZeroUsize::new(n)
                .ok_or_else(|| ApiError::BadRequest("limit must be positive".to_string()))?,
        ),
        None => None,
    };

    let redisplayed = state.view()?.set_limit(state.db.as_ref(), limit)?;
    Ok(Json(redisplayed))
}
