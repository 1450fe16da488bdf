//! Usage history endpoints (day/week/month buckets).
//!
//! Histories are not value-sorted, so serving one clears the ranked
//! view's last aggregate.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::store::{self, Aggregate, Period, TimeBuckets};
use std::collections::BTreeMap;

#[derive(Deserialize)]
pub struct PeriodQuery {
    /// day, week or month (default: day)
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub name: String,
    pub period: Period,
    /// Bucket key to hours, keys in chronological order
    pub hours: Aggregate,
}

/// GET /api/history/computers - Day, week and month usage of every computer.
pub async fn get_all_computer_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, TimeBuckets>>, ApiError> {
    state.view()?.forget_last();

    let buckets = store::time_by_bucket(state.db.as_ref(), &state.rules())?;
    Ok(Json(buckets))
}

/// GET /api/history/computers/:name?period=day|week|month
pub async fn get_computer_history(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let period = query.period.as_deref().unwrap_or("day").parse::<Period>()?;
    state.view()?.forget_last();

    let hours = store::computer_history(state.db.as_ref(), &state.rules(), &name, period)?;
    Ok(Json(HistoryResponse {
        name,
        period,
        hours,
    }))
}

/// GET /api/history/rooms/:name - Monthly usage of a room.
pub async fn get_room_history(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    state.view()?.forget_last();

    let Some(hours) = store::room_history(state.db.as_ref(), &state.rules(), &name)? else {
        return Err(ApiError::NotFound(format!("unknown room: {name}")));
    };
    Ok(Json(HistoryResponse {
        name,
        period: Period::Month,
        hours,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::routes::stats::{get_aggregate, invert_view, InvertResponse};
    use axum::http::StatusCode;

    fn period(p: &str) -> Query<PeriodQuery> {
        Query(PeriodQuery {
            period: Some(p.to_string()),
        })
    }

    #[tokio::test]
    async fn test_history_clears_last_aggregate() {
        let state = AppState::in_memory();
        state.seed_session("PC-A-01", "alice", 8, 10);

        get_aggregate(State(state.clone()), Path("time-per-room".to_string()))
            .await
            .unwrap();

        let Json(history) = get_computer_history(
            State(state.clone()),
            Path("pc-a-01".to_string()),
            period("month"),
        )
        .await
        .unwrap();
        assert_eq!(history.hours["2024-01"], 2.0);

        let Json(response) = invert_view(State(state)).await.unwrap();
        assert!(matches!(response, InvertResponse::NothingToInvert { .. }));
    }

    #[tokio::test]
    async fn test_room_history_also_clears_last_aggregate() {
        let state = AppState::in_memory();
        state.seed_session("PC-A-01", "alice", 8, 10);

        get_aggregate(State(state.clone()), Path("users-per-room".to_string()))
            .await
            .unwrap();
        let Json(history) = get_room_history(State(state.clone()), Path("PC-A".to_string()))
            .await
            .unwrap();
        assert_eq!(history.period, Period::Month);
        assert_eq!(history.hours["2024-01"], 2.0);

        let Json(response) = invert_view(State(state)).await.unwrap();
        assert!(matches!(response, InvertResponse::NothingToInvert { .. }));
    }

    #[tokio::test]
    async fn test_all_computer_history() {
        let state = AppState::in_memory();
        state.seed_session("PC1", "alice", 8, 10);
        state.seed_session("PC2", "bob", 8, 9);

        let Json(buckets) = get_all_computer_history(State(state)).await.unwrap();

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets["PC1"].day["2024-01-01"], 2.0);
        assert_eq!(buckets["PC2"].week["2024-01"], 1.0);
    }

    #[tokio::test]
    async fn test_history_errors() {
        let state = AppState::in_memory();
        state.seed_session("PC-A-01", "alice", 8, 10);

        let err = get_room_history(State(state.clone()), Path("LAB".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = get_computer_history(State(state), Path("PC-A-01".to_string()), period("year"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
