//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::UsageError;

/// Errors returned by route handlers.
#[derive(Debug)]
pub enum ApiError {
    Usage(UsageError),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Usage(UsageError::EmptyDataset) | ApiError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Usage(UsageError::InvalidPeriod(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Usage(UsageError::Storage(_) | UsageError::Io { .. })
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Usage(e) => ErrorBody {
                error: e.kind(),
                message: e.to_string(),
            },
            ApiError::BadRequest(msg) => ErrorBody {
                error: "bad_request",
                message: msg.clone(),
            },
            ApiError::NotFound(msg) => ErrorBody {
                error: "not_found",
                message: msg.clone(),
            },
            ApiError::Internal(msg) => ErrorBody {
                error: "internal",
                message: msg.clone(),
            },
        }
    }
}

impl From<UsageError> for ApiError {
    fn from(e: UsageError) -> Self {
        ApiError::Usage(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(UsageError::EmptyDataset).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(UsageError::InvalidPeriod("year".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(UsageError::Storage("gone".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::BadRequest("limit".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_body_carries_kind() {
        let body = ApiError::from(UsageError::EmptyDataset).body();
        assert_eq!(body.error, "empty_dataset");
    }
}
