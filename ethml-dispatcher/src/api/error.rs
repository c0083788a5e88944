//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ethml_core::error::LedgerError;

use crate::repository::StoreError;
use crate::service::task_service::TaskError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    BadGateway(String),
    StoreError(StoreError),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadGateway(msg) => {
                tracing::warn!("Ledger error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            ApiError::StoreError(err) => {
                tracing::error!("Store error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::StoreError(err)
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound(id) => ApiError::NotFound(format!("Task {} not found", id)),
            TaskError::AlreadyExists(id) => {
                ApiError::Conflict(format!("Task {} already exists", id))
            }
            TaskError::ValidationError(msg) => ApiError::BadRequest(msg),
            TaskError::Ledger(LedgerError::Rejected(msg) | LedgerError::Refused(msg)) => {
                ApiError::BadRequest(msg)
            }
            TaskError::Ledger(err @ LedgerError::Transient(_)) => {
                ApiError::BadGateway(err.to_string())
            }
            TaskError::Store(err) => ApiError::StoreError(err),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: TaskError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_task_errors_map_to_status_codes() {
        assert_eq!(status_of(TaskError::NotFound(1)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(TaskError::AlreadyExists(1)), StatusCode::CONFLICT);
        assert_eq!(
            status_of(TaskError::ValidationError("bad tip".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TaskError::Ledger(LedgerError::Transient("503".to_string()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(TaskError::Ledger(LedgerError::Refused("tip too low".to_string()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TaskError::Ledger(LedgerError::Rejected("exists".to_string()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TaskError::Store(StoreError::TaskNotFound(1))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
