//! # Web API Error Types
//!
//! HTTP-facing error taxonomy and its status-code mapping. Engine errors
//! convert via `From<WorkflowError>`: stale-state transitions surface as 409,
//! resolver denials as 403, missing records as 404.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::error::WorkflowError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Access denied")]
    Forbidden,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Stale state: {message}")]
    Conflict { message: String },

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_code, message) = match &self {
            ApiError::NotFound { resource } => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Access denied".to_string(),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            ApiError::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message.clone())
            }
            ApiError::Conflict { message } => (StatusCode::CONFLICT, "CONFLICT", message.clone()),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        };

        let error_response = json!({
            "error": {
                "code": error_code,
                "message": message
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(message) => ApiError::BadRequest { message },
            WorkflowError::NotFound { entity, id } => ApiError::NotFound {
                resource: format!("{entity} {id}"),
            },
            WorkflowError::Forbidden { .. } => ApiError::Forbidden,
            WorkflowError::InvalidState {
                step_id,
                current,
                requested,
            } => ApiError::Conflict {
                message: format!("step {step_id} is {current}; cannot apply {requested}"),
            },
            WorkflowError::Conflict { .. }
            | WorkflowError::Configuration(_)
            | WorkflowError::Internal(_)
            | WorkflowError::Storage(_)
            | WorkflowError::Serialization(_)
            | WorkflowError::Database(_) => ApiError::Internal,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found("record"),
            _ => ApiError::Internal,
        }
    }
}

/// Result type alias for web API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_mapping() {
        let api: ApiError = WorkflowError::Forbidden { step_id: 1 }.into();
        assert!(matches!(api, ApiError::Forbidden));

        let api: ApiError = WorkflowError::not_found("workflow", 9).into();
        assert!(matches!(api, ApiError::NotFound { .. }));

        let api: ApiError = WorkflowError::InvalidState {
            step_id: 1,
            current: "completed".to_string(),
            requested: "rejected".to_string(),
        }
        .into();
        assert!(matches!(api, ApiError::Conflict { .. }));

        let api: ApiError = WorkflowError::validation("bad steps").into();
        assert!(matches!(api, ApiError::BadRequest { .. }));
    }
}
