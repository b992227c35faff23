use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::backend::RemoteError;
use crate::listing::config::QueryError;
use crate::listing::loader::LoadError;
use crate::listing::mutation::MutationError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<LoadError> for AppError {
    fn from(e: LoadError) -> Self {
        match &e {
            LoadError::Remote {
                source: RemoteError::Unauthorized,
                ..
            } => AppError::Unauthorized,
            _ => AppError::Upstream(e.to_string()),
        }
    }
}

impl From<MutationError> for AppError {
    fn from(e: MutationError) -> Self {
        match &e {
            MutationError::Validation(v) => AppError::Validation(v.to_string()),
            MutationError::NotFound(_) => AppError::NotFound(e.to_string()),
            _ => match e.remote().and_then(RemoteError::status) {
                Some(401) => AppError::Unauthorized,
                Some(404) => AppError::NotFound(e.to_string()),
                _ => AppError::Upstream(e.to_string()),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Backend session expired; sign in again".to_string(),
            ),
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
