use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::time::Duration;
use tracing::error;

/// Service-wide error type. Everything that reaches a handler boundary ends up
/// here and renders as a JSON body with a matching status code; nothing is
/// fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed input caught before any database call.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Unique-constraint violation (Postgres 23505).
    #[error("{0}")]
    Duplicate(String),

    /// Foreign-key violation (Postgres 23503).
    #[error("{0}")]
    Referential(String),

    #[error("operation '{name}' timed out after {elapsed:?}")]
    Timeout { name: String, elapsed: Duration },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Duplicate(_) | ApiError::Referential(_) => StatusCode::CONFLICT,
            ApiError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => ApiError::NotFound("Record not found".into()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => {
                    ApiError::Duplicate("Duplicate entry found. Please refresh and try again.".into())
                }
                Some("23503") => ApiError::Referential(
                    "Cannot complete the operation because dependent records exist.".into(),
                ),
                _ => ApiError::Internal(e.into()),
            },
            _ => ApiError::Internal(e.into()),
        }
    }
}
