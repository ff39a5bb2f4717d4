//! Game Service error types.
//!
//! Every failure is classified into one of three kinds (see [`ErrorKind`]).
//! All errors render as the `{message, data: null, success: false}`
//! envelope. Infrastructure failures return a generic message to the client;
//! the underlying cause is logged server-side.

use crate::models::ApiResponse;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The referenced game does not exist. Nothing was mutated.
    NotFound,
    /// The request was malformed or not allowed.
    Validation,
    /// Store, cache, publisher or timeout failure. Not retried.
    Infrastructure,
}

/// Game Service error type.
///
/// Maps to HTTP status codes:
/// - NotFound, BadRequest: 400 Bad Request
/// - Database, Cache, Publish, Timeout, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl GameError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::NotFound(_) => ErrorKind::NotFound,
            GameError::BadRequest(_) => ErrorKind::Validation,
            GameError::Database(_)
            | GameError::Cache(_)
            | GameError::Publish(_)
            | GameError::Timeout(_)
            | GameError::Internal => ErrorKind::Infrastructure,
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound | ErrorKind::Validation => 400,
            ErrorKind::Infrastructure => 500,
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            GameError::Database(_) => "database",
            GameError::Cache(_) => "cache",
            GameError::Publish(_) => "publish",
            GameError::Timeout(_) => "timeout",
            GameError::NotFound(_) => "not_found",
            GameError::BadRequest(_) => "bad_request",
            GameError::Internal => "internal",
        }
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GameError::NotFound(resource) => (StatusCode::BAD_REQUEST, resource.clone()),
            GameError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            GameError::Database(err) => {
                tracing::error!(target: "game.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal database error occurred".to_string(),
                )
            }
            GameError::Cache(err) => {
                tracing::error!(target: "game.cache", error = %err, "Cache operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal cache error occurred".to_string(),
                )
            }
            GameError::Publish(err) => {
                tracing::error!(target: "game.publisher", error = %err, "Event publish failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to notify game subscribers".to_string(),
                )
            }
            GameError::Timeout(operation) => {
                tracing::error!(target: "game.timeout", operation = %operation, "Operation timed out");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal operation timed out".to_string(),
                )
            }
            GameError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
            ),
        };

        (status, Json(ApiResponse::<()>::failure(message))).into_response()
    }
}

/// Convert sqlx errors to GameError
impl From<sqlx::Error> for GameError {
    fn from(err: sqlx::Error) -> Self {
        GameError::Database(err.to_string())
    }
}

/// Convert redis errors to GameError
impl From<redis::RedisError> for GameError {
    fn from(err: redis::RedisError) -> Self {
        GameError::Cache(err.to_string())
    }
}

/// JSON body rejections are validation failures, surfaced verbatim.
impl From<JsonRejection> for GameError {
    fn from(rejection: JsonRejection) -> Self {
        GameError::BadRequest(rejection.body_text())
    }
}
