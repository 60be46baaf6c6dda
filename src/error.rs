/// Unified error types for the befriends backend
use crate::validation::FieldError;
use async_graphql::ErrorExtensions;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the backend
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Missing or invalid viewer identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Referenced entity absent or not owned by the viewer
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate relationship or other uniqueness conflicts
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Domain rule violations (self-request, already liked, bad cursor)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Input schema violations with per-field details
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// HTTP-like status carried by the error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Internal(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) | AppError::Jwt(_) => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::BadRequest(_) | AppError::Validation(_) => "BAD_REQUEST",
            AppError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Internal(_)
            | AppError::Io(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Message safe to show to clients
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Internal(_)
            | AppError::Io(_) => "Internal server error".to_string(), // Don't leak details
            _ => self.to_string(),
        }
    }

    /// True when the store rejected a write because of a UNIQUE constraint
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        err.as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false)
    }
}

/// Error body format, one entry per error
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// Error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorBody>,
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let details = match &self {
            AppError::Validation(details) => Some(details.clone()),
            _ => None,
        };

        let body = Json(ErrorResponse {
            errors: vec![ErrorBody {
                message: self.public_message(),
                code: self.code().to_string(),
                details,
            }],
        });

        (self.status(), body).into_response()
    }
}

/// Convert AppError to a GraphQL error with `code`, `status` and `details` extensions
impl ErrorExtensions for AppError {
    fn extend(&self) -> async_graphql::Error {
        if self.status().is_server_error() {
            tracing::error!("Resolver failed: {}", self);
        }

        async_graphql::Error::new(self.public_message()).extend_with(|_, ext| {
            ext.set("code", self.code());
            ext.set("status", i32::from(self.status().as_u16()));
            if let AppError::Validation(details) = self {
                if let Ok(value) = serde_json::to_value(details)
                    .map_err(|e| e.to_string())
                    .and_then(|json| async_graphql::Value::from_json(json).map_err(|e| e.to_string()))
                {
                    ext.set("details", value);
                }
            }
        })
    }
}

/// Result type alias for backend operations
pub type AppResult<T> = Result<T, AppError>;
