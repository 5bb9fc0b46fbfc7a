//! Application error taxonomy
//!
//! Every service returns [`AppError`]. Validation failures are user-correctable
//! and reported inline; store availability errors and partial cascades are
//! transient and left to the caller to retry.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::{EntityKind, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Collection name cannot be empty")]
    EmptyName,

    #[error("Collection name may only contain letters, digits and spaces")]
    InvalidCharacters,

    #[error("A collection named `{0}` already exists")]
    DuplicateName(String),

    #[error("Invalid movie: {0}")]
    InvalidMovie(String),

    #[error("Invalid or expired pagination cursor")]
    InvalidCursor,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing or invalid credentials")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{kind} `{id}` not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("Document store unavailable: {0}")]
    StoreUnavailable(String),

    /// Some collections still reference the movie; the movie was kept.
    #[error("Could not detach movie `{movie_id}` from {} collection(s)", .remaining.len())]
    PartialCascadeFailure {
        movie_id: String,
        remaining: Vec<String>,
    },

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

impl AppError {
    pub fn not_found(kind: EntityKind, id: &str) -> Self {
        AppError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code, used as the `code` field of error bodies
    pub fn code(&self) -> &'static str {
        match self {
            AppError::EmptyName => "empty_name",
            AppError::InvalidCharacters => "invalid_characters",
            AppError::DuplicateName(_) => "duplicate_name",
            AppError::InvalidMovie(_) => "invalid_movie",
            AppError::InvalidCursor => "invalid_cursor",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound { .. } => "not_found",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::PartialCascadeFailure { .. } => "partial_cascade_failure",
            AppError::Corrupt(_) => "corrupt",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::EmptyName
            | AppError::InvalidCharacters
            | AppError::InvalidMovie(_)
            | AppError::InvalidCursor
            | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateName(_) => StatusCode::CONFLICT,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::StoreUnavailable(_) | AppError::PartialCascadeFailure { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether retrying the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::StoreUnavailable(_) | AppError::PartialCascadeFailure { .. }
        )
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(message) => AppError::StoreUnavailable(message),
            StoreError::NotFound { kind, id } => AppError::NotFound { kind, id },
            StoreError::Malformed(message) => AppError::Corrupt(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        if let AppError::PartialCascadeFailure { remaining, .. } = &self {
            body["remaining"] = json!(remaining);
        }
        if self.is_retryable() {
            body["retryable"] = json!(true);
        }

        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }

        (status, Json(body)).into_response()
    }
}
