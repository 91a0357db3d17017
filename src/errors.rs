use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error raised by catalog mutations (create/update/delete).
///
/// Every variant carries a stable machine-readable code that is recorded on
/// the job and surfaced to polling clients as `{code, message}`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PublishError {
    /// A required catalog file is absent. Fatal, not retried.
    #[error("missing catalog file: {0}")]
    CatalogMissing(String),

    /// An index or taxonomy document has the wrong shape, or an existing
    /// record is unusable (no slug, unresolvable cover image).
    #[error("invalid catalog state: {0}")]
    CatalogInvalid(String),

    /// The submitted draft failed validation. Caller-fixable.
    #[error("invalid draft: {0}")]
    InvalidDraft(String),

    /// Unknown product id on update.
    #[error("not found: {0}")]
    NotFound(String),

    /// Filesystem error while deleting a product or its assets.
    #[error("delete failed: {0}")]
    DeleteFailed(String),

    /// Anything unclassified.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PublishError {
    /// Stable error code recorded on the job state.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CatalogMissing(_) => "catalog_missing",
            Self::CatalogInvalid(_) => "catalog_invalid",
            Self::InvalidDraft(_) => "invalid_draft",
            Self::NotFound(_) => "not_found",
            Self::DeleteFailed(_) => "delete_failed",
            Self::Internal(_) => "internal",
        }
    }

    /// Human-readable message without the variant prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::CatalogMissing(m)
            | Self::CatalogInvalid(m)
            | Self::InvalidDraft(m)
            | Self::NotFound(m)
            | Self::DeleteFailed(m)
            | Self::Internal(m) => m,
        }
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Internal(format!("JSON serialization failed: {}", err))
    }
}

impl From<std::io::Error> for PublishError {
    fn from(err: std::io::Error) -> Self {
        PublishError::Internal(format!("I/O error: {}", err))
    }
}

/// Standard JSON error body returned by HTTP endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Error type for HTTP responses from the transport layer.
///
/// Mutation failures never surface here; they are recorded on the job and
/// read back via the job-status endpoints. This covers request-level
/// failures only.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    InternalServerError,
}

impl ApiError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}
