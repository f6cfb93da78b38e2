//! Error types for moodpost-acquire
//!
//! Two layers:
//! - [`AcquireError`]: the acquisition taxonomy. `SourceUnavailable` and
//!   `DownloadFailed` are recoverable and are turned into "try next" where
//!   they occur; `InsufficientContent` and `ResourceFatal` end an acquisition.
//! - [`ApiError`]: what the HTTP surface reports.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Acquisition error taxonomy
#[derive(Debug, Error)]
pub enum AcquireError {
    /// A provider could not be reached or returned something unusable
    #[error("Source {provider} unavailable: {reason}")]
    SourceUnavailable { provider: String, reason: String },

    /// A binary asset could not be retrieved
    #[error("Download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// All tiers and the static fallback are exhausted
    #[error("Insufficient content: {0}")]
    InsufficientContent(String),

    /// Local resources (temp directory, files) cannot be managed
    #[error("Resource failure: {0}")]
    ResourceFatal(String),
}

impl AcquireError {
    pub fn source_unavailable(provider: impl Into<String>, reason: impl ToString) -> Self {
        AcquireError::SourceUnavailable {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    pub fn download_failed(url: impl Into<String>, reason: impl ToString) -> Self {
        AcquireError::DownloadFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the pipeline moves on to the next provider/candidate
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AcquireError::SourceUnavailable { .. } | AcquireError::DownloadFailed { .. }
        )
    }
}

/// Result type for acquisition operations
pub type AcquireResult<T> = Result<T, AcquireError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Acquisition failure
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    /// moodpost-common error
    #[error("Common error: {0}")]
    Common(#[from] moodpost_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Acquire(AcquireError::InsufficientContent(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "INSUFFICIENT_CONTENT")
            }
            ApiError::Acquire(AcquireError::ResourceFatal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "RESOURCE_FATAL")
            }
            ApiError::Acquire(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ApiError::Common(moodpost_common::Error::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            ApiError::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR"),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
