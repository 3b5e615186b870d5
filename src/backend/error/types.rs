/**
 * Backend Error Types
 *
 * Errors returned by HTTP handlers. Each maps to a status code and is
 * rendered as JSON by the `IntoResponse` implementation in `conversion`.
 *
 * # Status Mapping
 *
 * | Error | Status |
 * |---|---|
 * | `RateLimited` | 429 |
 * | `SpamRejected` | 422 |
 * | `ReferenceNotFound`, `NotFound` | 404 |
 * | `QueueFull`, `ShuttingDown` | 503 |
 * | `CommitFailed`, `Store` | 500 |
 * | validation, bad request | 400 |
 */
use crate::backend::chat::PipelineError;
use crate::backend::store::StoreError;
use crate::shared::SharedError;
use axum::http::StatusCode;
use thiserror::Error;

/// Backend-specific error types
#[derive(Debug, Error)]
pub enum BackendError {
    /// Submission failed in the pipeline
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Store failure outside the pipeline (history reads, deletes)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid request input
    #[error(transparent)]
    SharedError(#[from] SharedError),

    /// Requested resource does not exist
    #[error("{0} not found")]
    NotFound(String),
}

impl BackendError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Pipeline(err) => match err {
                PipelineError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                PipelineError::SpamRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::ReferenceNotFound { .. } => StatusCode::NOT_FOUND,
                PipelineError::QueueFull | PipelineError::ShuttingDown => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                PipelineError::CommitFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
                PipelineError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            },
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SharedError(err) if err.is_input_error() => StatusCode::BAD_REQUEST,
            Self::SharedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Message shown to the client
    ///
    /// Server-side failures are reported generically; the details go to the log.
    pub fn message(&self) -> String {
        match self {
            Self::Pipeline(PipelineError::CommitFailed(_)) | Self::Store(_) => {
                "internal storage error".to_string()
            }
            other => other.to_string(),
        }
    }
}
