//! Failures reported back to the submitter of a message.

use crate::backend::store::StoreError;
use crate::shared::error::SharedError;
use thiserror::Error;
use uuid::Uuid;

/// Outcome of a submission that did not produce a committed message
///
/// A degraded analysis is not an error: the pipeline continues with the
/// fallback result.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The sender exceeded the per-window submission cap
    #[error("rate limit exceeded, slow down")]
    RateLimited,

    /// Spam likelihood above the configured threshold
    #[error("message rejected as spam (score {spam_score})")]
    SpamRejected { spam_score: f64 },

    /// Sender or group missing at commit time
    #[error("{entity} {id} not found")]
    ReferenceNotFound { entity: &'static str, id: Uuid },

    /// The transaction aborted; nothing was persisted
    #[error("commit failed: {0}")]
    CommitFailed(#[from] StoreError),

    /// The submission buffer reached its configured depth
    #[error("submission queue is full")]
    QueueFull,

    /// The drainer stopped before the submission was processed
    #[error("pipeline is shutting down")]
    ShuttingDown,

    /// The message body failed validation
    #[error(transparent)]
    InvalidMessage(#[from] SharedError),
}

impl PipelineError {
    pub fn sender_not_found(id: Uuid) -> Self {
        Self::ReferenceNotFound { entity: "sender", id }
    }

    pub fn group_not_found(id: Uuid) -> Self {
        Self::ReferenceNotFound { entity: "group", id }
    }
}
