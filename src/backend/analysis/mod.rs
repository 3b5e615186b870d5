//! Content Analysis Module
//!
//! Every message is scored by an external content-quality oracle before it is
//! rewarded. The oracle has no schema guarantees and can be slow or down, so
//! the pipeline never talks to it directly: it goes through the
//! [`AnalysisGateway`], which caches by content and bounds every call with a
//! timeout. Failed calls and invalid replies degrade to a fixed fallback.
//!
//! # Module Structure
//!
//! ```text
//! analysis/
//! ├── mod.rs     - Module exports and error types
//! ├── oracle.rs  - AnalysisOracle trait, Gemini HTTP client, disabled oracle
//! ├── parse.rs   - Prompt construction, reply sanitizing and validation
//! └── gateway.rs - Cached, never-failing analyze()
//! ```

use thiserror::Error;

/// Oracle clients
pub mod oracle;

/// Prompt and reply handling
pub mod parse;

/// Cached analysis gateway
pub mod gateway;

pub use gateway::AnalysisGateway;
pub use oracle::{AnalysisOracle, DisabledOracle, GeminiOracle, OracleError};

/// Reasons an analysis attempt produced no usable result
///
/// These never reach the submitter: the gateway logs them and substitutes
/// the fallback analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("reply contains no JSON object")]
    NoJsonObject,

    #[error("reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reply is missing field '{0}'")]
    MissingField(&'static str),

    #[error("reply field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl AnalysisError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
