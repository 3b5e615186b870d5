//! Shared Error Types
//!
//! Errors raised by the platform-agnostic types in `shared`: a message body
//! that cannot enter the pipeline, an unknown sentiment label, or a record
//! that fails to encode.
//!
//! # Usage
//!
//! ```rust
//! use chatmint::shared::error::SharedError;
//! use chatmint::shared::message::validate_text;
//!
//! assert_eq!(validate_text("   "), Err(SharedError::EmptyMessage));
//! ```
use thiserror::Error;

/// Errors raised by shared types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// Body is empty or whitespace only
    #[error("message text cannot be empty")]
    EmptyMessage,

    /// Body exceeds the accepted length
    #[error("message text is too long ({length} chars, max {max})")]
    MessageTooLong { length: usize, max: usize },

    /// A labelled field holds an unknown value
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("failed to encode record: {0}")]
    Encoding(String),
}

impl SharedError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by caller input
    pub fn is_input_error(&self) -> bool {
        !matches!(self, Self::Encoding(_))
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}
