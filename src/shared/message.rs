/**
 * Message Data Structures
 *
 * This module defines the committed chat message record and the types it is
 * built from. The record is what the ingestion pipeline hands back to the
 * submitter after a successful commit, what the history endpoint pages over,
 * and what gets broadcast to a group's subscribers.
 *
 * Records are serialized as camelCase JSON so the connection layer can forward
 * them to clients unchanged (`tokensMined`, `contentQuality`, ...).
 */
use crate::shared::error::SharedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum accepted message body length, in characters
pub const MAX_MESSAGE_LENGTH: usize = 10_000;

/// Sentiment label attached to every analysed message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = SharedError;

    /// Parse a sentiment label, ignoring case and surrounding whitespace
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            other => Err(SharedError::invalid(
                "sentiment",
                format!("unknown sentiment '{}'", other),
            )),
        }
    }
}

/// Sender reference with the address resolved
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SenderRef {
    pub id: Uuid,
    pub address: String,
}

/// A committed chat message
///
/// Created only by the stats commit transaction. Once committed,
/// `tokens_mined` and `content_quality` never change; the only later
/// mutation is the soft-delete flag.
///
/// # Fields
/// * `message` - The message body
/// * `sender` - Sender id and resolved address
/// * `group_id` - Group the message was posted to
/// * `ai_score` / `content_quality` - Quality score (0-100) from analysis
/// * `sentiment` / `topics` / `response` - Remaining analysis output
/// * `tokens_mined` - Token reward credited to the sender
/// * `spam_score` - Spam likelihood reported by analysis (always at or below the threshold)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: Uuid,
    pub message: String,
    pub sender: SenderRef,
    pub group_id: Uuid,
    pub ai_score: f64,
    pub sentiment: Sentiment,
    pub topics: Vec<String>,
    pub content_quality: f64,
    pub tokens_mined: f64,
    pub spam_score: f64,
    pub is_ai_generated: bool,
    pub engagement_score: f64,
    pub is_deleted: bool,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

/// Validate a raw message body before it enters the pipeline
///
/// The body must contain something other than whitespace and must not
/// exceed [`MAX_MESSAGE_LENGTH`] characters.
pub fn validate_text(text: &str) -> Result<(), SharedError> {
    if text.trim().is_empty() {
        return Err(SharedError::EmptyMessage);
    }
    let length = text.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(SharedError::MessageTooLong {
            length,
            max: MAX_MESSAGE_LENGTH,
        });
    }
    Ok(())
}
