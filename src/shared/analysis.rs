//! Content analysis result
//!
//! The validated output of one content-quality analysis. It is a pure function
//! of the message text, which is why the gateway caches it by content.

use crate::shared::message::Sentiment;
use serde::{Deserialize, Serialize};

/// Quality and spam assessment of a single message body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Substance/clarity rating, 0-100
    pub quality: f64,
    pub sentiment: Sentiment,
    pub topics: Vec<String>,
    /// Direct answer produced by the oracle, empty when none
    pub response: String,
    /// Spam likelihood, 0-100
    pub spam_score: f64,
}

impl AnalysisResult {
    /// Result used whenever the oracle cannot be reached or replies with garbage
    pub fn fallback() -> Self {
        Self {
            quality: 50.0,
            sentiment: Sentiment::Neutral,
            topics: Vec::new(),
            response: String::new(),
            spam_score: 0.0,
        }
    }

    /// Whether the spam likelihood is strictly above `threshold`
    pub fn is_spam(&self, threshold: f64) -> bool {
        self.spam_score > threshold
    }
}
