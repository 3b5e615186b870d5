//! Content-analysis oracle clients.
//!
//! An oracle turns a prompt into raw text. Nothing about the reply is
//! trusted here; shaping it into an analysis is the gateway's job.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default Generative Language API endpoint
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Default model used for analysis
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Error types for oracle calls.
#[derive(Debug, Error)]
pub enum OracleError {
    /// No oracle is configured
    #[error("oracle disabled: {0}")]
    Disabled(String),

    /// The call did not finish in time
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure
    #[error("oracle request failed: {0}")]
    Request(String),

    /// The oracle answered with a non-success status
    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The oracle answered without any text
    #[error("oracle reply contained no text")]
    EmptyReply,
}

/// Text generator used for content analysis.
#[async_trait]
pub trait AnalysisOracle: Send + Sync {
    /// Identifier used in logs (e.g. model name).
    fn id(&self) -> &str;

    /// Generate raw text for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Oracle used when no API key is configured; every call fails, so every
/// analysis degrades to the fallback result.
#[derive(Debug, Default, Clone)]
pub struct DisabledOracle;

#[async_trait]
impl AnalysisOracle for DisabledOracle {
    fn id(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, OracleError> {
        Err(OracleError::Disabled("GEMINI_API_KEY not set".to_string()))
    }
}

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiOracle {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiOracle {
    /// Create a client whose requests are bounded by `timeout`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[async_trait]
impl AnalysisOracle for GeminiOracle {
    fn id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.0,
            },
        };

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(self.timeout)
                } else {
                    OracleError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout(self.timeout)
            } else {
                OracleError::Request(format!("invalid response body: {}", e))
            }
        })?;

        let text: String = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(OracleError::EmptyReply);
        }
        Ok(text)
    }
}
