/**
 * Analysis Cache Gateway
 *
 * `analyze` never fails. It looks the message up by content hash, calls the
 * oracle on a miss (bounded by a timeout), validates the reply, and caches
 * only validated results. Any failure along the way returns the fixed
 * fallback analysis, which is deliberately not cached so the next occurrence
 * of the same text tries the oracle again.
 */
use crate::backend::analysis::oracle::{AnalysisOracle, OracleError};
use crate::backend::analysis::parse::{build_prompt, parse_reply};
use crate::backend::analysis::AnalysisError;
use crate::backend::cache::CacheStore;
use crate::shared::analysis::AnalysisResult;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cache key of the analysis of `message`
pub fn cache_key(message: &str) -> String {
    format!("analysis:{}", hex::encode(Sha256::digest(message.as_bytes())))
}

/// Content-addressed, fail-safe front of the analysis oracle
pub struct AnalysisGateway {
    oracle: Arc<dyn AnalysisOracle>,
    cache: Arc<dyn CacheStore>,
    cache_ttl: Duration,
    timeout: Duration,
    degraded: AtomicU64,
}

impl AnalysisGateway {
    pub fn new(
        oracle: Arc<dyn AnalysisOracle>,
        cache: Arc<dyn CacheStore>,
        cache_ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            oracle,
            cache,
            cache_ttl,
            timeout,
            degraded: AtomicU64::new(0),
        }
    }

    /// Analyse a message body
    pub async fn analyze(&self, message: &str) -> AnalysisResult {
        let key = cache_key(message);

        match self.cache.get(&key).await {
            Ok(Some(cached)) => match serde_json::from_str::<AnalysisResult>(&cached) {
                Ok(result) => {
                    tracing::debug!("[Analysis] Cache hit for {}", key);
                    return result;
                }
                Err(e) => {
                    tracing::warn!("[Analysis] Discarding unreadable cache entry {}: {}", key, e);
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("[Analysis] Cache read failed, querying oracle: {}", e);
            }
        }

        match self.query_oracle(message).await {
            Ok(result) => {
                match serde_json::to_string(&result) {
                    Ok(encoded) => {
                        if let Err(e) = self.cache.set(&key, encoded, self.cache_ttl).await {
                            tracing::warn!("[Analysis] Failed to cache analysis {}: {}", key, e);
                        }
                    }
                    Err(e) => tracing::warn!("[Analysis] Failed to encode analysis: {}", e),
                }
                result
            }
            Err(e) => {
                self.degraded.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "[Analysis] Degraded to fallback analysis (oracle {}): {}",
                    self.oracle.id(),
                    e
                );
                AnalysisResult::fallback()
            }
        }
    }

    /// Number of analyses that fell back since startup
    pub fn degraded_count(&self) -> u64 {
        self.degraded.load(Ordering::Relaxed)
    }

    async fn query_oracle(&self, message: &str) -> Result<AnalysisResult, AnalysisError> {
        let prompt = build_prompt(message);
        let raw = tokio::time::timeout(self.timeout, self.oracle.generate(&prompt))
            .await
            .map_err(|_| OracleError::Timeout(self.timeout))??;
        parse_reply(&raw)
    }
}
