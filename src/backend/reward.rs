//! Token reward engine.
//!
//! ```text
//! qualityMul    = 1 + (MAX_QUALITY_MULTIPLIER - 1)    * quality / 100
//! engagementMul = 1 + (MAX_ENGAGEMENT_MULTIPLIER - 1) * engagement / 100
//! stakeMul      = 1 + stake * STAKE_MULTIPLIER_FACTOR
//! reputationMul = 0.5 + reputation / 100
//! reward        = round2(BASE_REWARD * qualityMul * engagementMul * stakeMul * reputationMul)
//! ```
//!
//! Inputs are quantized to two decimals and clamped to their domains before
//! the formula runs, and quotes are cached under the quantized tuple. The
//! cache therefore can only ever return what [`compute_reward`] returns for
//! the same tuple.

use crate::backend::cache::CacheStore;
use std::sync::Arc;
use std::time::Duration;

pub const BASE_REWARD: f64 = 1.0;
pub const MAX_QUALITY_MULTIPLIER: f64 = 3.0;
pub const MAX_ENGAGEMENT_MULTIPLIER: f64 = 2.0;
pub const STAKE_MULTIPLIER_FACTOR: f64 = 0.1;

const CACHE_KEY_PREFIX: &str = "token_mining:";

/// Reward formula inputs after quantization and clamping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardInputs {
    pub quality: f64,
    pub engagement: f64,
    pub stake: f64,
    pub reputation: f64,
}

impl RewardInputs {
    pub fn new(quality: f64, engagement: f64, stake: f64, reputation: f64) -> Self {
        Self {
            quality: quantize(quality).clamp(0.0, 100.0),
            engagement: quantize(engagement).clamp(0.0, 100.0),
            stake: quantize(stake).max(0.0),
            reputation: quantize(reputation).clamp(0.0, 100.0),
        }
    }

    fn cache_key(&self) -> String {
        format!(
            "{}{}:{}:{}:{}",
            CACHE_KEY_PREFIX, self.quality, self.engagement, self.stake, self.reputation
        )
    }
}

/// Round to two decimals; non-finite values count as zero
fn quantize(value: f64) -> f64 {
    if value.is_finite() {
        round2(value)
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Evaluate the reward formula without touching any cache
pub fn compute_reward(inputs: RewardInputs) -> f64 {
    let quality_multiplier = 1.0 + (MAX_QUALITY_MULTIPLIER - 1.0) * (inputs.quality / 100.0);
    let engagement_multiplier =
        1.0 + (MAX_ENGAGEMENT_MULTIPLIER - 1.0) * (inputs.engagement / 100.0);
    let stake_multiplier = 1.0 + inputs.stake * STAKE_MULTIPLIER_FACTOR;
    let reputation_multiplier = 0.5 + inputs.reputation / 100.0;

    round2(
        BASE_REWARD
            * quality_multiplier
            * engagement_multiplier
            * stake_multiplier
            * reputation_multiplier,
    )
}

/// Cache-accelerated reward quotes
#[derive(Clone)]
pub struct RewardEngine {
    cache: Arc<dyn CacheStore>,
    cache_ttl: Duration,
}

impl RewardEngine {
    pub fn new(cache: Arc<dyn CacheStore>, cache_ttl: Duration) -> Self {
        Self { cache, cache_ttl }
    }

    /// Token reward for one message
    pub async fn reward(&self, quality: f64, engagement: f64, stake: f64, reputation: f64) -> f64 {
        let inputs = RewardInputs::new(quality, engagement, stake, reputation);
        let key = inputs.cache_key();

        match self.cache.get(&key).await {
            Ok(Some(cached)) => match cached.parse::<f64>() {
                Ok(reward) => return reward,
                Err(e) => tracing::warn!("[Reward] Ignoring unreadable quote {}: {}", key, e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("[Reward] Cache read failed for {}: {}", key, e),
        }

        let reward = compute_reward(inputs);
        // Display for f64 round-trips exactly through parse
        if let Err(e) = self.cache.set(&key, reward.to_string(), self.cache_ttl).await {
            tracing::warn!("[Reward] Failed to cache quote {}: {}", key, e);
        }
        reward
    }
}
