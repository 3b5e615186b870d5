//! Pipeline configuration
//!
//! Tunables for the ingestion and reward pipeline. Built with
//! [`PipelineConfig::builder`] and checked with [`PipelineConfig::validate`]
//! before any component is constructed from it.

use std::time::Duration;
use thiserror::Error;

/// Default number of submissions a sender may make per window
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 5;
/// Default submissions claimed per drain
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Default cap on queued submissions
pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 10_000;
/// Default number of messages in one history page
pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 50;
/// Spam likelihood above which a message is rejected
pub const DEFAULT_SPAM_THRESHOLD: f64 = 80.0;

/// Configuration for the message ingestion pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Window after which an accepted submission stops counting against its sender
    pub rate_limit_window: Duration,
    /// Live submissions allowed per sender within the window
    pub rate_limit_max: u32,
    /// Interval between drain ticks
    pub tick_interval: Duration,
    /// Maximum submissions claimed by one drain
    pub batch_size: usize,
    /// Queue depth at which new submissions are rejected; `None` is unbounded
    pub max_queue_depth: Option<usize>,
    pub analysis_cache_ttl: Duration,
    pub reward_cache_ttl: Duration,
    pub history_cache_ttl: Duration,
    pub history_page_size: usize,
    /// Upper bound on a single oracle call
    pub oracle_timeout: Duration,
    pub spam_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rate_limit_window: Duration::from_secs(1),
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            tick_interval: Duration::from_millis(100),
            batch_size: DEFAULT_BATCH_SIZE,
            max_queue_depth: Some(DEFAULT_MAX_QUEUE_DEPTH),
            analysis_cache_ttl: Duration::from_secs(3600),
            reward_cache_ttl: Duration::from_secs(3600),
            history_cache_ttl: Duration::from_secs(60),
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
            oracle_timeout: Duration::from_secs(10),
            spam_threshold: DEFAULT_SPAM_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Create a new PipelineConfigBuilder seeded with the defaults
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_window.is_zero() {
            return Err(ConfigError::InvalidValue("rate_limit_window", "must be non-zero".into()));
        }
        if self.rate_limit_max == 0 {
            return Err(ConfigError::InvalidValue("rate_limit_max", "must be at least 1".into()));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::InvalidValue("tick_interval", "must be non-zero".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue("batch_size", "must be at least 1".into()));
        }
        if self.max_queue_depth == Some(0) {
            return Err(ConfigError::InvalidValue("max_queue_depth", "must be at least 1".into()));
        }
        if self.history_page_size == 0 {
            return Err(ConfigError::InvalidValue("history_page_size", "must be at least 1".into()));
        }
        if self.oracle_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("oracle_timeout", "must be non-zero".into()));
        }
        if !(0.0..=100.0).contains(&self.spam_threshold) {
            return Err(ConfigError::InvalidValue(
                "spam_threshold",
                format!("{} is outside [0, 100]", self.spam_threshold),
            ));
        }
        Ok(())
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn rate_limit(mut self, max: u32, window: Duration) -> Self {
        self.config.rate_limit_max = max;
        self.config.rate_limit_window = window;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn max_queue_depth(mut self, depth: Option<usize>) -> Self {
        self.config.max_queue_depth = depth;
        self
    }

    pub fn analysis_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.analysis_cache_ttl = ttl;
        self
    }

    pub fn reward_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.reward_cache_ttl = ttl;
        self
    }

    pub fn history_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.history_cache_ttl = ttl;
        self
    }

    pub fn history_page_size(mut self, size: usize) -> Self {
        self.config.history_page_size = size;
        self
    }

    pub fn oracle_timeout(mut self, timeout: Duration) -> Self {
        self.config.oracle_timeout = timeout;
        self
    }

    pub fn spam_threshold(mut self, threshold: f64) -> Self {
        self.config.spam_threshold = threshold;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("failed to read config file {path}: {message}")]
    File { path: String, message: String },
}
