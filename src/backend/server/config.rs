/**
 * Server Configuration
 *
 * Configuration is read from an optional TOML file named by `CHATMINT_CONFIG`
 * and then overridden by environment variables. Anything unset keeps its
 * default.
 *
 * # Environment Variables
 *
 * | Variable | Setting |
 * |---|---|
 * | `SERVER_PORT` | HTTP port (3000) |
 * | `DATABASE_URL` | PostgreSQL URL; unset selects the in-memory store |
 * | `GEMINI_API_KEY` | Oracle key; unset disables the oracle |
 * | `GEMINI_MODEL`, `GEMINI_BASE_URL` | Oracle model and endpoint |
 * | `CHATMINT_BATCH_SIZE`, `CHATMINT_TICK_MS` | Drain batch size and tick |
 * | `CHATMINT_MAX_QUEUE_DEPTH` | Queue cap, or `unbounded` |
 * | `CHATMINT_RATE_LIMIT_MAX`, `CHATMINT_RATE_LIMIT_WINDOW_MS` | Rate limit |
 * | `CHATMINT_ORACLE_TIMEOUT_MS` | Oracle call timeout |
 *
 * # Optional Services
 *
 * Services that fail to initialize degrade instead of stopping the server:
 * the store falls back to memory and the oracle to `DisabledOracle`.
 */
use crate::backend::analysis::oracle::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::backend::analysis::{AnalysisOracle, DisabledOracle, GeminiOracle};
use crate::backend::store::{MemoryStore, PgStore, StatsStore};
use crate::shared::config::{ConfigError, PipelineConfig};
use serde::Deserialize;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3000;

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_VAR: &str = "CHATMINT_CONFIG";

/// Oracle connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct OracleSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

/// Complete server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub oracle: OracleSettings,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            oracle: OracleSettings {
                api_key: None,
                model: DEFAULT_GEMINI_MODEL.to_string(),
                base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            },
            pipeline: PipelineConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    server: ServerSection,
    gemini: GeminiSection,
    pipeline: PipelineSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerSection {
    port: Option<u16>,
    database_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeminiSection {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PipelineSection {
    batch_size: Option<usize>,
    tick_ms: Option<u64>,
    max_queue_depth: Option<usize>,
    unbounded_queue: Option<bool>,
    rate_limit_max: Option<u32>,
    rate_limit_window_ms: Option<u64>,
    oracle_timeout_ms: Option<u64>,
    spam_threshold: Option<f64>,
    history_page_size: Option<usize>,
    history_cache_ttl_secs: Option<u64>,
    analysis_cache_ttl_secs: Option<u64>,
    reward_cache_ttl_secs: Option<u64>,
}

fn parse_var<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name, format!("{:?}: {}", raw, e)))
}

impl ServerConfig {
    /// Load from `CHATMINT_CONFIG` (if set) and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let file_contents = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Some(std::fs::read_to_string(&path).map_err(|e| ConfigError::File {
                path: path.clone(),
                message: e.to_string(),
            })?),
            Err(_) => None,
        };
        Self::from_sources(file_contents.as_deref(), |name| std::env::var(name).ok())
    }

    /// Build from TOML text and an environment lookup
    pub fn from_sources<F>(toml_text: Option<&str>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileConfig = match toml_text {
            Some(text) => toml::from_str(text).map_err(|e| ConfigError::File {
                path: CONFIG_PATH_VAR.to_string(),
                message: e.to_string(),
            })?,
            None => FileConfig::default(),
        };

        let mut config = Self::default();

        if let Some(port) = file.server.port {
            config.port = port;
        }
        config.database_url = file.server.database_url;
        config.oracle.api_key = file.gemini.api_key;
        if let Some(model) = file.gemini.model {
            config.oracle.model = model;
        }
        if let Some(base_url) = file.gemini.base_url {
            config.oracle.base_url = base_url;
        }
        Self::apply_pipeline_section(&mut config.pipeline, file.pipeline);

        if let Some(raw) = env("SERVER_PORT") {
            config.port = parse_var("SERVER_PORT", &raw)?;
        }
        if let Some(url) = env("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            config.database_url = Some(url);
        }
        if let Some(key) = env("GEMINI_API_KEY").filter(|key| !key.trim().is_empty()) {
            config.oracle.api_key = Some(key);
        }
        if let Some(model) = env("GEMINI_MODEL") {
            config.oracle.model = model;
        }
        if let Some(base_url) = env("GEMINI_BASE_URL") {
            config.oracle.base_url = base_url;
        }

        let pipeline = &mut config.pipeline;
        if let Some(raw) = env("CHATMINT_BATCH_SIZE") {
            pipeline.batch_size = parse_var("CHATMINT_BATCH_SIZE", &raw)?;
        }
        if let Some(raw) = env("CHATMINT_TICK_MS") {
            pipeline.tick_interval = Duration::from_millis(parse_var("CHATMINT_TICK_MS", &raw)?);
        }
        if let Some(raw) = env("CHATMINT_MAX_QUEUE_DEPTH") {
            pipeline.max_queue_depth = if raw.trim().eq_ignore_ascii_case("unbounded") {
                None
            } else {
                Some(parse_var("CHATMINT_MAX_QUEUE_DEPTH", &raw)?)
            };
        }
        if let Some(raw) = env("CHATMINT_RATE_LIMIT_MAX") {
            pipeline.rate_limit_max = parse_var("CHATMINT_RATE_LIMIT_MAX", &raw)?;
        }
        if let Some(raw) = env("CHATMINT_RATE_LIMIT_WINDOW_MS") {
            pipeline.rate_limit_window =
                Duration::from_millis(parse_var("CHATMINT_RATE_LIMIT_WINDOW_MS", &raw)?);
        }
        if let Some(raw) = env("CHATMINT_ORACLE_TIMEOUT_MS") {
            pipeline.oracle_timeout =
                Duration::from_millis(parse_var("CHATMINT_ORACLE_TIMEOUT_MS", &raw)?);
        }

        config.pipeline.validate()?;
        Ok(config)
    }

    fn apply_pipeline_section(pipeline: &mut PipelineConfig, section: PipelineSection) {
        if let Some(size) = section.batch_size {
            pipeline.batch_size = size;
        }
        if let Some(ms) = section.tick_ms {
            pipeline.tick_interval = Duration::from_millis(ms);
        }
        if let Some(depth) = section.max_queue_depth {
            pipeline.max_queue_depth = Some(depth);
        }
        if section.unbounded_queue == Some(true) {
            pipeline.max_queue_depth = None;
        }
        if let Some(max) = section.rate_limit_max {
            pipeline.rate_limit_max = max;
        }
        if let Some(ms) = section.rate_limit_window_ms {
            pipeline.rate_limit_window = Duration::from_millis(ms);
        }
        if let Some(ms) = section.oracle_timeout_ms {
            pipeline.oracle_timeout = Duration::from_millis(ms);
        }
        if let Some(threshold) = section.spam_threshold {
            pipeline.spam_threshold = threshold;
        }
        if let Some(size) = section.history_page_size {
            pipeline.history_page_size = size;
        }
        if let Some(secs) = section.history_cache_ttl_secs {
            pipeline.history_cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = section.analysis_cache_ttl_secs {
            pipeline.analysis_cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = section.reward_cache_ttl_secs {
            pipeline.reward_cache_ttl = Duration::from_secs(secs);
        }
    }
}

/// Connect the configured store
///
/// Without a usable database the server keeps running on the in-memory
/// store, which loses everything on restart.
pub async fn load_store(database_url: Option<&str>) -> Arc<dyn StatsStore> {
    let Some(database_url) = database_url else {
        tracing::warn!("[Config] DATABASE_URL not set, using the in-memory store");
        return Arc::new(MemoryStore::new());
    };

    tracing::info!("[Config] Connecting to database...");
    let pool = match PgPool::connect(database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("[Config] Failed to create database connection pool: {}", e);
            tracing::warn!("[Config] Falling back to the in-memory store");
            return Arc::new(MemoryStore::new());
        }
    };

    let store = PgStore::new(pool);
    tracing::info!("[Config] Running database migrations...");
    if let Err(e) = store.migrate().await {
        tracing::error!("[Config] Failed to run database migrations: {}", e);
        tracing::warn!("[Config] Continuing, the schema may be out of date");
    }
    Arc::new(store)
}

/// Build the configured analysis oracle
pub fn load_oracle(settings: &OracleSettings, timeout: Duration) -> Arc<dyn AnalysisOracle> {
    let Some(api_key) = settings.api_key.as_deref() else {
        tracing::warn!("[Config] GEMINI_API_KEY not set, every analysis will use the fallback");
        return Arc::new(DisabledOracle);
    };

    match GeminiOracle::new(&settings.base_url, &settings.model, api_key, timeout) {
        Ok(oracle) => {
            tracing::info!("[Config] Analysis oracle: {}", settings.model);
            Arc::new(oracle)
        }
        Err(e) => {
            tracing::error!("[Config] Failed to build analysis oracle: {}", e);
            Arc::new(DisabledOracle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = ServerConfig::from_sources(None, env_from(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let toml_text = r#"
            [server]
            port = 8080

            [pipeline]
            batch_size = 4
            tick_ms = 250
        "#;
        let config = ServerConfig::from_sources(
            Some(toml_text),
            env_from(&[("CHATMINT_BATCH_SIZE", "7"), ("GEMINI_API_KEY", "k")]),
        )
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.pipeline.batch_size, 7);
        assert_eq!(config.pipeline.tick_interval, Duration::from_millis(250));
        assert_eq!(config.oracle.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_unbounded_queue_from_env() {
        let config = ServerConfig::from_sources(
            None,
            env_from(&[("CHATMINT_MAX_QUEUE_DEPTH", "unbounded")]),
        )
        .unwrap();
        assert_eq!(config.pipeline.max_queue_depth, None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad_number =
            ServerConfig::from_sources(None, env_from(&[("CHATMINT_TICK_MS", "soon")]));
        assert!(matches!(
            bad_number,
            Err(ConfigError::InvalidValue("CHATMINT_TICK_MS", _))
        ));

        let zero_batch =
            ServerConfig::from_sources(None, env_from(&[("CHATMINT_BATCH_SIZE", "0")]));
        assert!(matches!(
            zero_batch,
            Err(ConfigError::InvalidValue("batch_size", _))
        ));
    }

    #[test]
    fn test_blank_database_url_is_ignored() {
        let config = ServerConfig::from_sources(None, env_from(&[("DATABASE_URL", "  ")])).unwrap();
        assert_eq!(config.database_url, None);
    }
}
