//! Key-Value Cache Module
//!
//! The pipeline caches three things: analysis results (by message content),
//! reward quotes (by input tuple) and history pages (by group and cursor).
//! All of them go through the [`CacheStore`] capability so the backing store
//! can be swapped without touching the callers.
//!
//! # Module Structure
//!
//! ```text
//! cache/
//! ├── mod.rs          - CacheStore trait, key layout, maintenance task
//! ├── memory.rs       - In-process TTL cache
//! └── invalidation.rs - Group/user namespace invalidation after commits
//! ```
//!
//! # Key Layout
//!
//! | Key | Written by |
//! |---|---|
//! | `analysis:{sha256(text)}` | analysis gateway |
//! | `token_mining:{q}:{e}:{s}:{r}` | reward engine |
//! | `group:{group_id}:messages:{before\|latest}` | history service |
//! | `user:{user_id}` | external user views |

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// In-process TTL cache
pub mod memory;

/// Namespace invalidation
pub mod invalidation;

pub use invalidation::CacheInvalidator;
pub use memory::MemoryCache;

/// Errors raised by a cache backend
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("invalid cache pattern: {0}")]
    InvalidPattern(String),
}

/// Key-value cache with per-entry expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live value
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value that expires after `ttl`
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Remove a single key, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every key starting with `prefix`, returning how many were removed
    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, CacheError>;

    /// Drop expired entries, returning how many were removed
    ///
    /// Backends that expire keys on their own keep the default.
    async fn purge_expired(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
}

/// Periodically purge expired entries from `cache`
pub fn spawn_cache_maintenance(
    cache: Arc<dyn CacheStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match cache.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!("[Cache] Purged {} expired entries", removed),
                Err(e) => tracing::warn!("[Cache] Purge failed: {}", e),
            }
        }
    })
}

/// Namespace holding every cached read view of a group
pub fn group_namespace(group_id: Uuid) -> String {
    format!("group:{}:", group_id)
}

/// Cache key of one history page
pub fn history_key(group_id: Uuid, before: Option<Uuid>) -> String {
    match before {
        Some(before) => format!("{}messages:{}", group_namespace(group_id), before),
        None => format!("{}messages:latest", group_namespace(group_id)),
    }
}

/// Cache key of a user's own view
pub fn user_key(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}
