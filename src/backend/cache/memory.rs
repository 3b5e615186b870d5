/**
 * In-Memory Cache
 *
 * A `CacheStore` kept in process memory. Entries carry their own deadline and
 * are dropped lazily when read after expiry, and in bulk by
 * `purge_expired`, which `spawn_cache_maintenance` runs on an interval.
 *
 * Deadlines use `tokio::time::Instant`, so tests running with paused time can
 * move past a TTL with `tokio::time::advance`.
 */
use crate::backend::cache::{CacheError, CacheStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Process-local TTL cache
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including ones that expired but were not purged yet
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: remove it unless someone refreshed it in the meantime
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        if prefix.is_empty() {
            return Err(CacheError::InvalidPattern(
                "refusing to delete with an empty prefix".to_string(),
            ));
        }
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();
        cache.set("a", "1".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(cache.get("b").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = MemoryCache::new();
        cache.set("a", "1".to_string(), Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get("a").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("a").await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_by_prefix_only_touches_namespace() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("group:1:messages:latest", "x".into(), ttl).await.unwrap();
        cache.set("group:1:messages:abc", "x".into(), ttl).await.unwrap();
        cache.set("group:10:messages:latest", "x".into(), ttl).await.unwrap();
        cache.set("analysis:ff", "x".into(), ttl).await.unwrap();

        let removed = cache.delete_by_prefix("group:1:").await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.get("group:10:messages:latest").await.unwrap().is_some());
        assert!(cache.get("analysis:ff").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_prefix_is_rejected() {
        let cache = MemoryCache::new();
        assert!(cache.delete_by_prefix("").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.set("short", "x".into(), Duration::from_secs(1)).await.unwrap();
        cache.set("long", "x".into(), Duration::from_secs(100)).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.len().await, 1);
    }
}
