//! Cache invalidation after commits
//!
//! Read views of a group (history pages) and of a user are cached. Once a
//! commit has changed what those views would show, the views are dropped so
//! the next read goes back to the store. Callers only invoke this after a
//! commit succeeded; a failed commit leaves every cache untouched.
//!
//! Each group also carries a generation counter, bumped before its views are
//! deleted. A reader that saw the counter move while it was querying the
//! store must not cache what it read.

use crate::backend::cache::{group_namespace, user_key, CacheStore};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Drops cached read views whose underlying data changed
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<dyn CacheStore>,
    generations: Arc<DashMap<Uuid, u64>>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            cache,
            generations: Arc::new(DashMap::new()),
        }
    }

    /// Number of invalidations the group has seen so far
    pub fn group_generation(&self, group_id: Uuid) -> u64 {
        self.generations.get(&group_id).map_or(0, |generation| *generation)
    }

    /// Delete every cached view under the group's namespace
    ///
    /// Cache failures are logged and swallowed: the commit already happened
    /// and the stale views expire on their own TTL.
    pub async fn invalidate_group(&self, group_id: Uuid) -> usize {
        *self.generations.entry(group_id).or_insert(0) += 1;

        match self.cache.delete_by_prefix(&group_namespace(group_id)).await {
            Ok(removed) => {
                tracing::debug!("[Cache] Invalidated {} view(s) of group {}", removed, group_id);
                removed
            }
            Err(e) => {
                tracing::warn!("[Cache] Failed to invalidate group {}: {}", group_id, e);
                0
            }
        }
    }

    /// Delete the cached user view and anything nested under it
    pub async fn invalidate_user(&self, user_id: Uuid) -> usize {
        let key = user_key(user_id);
        let mut removed = 0;
        match self.cache.delete(&key).await {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => tracing::warn!("[Cache] Failed to invalidate user {}: {}", user_id, e),
        }
        match self.cache.delete_by_prefix(&format!("{}:", key)).await {
            Ok(n) => removed += n,
            Err(e) => tracing::warn!("[Cache] Failed to invalidate user {} views: {}", user_id, e),
        }
        removed
    }
}
