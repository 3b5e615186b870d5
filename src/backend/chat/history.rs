//! Group message history with a short-lived page cache.
//!
//! Pages are cached under the group's namespace, so a commit or soft delete
//! in the group invalidates every cached page of it. A page read while the
//! group was being invalidated is returned but never cached.

use crate::backend::cache::{history_key, CacheInvalidator, CacheStore};
use crate::backend::store::{StatsStore, StoreError};
use crate::shared::message::MessageRecord;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Paged reader of a group's recent messages
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn StatsStore>,
    cache: Arc<dyn CacheStore>,
    invalidator: CacheInvalidator,
    cache_ttl: Duration,
    page_size: usize,
}

impl HistoryService {
    pub fn new(
        store: Arc<dyn StatsStore>,
        cache: Arc<dyn CacheStore>,
        invalidator: CacheInvalidator,
        cache_ttl: Duration,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            cache,
            invalidator,
            cache_ttl,
            page_size,
        }
    }

    /// Newest non-deleted messages of a group, strictly older than `before`
    pub async fn load(
        &self,
        group_id: Uuid,
        before: Option<Uuid>,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let key = history_key(group_id, before);
        let generation = self.invalidator.group_generation(group_id);

        match self.cache.get(&key).await {
            Ok(Some(cached)) => match serde_json::from_str::<Vec<MessageRecord>>(&cached) {
                Ok(page) => return Ok(page),
                Err(e) => tracing::warn!("[History] Discarding unreadable page {}: {}", key, e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("[History] Cache read failed for {}: {}", key, e),
        }

        let page = self
            .store
            .recent_messages(group_id, before, self.page_size)
            .await?;

        self.cache_page(&key, group_id, generation, &page).await;
        Ok(page)
    }

    async fn cache_page(&self, key: &str, group_id: Uuid, generation: u64, page: &[MessageRecord]) {
        if self.invalidator.group_generation(group_id) != generation {
            tracing::debug!(
                "[History] Group {} changed during read, not caching {}",
                group_id,
                key
            );
            return;
        }

        let encoded = match serde_json::to_string(page) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!("[History] Failed to encode page {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.cache.set(key, encoded, self.cache_ttl).await {
            tracing::warn!("[History] Failed to cache page {}: {}", key, e);
            return;
        }

        // An invalidation between the check and the write may have missed it
        if self.invalidator.group_generation(group_id) != generation {
            if let Err(e) = self.cache.delete(key).await {
                tracing::warn!("[History] Failed to drop stale page {}: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::cache::MemoryCache;
    use crate::backend::store::{GroupAggregate, MemoryStore, SenderAggregate, StatsTransaction};
    use crate::shared::message::{SenderRef, Sentiment};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::Mutex;

    fn record(sender: &SenderAggregate, group_id: Uuid, offset: i64) -> MessageRecord {
        MessageRecord {
            id: Uuid::new_v4(),
            message: format!("m{}", offset),
            sender: SenderRef {
                id: sender.id,
                address: sender.address.clone(),
            },
            group_id,
            ai_score: 60.0,
            sentiment: Sentiment::Neutral,
            topics: vec![],
            content_quality: 60.0,
            tokens_mined: 1.1,
            spam_score: 0.0,
            is_ai_generated: false,
            engagement_score: 0.0,
            is_deleted: false,
            response: String::new(),
            created_at: Utc::now() + ChronoDuration::milliseconds(offset),
        }
    }

    async fn insert(
        store: &MemoryStore,
        sender: &SenderAggregate,
        group_id: Uuid,
        offset: i64,
    ) -> Uuid {
        let record = record(sender, group_id, offset);
        let mut tx = store.begin().await.unwrap();
        tx.insert_message(&record).await.unwrap();
        tx.commit().await.unwrap();
        record.id
    }

    fn service(store: &MemoryStore, cache: &Arc<MemoryCache>, page_size: usize) -> HistoryService {
        HistoryService::new(
            Arc::new(store.clone()),
            cache.clone(),
            CacheInvalidator::new(cache.clone()),
            Duration::from_secs(60),
            page_size,
        )
    }

    /// Store that commits a pending message right after serving a read
    struct CommitDuringRead {
        inner: MemoryStore,
        invalidator: CacheInvalidator,
        pending: Mutex<Option<MessageRecord>>,
    }

    #[async_trait]
    impl StatsStore for CommitDuringRead {
        async fn find_sender(&self, id: Uuid) -> Result<Option<SenderAggregate>, StoreError> {
            self.inner.find_sender(id).await
        }

        async fn find_group(&self, id: Uuid) -> Result<Option<GroupAggregate>, StoreError> {
            self.inner.find_group(id).await
        }

        async fn begin(&self) -> Result<Box<dyn StatsTransaction>, StoreError> {
            self.inner.begin().await
        }

        async fn recent_messages(
            &self,
            group_id: Uuid,
            before: Option<Uuid>,
            limit: usize,
        ) -> Result<Vec<MessageRecord>, StoreError> {
            let page = self.inner.recent_messages(group_id, before, limit).await?;
            let pending = self.pending.lock().unwrap().take();
            if let Some(record) = pending {
                let mut tx = self.inner.begin().await?;
                tx.insert_message(&record).await?;
                tx.commit().await?;
                self.invalidator.invalidate_group(record.group_id).await;
            }
            Ok(page)
        }

        async fn soft_delete(&self, message_id: Uuid) -> Result<Option<Uuid>, StoreError> {
            self.inner.soft_delete(message_id).await
        }

        async fn create_sender(&self, sender: &SenderAggregate) -> Result<(), StoreError> {
            self.inner.create_sender(sender).await
        }

        async fn create_group(&self, group: &GroupAggregate) -> Result<(), StoreError> {
            self.inner.create_group(group).await
        }
    }

    #[tokio::test]
    async fn test_page_is_cached_until_invalidated() {
        let store = MemoryStore::new();
        let cache = Arc::new(MemoryCache::new());
        let sender = SenderAggregate::new("0xabc");
        store.create_sender(&sender).await.unwrap();
        let group_id = Uuid::new_v4();
        insert(&store, &sender, group_id, 0).await;

        let history = service(&store, &cache, 50);
        assert_eq!(history.load(group_id, None).await.unwrap().len(), 1);

        // Cached page hides the new message
        insert(&store, &sender, group_id, 1).await;
        assert_eq!(history.load(group_id, None).await.unwrap().len(), 1);

        CacheInvalidator::new(cache.clone()).invalidate_group(group_id).await;
        assert_eq!(history.load(group_id, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pages_walk_backwards() {
        let store = MemoryStore::new();
        let cache = Arc::new(MemoryCache::new());
        let sender = SenderAggregate::new("0xabc");
        store.create_sender(&sender).await.unwrap();
        let group_id = Uuid::new_v4();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(insert(&store, &sender, group_id, i).await);
        }

        let history = service(&store, &cache, 2);
        let first = history.load(group_id, None).await.unwrap();
        assert_eq!(first.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);

        let second = history.load(group_id, Some(ids[3])).await.unwrap();
        assert_eq!(second.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);

        let last = history.load(group_id, Some(ids[1])).await.unwrap();
        assert_eq!(last.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[0]]);
    }

    #[tokio::test]
    async fn test_page_read_during_invalidation_is_not_cached() {
        let store = MemoryStore::new();
        let cache = Arc::new(MemoryCache::new());
        let invalidator = CacheInvalidator::new(cache.clone());
        let sender = SenderAggregate::new("0xabc");
        store.create_sender(&sender).await.unwrap();
        let group_id = Uuid::new_v4();
        insert(&store, &sender, group_id, 0).await;

        let racing = CommitDuringRead {
            inner: store.clone(),
            invalidator: invalidator.clone(),
            pending: Mutex::new(Some(record(&sender, group_id, 1))),
        };
        let history = HistoryService::new(
            Arc::new(racing),
            cache.clone(),
            invalidator.clone(),
            Duration::from_secs(60),
            50,
        );

        // Served as read, but the commit that landed meanwhile keeps it out of the cache
        assert_eq!(history.load(group_id, None).await.unwrap().len(), 1);
        assert_eq!(invalidator.group_generation(group_id), 1);
        assert!(cache.get(&history_key(group_id, None)).await.unwrap().is_none());

        assert_eq!(history.load(group_id, None).await.unwrap().len(), 2);
        assert!(cache.get(&history_key(group_id, None)).await.unwrap().is_some());
    }
}
