/**
 * In-Memory Store
 *
 * A `StatsStore` kept in process memory. Used when no `DATABASE_URL` is
 * configured and by the tests.
 *
 * # Transactions
 *
 * A transaction holds the store's single lock from `begin` until it is
 * committed, rolled back or dropped, so transactions are fully serialized.
 * Changes are staged inside the transaction and only copied into the tables
 * by `commit`.
 *
 * # Fail Points
 *
 * `fail_at` arms a one-shot failure at a chosen transactional step, which
 * lets tests abort a commit halfway through and check nothing leaked.
 */
use crate::backend::store::{
    GroupAggregate, SenderAggregate, StatsStore, StatsTransaction, StoreError,
};
use crate::shared::message::MessageRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Transactional step at which a failure can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Begin,
    InsertMessage,
    UpdateSender,
    UpdateGroup,
    Commit,
}

#[derive(Debug, Default)]
struct Tables {
    senders: HashMap<Uuid, SenderAggregate>,
    groups: HashMap<Uuid, GroupAggregate>,
    /// Insertion order doubles as commit order
    messages: Vec<MessageRecord>,
}

/// Process-local store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_point: Arc<StdMutex<Option<FailPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next transaction that reaches `point`
    pub fn fail_at(&self, point: FailPoint) {
        if let Ok(mut slot) = self.fail_point.lock() {
            *slot = Some(point);
        }
    }

    /// Number of stored messages, deleted ones included
    pub async fn message_count(&self) -> usize {
        self.tables.lock().await.messages.len()
    }

    /// Stored copy of a message
    pub async fn message(&self, id: Uuid) -> Option<MessageRecord> {
        self.tables
            .lock()
            .await
            .messages
            .iter()
            .find(|message| message.id == id)
            .cloned()
    }

    fn trip(fail_point: &StdMutex<Option<FailPoint>>, point: FailPoint) -> Result<(), StoreError> {
        let mut slot = fail_point
            .lock()
            .map_err(|_| StoreError::Unavailable("fail point lock poisoned".to_string()))?;
        if *slot == Some(point) {
            *slot = None;
            return Err(StoreError::Unavailable(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn find_sender(&self, id: Uuid) -> Result<Option<SenderAggregate>, StoreError> {
        Ok(self.tables.lock().await.senders.get(&id).cloned())
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<GroupAggregate>, StoreError> {
        Ok(self.tables.lock().await.groups.get(&id).cloned())
    }

    async fn begin(&self) -> Result<Box<dyn StatsTransaction>, StoreError> {
        Self::trip(&self.fail_point, FailPoint::Begin)?;
        let guard = Arc::clone(&self.tables).lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            tables: guard,
            fail_point: Arc::clone(&self.fail_point),
            messages: Vec::new(),
            senders: HashMap::new(),
            groups: HashMap::new(),
        }))
    }

    async fn recent_messages(
        &self,
        group_id: Uuid,
        before: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let tables = self.tables.lock().await;

        let cursor = match before {
            Some(before_id) => match tables.messages.iter().find(|m| m.id == before_id) {
                Some(anchor) => Some((anchor.created_at, anchor.id)),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let mut page: Vec<MessageRecord> = tables
            .messages
            .iter()
            .filter(|m| m.group_id == group_id && !m.is_deleted)
            .filter(|m| match cursor {
                Some(cursor) => (m.created_at, m.id) < cursor,
                None => true,
            })
            .cloned()
            .collect();

        page.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        page.truncate(limit);

        // Resolve the sender address from the current sender record
        for message in &mut page {
            if let Some(sender) = tables.senders.get(&message.sender.id) {
                message.sender.address = sender.address.clone();
            }
        }
        Ok(page)
    }

    async fn soft_delete(&self, message_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables
            .messages
            .iter_mut()
            .find(|m| m.id == message_id && !m.is_deleted)
        {
            Some(message) => {
                message.is_deleted = true;
                Ok(Some(message.group_id))
            }
            None => Ok(None),
        }
    }

    async fn create_sender(&self, sender: &SenderAggregate) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.senders.contains_key(&sender.id)
            || tables.senders.values().any(|s| s.address == sender.address)
        {
            return Err(StoreError::Duplicate {
                kind: "sender",
                id: sender.id,
            });
        }
        tables.senders.insert(sender.id, sender.clone());
        Ok(())
    }

    async fn create_group(&self, group: &GroupAggregate) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.groups.contains_key(&group.id) {
            return Err(StoreError::Duplicate {
                kind: "group",
                id: group.id,
            });
        }
        tables.groups.insert(group.id, group.clone());
        Ok(())
    }
}

/// Transaction over a [`MemoryStore`]
struct MemoryTransaction {
    tables: OwnedMutexGuard<Tables>,
    fail_point: Arc<StdMutex<Option<FailPoint>>>,
    messages: Vec<MessageRecord>,
    senders: HashMap<Uuid, SenderAggregate>,
    groups: HashMap<Uuid, GroupAggregate>,
}

#[async_trait]
impl StatsTransaction for MemoryTransaction {
    async fn lock_sender(&mut self, id: Uuid) -> Result<Option<SenderAggregate>, StoreError> {
        Ok(self
            .senders
            .get(&id)
            .or_else(|| self.tables.senders.get(&id))
            .cloned())
    }

    async fn lock_group(&mut self, id: Uuid) -> Result<Option<GroupAggregate>, StoreError> {
        Ok(self
            .groups
            .get(&id)
            .or_else(|| self.tables.groups.get(&id))
            .cloned())
    }

    async fn insert_message(&mut self, record: &MessageRecord) -> Result<(), StoreError> {
        MemoryStore::trip(&self.fail_point, FailPoint::InsertMessage)?;
        if self.tables.messages.iter().chain(&self.messages).any(|m| m.id == record.id) {
            return Err(StoreError::Duplicate {
                kind: "message",
                id: record.id,
            });
        }
        self.messages.push(record.clone());
        Ok(())
    }

    async fn update_sender(&mut self, sender: &SenderAggregate) -> Result<(), StoreError> {
        MemoryStore::trip(&self.fail_point, FailPoint::UpdateSender)?;
        self.senders.insert(sender.id, sender.clone());
        Ok(())
    }

    async fn update_group(&mut self, group: &GroupAggregate) -> Result<(), StoreError> {
        MemoryStore::trip(&self.fail_point, FailPoint::UpdateGroup)?;
        self.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        MemoryStore::trip(&self.fail_point, FailPoint::Commit)?;
        let MemoryTransaction {
            mut tables,
            messages,
            senders,
            groups,
            ..
        } = *self;
        tables.messages.extend(messages);
        tables.senders.extend(senders);
        tables.groups.extend(groups);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
