//! Transactional Document Store
//!
//! The pipeline persists messages and the sender/group aggregates they feed
//! through the [`StatsStore`] capability. Writes happen only inside a
//! [`StatsTransaction`]: either every staged change is committed or none is.
//!
//! # Implementations
//!
//! - **`postgres`** - `PgStore`, sqlx over PostgreSQL, row locks with
//!   `SELECT ... FOR UPDATE`
//! - **`memory`** - `MemoryStore`, one in-process lock per transaction, with
//!   fail points for exercising aborts
//!
//! # Lock Order
//!
//! A transaction locks the sender row before the group row. Every commit
//! follows that order, so two commits touching the same sender or group wait
//! on each other instead of deadlocking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::shared::message::MessageRecord;

/// In-process store
pub mod memory;

/// PostgreSQL store
pub mod postgres;

pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgStore;

/// Number of entries kept on a group leaderboard
pub const LEADERBOARD_SIZE: usize = 10;

/// Errors raised by a store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("duplicate {kind} {id}")]
    Duplicate { kind: &'static str, id: Uuid },

    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

/// Token and engagement statistics of one sender
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SenderAggregate {
    pub id: Uuid,
    pub address: String,
    pub token_balance: f64,
    pub staking_amount: f64,
    /// 0-100, only ever raised by commits
    pub reputation: f64,
    pub total_messages: i64,
    /// Running mean of content quality over `total_messages`
    pub average_message_quality: f64,
    pub last_active: DateTime<Utc>,
}

impl SenderAggregate {
    /// Fresh sender with no history
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            address: address.into(),
            token_balance: 0.0,
            staking_amount: 0.0,
            reputation: 0.0,
            total_messages: 0,
            average_message_quality: 0.0,
            last_active: Utc::now(),
        }
    }

    pub fn with_stake(mut self, staking_amount: f64) -> Self {
        self.staking_amount = staking_amount;
        self
    }

    pub fn with_reputation(mut self, reputation: f64) -> Self {
        self.reputation = reputation.clamp(0.0, 100.0);
        self
    }
}

/// One leaderboard row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub user_id: Uuid,
    pub score: f64,
}

/// Message and contribution statistics of one group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupAggregate {
    pub id: Uuid,
    pub name: String,
    pub total_messages: i64,
    /// Sum of the quality scores of committed messages
    pub tokens_distributed: f64,
    /// Sorted by score, highest first, at most [`LEADERBOARD_SIZE`] rows
    pub top_contributors: Vec<Contributor>,
}

impl GroupAggregate {
    /// Fresh group with no messages
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            total_messages: 0,
            tokens_distributed: 0.0,
            top_contributors: Vec::new(),
        }
    }
}

/// Persistent home of messages and aggregates
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Read a sender outside any transaction
    async fn find_sender(&self, id: Uuid) -> Result<Option<SenderAggregate>, StoreError>;

    /// Read a group outside any transaction
    async fn find_group(&self, id: Uuid) -> Result<Option<GroupAggregate>, StoreError>;

    /// Open a transaction
    async fn begin(&self) -> Result<Box<dyn StatsTransaction>, StoreError>;

    /// Up to `limit` non-deleted messages of a group, newest first, strictly
    /// older than `before` when given. An unknown `before` yields an empty page.
    async fn recent_messages(
        &self,
        group_id: Uuid,
        before: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    /// Set the soft-delete flag, returning the message's group if it existed
    /// and was not deleted already
    async fn soft_delete(&self, message_id: Uuid) -> Result<Option<Uuid>, StoreError>;

    /// Provision a sender record
    async fn create_sender(&self, sender: &SenderAggregate) -> Result<(), StoreError>;

    /// Provision a group record
    async fn create_group(&self, group: &GroupAggregate) -> Result<(), StoreError>;
}

/// A unit of work against the store
///
/// Dropping a transaction without calling `commit` discards every staged
/// change.
#[async_trait]
pub trait StatsTransaction: Send {
    /// Read and lock a sender for the rest of the transaction
    async fn lock_sender(&mut self, id: Uuid) -> Result<Option<SenderAggregate>, StoreError>;

    /// Read and lock a group for the rest of the transaction
    async fn lock_group(&mut self, id: Uuid) -> Result<Option<GroupAggregate>, StoreError>;

    async fn insert_message(&mut self, record: &MessageRecord) -> Result<(), StoreError>;

    async fn update_sender(&mut self, sender: &SenderAggregate) -> Result<(), StoreError>;

    async fn update_group(&mut self, group: &GroupAggregate) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
