/**
 * PostgreSQL Store
 *
 * `StatsStore` over a sqlx `PgPool`. Tables are created by the migrations
 * under `migrations/`.
 *
 * # Locking
 *
 * `lock_sender` and `lock_group` read with `SELECT ... FOR UPDATE`, so the
 * rows stay locked until the transaction commits or rolls back. A dropped
 * `PgTransaction` is rolled back by sqlx.
 *
 * # Immutability
 *
 * A trigger on `messages` rejects any update of the message text,
 * `tokens_mined` or `content_quality`; soft delete only touches `is_deleted`.
 */
use crate::backend::store::{
    Contributor, GroupAggregate, SenderAggregate, StatsStore, StatsTransaction, StoreError,
};
use crate::shared::message::{MessageRecord, SenderRef, Sentiment};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Postgres unique-violation SQLSTATE
const UNIQUE_VIOLATION: &str = "23505";

/// Store backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SenderRow {
    id: Uuid,
    address: String,
    token_balance: f64,
    staking_amount: f64,
    reputation: f64,
    total_messages: i64,
    average_message_quality: f64,
    last_active: DateTime<Utc>,
}

impl From<SenderRow> for SenderAggregate {
    fn from(row: SenderRow) -> Self {
        Self {
            id: row.id,
            address: row.address,
            token_balance: row.token_balance,
            staking_amount: row.staking_amount,
            reputation: row.reputation,
            total_messages: row.total_messages,
            average_message_quality: row.average_message_quality,
            last_active: row.last_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GroupRow {
    id: Uuid,
    name: String,
    total_messages: i64,
    tokens_distributed: f64,
    top_contributors: Json<Vec<Contributor>>,
}

impl From<GroupRow> for GroupAggregate {
    fn from(row: GroupRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            total_messages: row.total_messages,
            tokens_distributed: row.tokens_distributed,
            top_contributors: row.top_contributors.0,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    message: String,
    sender_id: Uuid,
    sender_address: String,
    group_id: Uuid,
    ai_score: f64,
    sentiment: String,
    topics: Vec<String>,
    content_quality: f64,
    tokens_mined: f64,
    spam_score: f64,
    is_ai_generated: bool,
    engagement_score: f64,
    is_deleted: bool,
    response: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for MessageRecord {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let sentiment = row
            .sentiment
            .parse::<Sentiment>()
            .map_err(|e| StoreError::Corrupt(format!("message {}: {}", row.id, e)))?;
        Ok(Self {
            id: row.id,
            message: row.message,
            sender: SenderRef {
                id: row.sender_id,
                address: row.sender_address,
            },
            group_id: row.group_id,
            ai_score: row.ai_score,
            sentiment,
            topics: row.topics,
            content_quality: row.content_quality,
            tokens_mined: row.tokens_mined,
            spam_score: row.spam_score,
            is_ai_generated: row.is_ai_generated,
            engagement_score: row.engagement_score,
            is_deleted: row.is_deleted,
            response: row.response,
            created_at: row.created_at,
        })
    }
}

fn map_unique(e: sqlx::Error, kind: &'static str, id: Uuid) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Duplicate { kind, id }
        }
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl StatsStore for PgStore {
    async fn find_sender(&self, id: Uuid) -> Result<Option<SenderAggregate>, StoreError> {
        let row = sqlx::query_as::<_, SenderRow>(
            r#"
            SELECT id, address, token_balance, staking_amount, reputation,
                   total_messages, average_message_quality, last_active
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SenderAggregate::from))
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<GroupAggregate>, StoreError> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, total_messages, tokens_distributed, top_contributors
            FROM groups
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(GroupAggregate::from))
    }

    async fn begin(&self) -> Result<Box<dyn StatsTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn recent_messages(
        &self,
        group_id: Uuid,
        before: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        // Row comparison against an empty subquery is NULL, so an unknown
        // cursor selects nothing
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.message, m.sender_id, u.address AS sender_address, m.group_id,
                   m.ai_score, m.sentiment, m.topics, m.content_quality, m.tokens_mined,
                   m.spam_score, m.is_ai_generated, m.engagement_score, m.is_deleted,
                   m.response, m.created_at
            FROM messages m
            JOIN users u ON u.id = m.sender_id
            WHERE m.group_id = $1
              AND m.is_deleted = FALSE
              AND ($2::uuid IS NULL OR (m.created_at, m.id) <
                   (SELECT c.created_at, c.id FROM messages c WHERE c.id = $2))
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $3
            "#,
        )
        .bind(group_id)
        .bind(before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MessageRecord::try_from).collect()
    }

    async fn soft_delete(&self, message_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let group_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE messages
            SET is_deleted = TRUE
            WHERE id = $1 AND is_deleted = FALSE
            RETURNING group_id
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group_id)
    }

    async fn create_sender(&self, sender: &SenderAggregate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, address, token_balance, staking_amount, reputation,
                               total_messages, average_message_quality, last_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(sender.id)
        .bind(&sender.address)
        .bind(sender.token_balance)
        .bind(sender.staking_amount)
        .bind(sender.reputation)
        .bind(sender.total_messages)
        .bind(sender.average_message_quality)
        .bind(sender.last_active)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "sender", sender.id))?;

        Ok(())
    }

    async fn create_group(&self, group: &GroupAggregate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO groups (id, name, total_messages, tokens_distributed, top_contributors)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(group.total_messages)
        .bind(group.tokens_distributed)
        .bind(Json(&group.top_contributors))
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "group", group.id))?;

        Ok(())
    }
}

/// Open sqlx transaction
struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StatsTransaction for PgTransaction {
    async fn lock_sender(&mut self, id: Uuid) -> Result<Option<SenderAggregate>, StoreError> {
        let row = sqlx::query_as::<_, SenderRow>(
            r#"
            SELECT id, address, token_balance, staking_amount, reputation,
                   total_messages, average_message_quality, last_active
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(SenderAggregate::from))
    }

    async fn lock_group(&mut self, id: Uuid) -> Result<Option<GroupAggregate>, StoreError> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, total_messages, tokens_distributed, top_contributors
            FROM groups
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(GroupAggregate::from))
    }

    async fn insert_message(&mut self, record: &MessageRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, message, sender_id, group_id, ai_score, sentiment, topics,
                                  content_quality, tokens_mined, spam_score, is_ai_generated,
                                  engagement_score, is_deleted, response, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(record.id)
        .bind(&record.message)
        .bind(record.sender.id)
        .bind(record.group_id)
        .bind(record.ai_score)
        .bind(record.sentiment.as_str())
        .bind(&record.topics)
        .bind(record.content_quality)
        .bind(record.tokens_mined)
        .bind(record.spam_score)
        .bind(record.is_ai_generated)
        .bind(record.engagement_score)
        .bind(record.is_deleted)
        .bind(&record.response)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, "message", record.id))?;

        Ok(())
    }

    async fn update_sender(&mut self, sender: &SenderAggregate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET token_balance = $2,
                reputation = $3,
                total_messages = $4,
                average_message_quality = $5,
                last_active = $6
            WHERE id = $1
            "#,
        )
        .bind(sender.id)
        .bind(sender.token_balance)
        .bind(sender.reputation)
        .bind(sender.total_messages)
        .bind(sender.average_message_quality)
        .bind(sender.last_active)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_group(&mut self, group: &GroupAggregate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE groups
            SET total_messages = $2,
                tokens_distributed = $3,
                top_contributors = $4
            WHERE id = $1
            "#,
        )
        .bind(group.id)
        .bind(group.total_messages)
        .bind(group.tokens_distributed)
        .bind(Json(&group.top_contributors))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
