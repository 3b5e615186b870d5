//! Database test fixtures
//!
//! Postgres tests run only when `DATABASE_URL` is set. Each test creates its
//! own sender and group with fresh ids, so runs can share one database
//! without truncating it.

use chatmint::backend::store::{GroupAggregate, PgStore, SenderAggregate, StatsStore};
use sqlx::PgPool;

/// Connect and migrate, or `None` when no database is configured
pub async fn pg_store() -> Option<PgStore> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres test");
        return None;
    };

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to create test database pool");
    let store = PgStore::new(pool);
    store.migrate().await.expect("Failed to run migrations");
    Some(store)
}

/// Insert a sender and a group unique to the calling test
pub async fn seed(store: &PgStore) -> (SenderAggregate, GroupAggregate) {
    let sender = SenderAggregate::new(format!("0x{}", uuid::Uuid::new_v4().simple()))
        .with_stake(50.0)
        .with_reputation(20.0);
    let group = GroupAggregate::new("pg-rustaceans");
    store.create_sender(&sender).await.unwrap();
    store.create_group(&group).await.unwrap();
    (sender, group)
}
