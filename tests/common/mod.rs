//! Common test utilities
//!
//! Scripted oracles, seeded stores and pipeline builders shared by the
//! integration tests.

#![allow(dead_code)]

pub mod database;

use async_trait::async_trait;
use chatmint::backend::analysis::{AnalysisOracle, OracleError};
use chatmint::backend::cache::MemoryCache;
use chatmint::backend::chat::ChatPipeline;
use chatmint::backend::store::{GroupAggregate, MemoryStore, SenderAggregate, StatsStore};
use chatmint::shared::config::PipelineConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Marker that makes [`KeywordOracle`] rate a message as spam
pub const SPAM_MARKER: &str = "BUY NOW";

/// Oracle whose verdict depends on the message text
///
/// Messages containing [`SPAM_MARKER`] score spam 95; everything else scores
/// quality 80 and spam 5.
#[derive(Default)]
pub struct KeywordOracle {
    calls: AtomicUsize,
}

impl KeywordOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisOracle for KeywordOracle {
    fn id(&self) -> &str {
        "keyword"
    }

    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = if prompt.contains(SPAM_MARKER) {
            r#"```json
{"quality": 10, "sentiment": "negative", "topics": ["ads"], "response": "", "spamLikelihood": 95}
```"#
        } else {
            r#"{"quality": 80, "sentiment": "positive", "topics": ["rust", "chat"],
                "response": "Nice!", "spamLikelihood": 5}"#
        };
        Ok(reply.to_string())
    }
}

/// Store with one sender and one group
pub struct Seeded {
    pub store: MemoryStore,
    pub sender: SenderAggregate,
    pub group: GroupAggregate,
}

pub async fn seeded_store() -> Seeded {
    let store = MemoryStore::new();
    let sender = SenderAggregate::new("0xa11ce");
    let group = GroupAggregate::new("rustaceans");
    store.create_sender(&sender).await.unwrap();
    store.create_group(&group).await.unwrap();
    Seeded {
        store,
        sender,
        group,
    }
}

/// Configuration with a generous rate limit
pub fn test_config() -> PipelineConfig {
    PipelineConfig::builder()
        .rate_limit(100, Duration::from_secs(1))
        .oracle_timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

pub fn pipeline(
    config: &PipelineConfig,
    oracle: Arc<dyn AnalysisOracle>,
    store: &MemoryStore,
) -> (ChatPipeline, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let pipeline = ChatPipeline::new(config, oracle, cache.clone(), Arc::new(store.clone()));
    (pipeline, cache)
}
