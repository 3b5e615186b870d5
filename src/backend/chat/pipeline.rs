/**
 * Message Ingestion Pipeline
 *
 * Wires the pipeline stages together:
 *
 * ```text
 * submit ─► rate limiter ─► batcher ─► analysis ─► spam screen ─► reward
 *                                                      │
 *        ◄─ record or PipelineError ◄─ invalidation ◄─ commit
 * ```
 *
 * `ChatPipeline` is the caller-facing entry point. `MessageProcessor` is the
 * per-message work each drain runs for its claimed submissions.
 */
use crate::backend::analysis::{AnalysisGateway, AnalysisOracle};
use crate::backend::cache::{CacheInvalidator, CacheStore};
use crate::backend::chat::batcher::{
    Batcher, BatcherHandle, Submission, SubmissionProcessor, SubmissionResult,
};
use crate::backend::chat::commit::StatsCommitter;
use crate::backend::chat::error::PipelineError;
use crate::backend::chat::history::HistoryService;
use crate::backend::ratelimit::RateLimiter;
use crate::backend::reward::RewardEngine;
use crate::backend::store::{StatsStore, StoreError};
use crate::shared::config::PipelineConfig;
use crate::shared::message::{validate_text, MessageRecord};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Analysis, reward, commit and invalidation for one submission
pub struct MessageProcessor {
    gateway: Arc<AnalysisGateway>,
    rewards: RewardEngine,
    store: Arc<dyn StatsStore>,
    committer: StatsCommitter,
    invalidator: CacheInvalidator,
}

impl MessageProcessor {
    pub fn new(
        gateway: Arc<AnalysisGateway>,
        rewards: RewardEngine,
        store: Arc<dyn StatsStore>,
        committer: StatsCommitter,
        invalidator: CacheInvalidator,
    ) -> Self {
        Self {
            gateway,
            rewards,
            store,
            committer,
            invalidator,
        }
    }
}

#[async_trait]
impl SubmissionProcessor for MessageProcessor {
    async fn process(&self, submission: Submission) -> SubmissionResult {
        let Submission {
            sender_id,
            group_id,
            text,
        } = submission;

        let analysis = self.gateway.analyze(&text).await;
        if let Err(e) = self.committer.screen(&analysis) {
            tracing::info!("[Pipeline] Rejected message from {}: {}", sender_id, e);
            return Err(e);
        }

        let sender = self
            .store
            .find_sender(sender_id)
            .await?
            .ok_or_else(|| PipelineError::sender_not_found(sender_id))?;

        // Engagement is not known at submission time
        let reward = self
            .rewards
            .reward(analysis.quality, 0.0, sender.staking_amount, sender.reputation)
            .await;

        let record = match self
            .committer
            .commit(&text, &analysis, reward, sender_id, group_id)
            .await
        {
            Ok(record) => record,
            Err(PipelineError::CommitFailed(e)) => {
                tracing::error!(
                    "[Pipeline] Commit failed for sender {} in group {}: {}",
                    sender_id,
                    group_id,
                    e
                );
                return Err(PipelineError::CommitFailed(e));
            }
            Err(e) => {
                tracing::info!("[Pipeline] Rejected message from {}: {}", sender_id, e);
                return Err(e);
            }
        };

        self.invalidator.invalidate_group(group_id).await;
        self.invalidator.invalidate_user(sender_id).await;

        tracing::info!(
            "[Pipeline] Message {} committed: quality {}, {} tokens",
            record.id,
            record.content_quality,
            record.tokens_mined
        );
        Ok(record)
    }
}

/// Caller-facing message pipeline
#[derive(Clone)]
pub struct ChatPipeline {
    limiter: RateLimiter,
    batcher: Arc<Batcher>,
    gateway: Arc<AnalysisGateway>,
    store: Arc<dyn StatsStore>,
    cache: Arc<dyn CacheStore>,
    history: HistoryService,
    invalidator: CacheInvalidator,
    tick_interval: Duration,
}

impl ChatPipeline {
    /// Build every stage from `config`
    pub fn new(
        config: &PipelineConfig,
        oracle: Arc<dyn AnalysisOracle>,
        cache: Arc<dyn CacheStore>,
        store: Arc<dyn StatsStore>,
    ) -> Self {
        let gateway = Arc::new(AnalysisGateway::new(
            oracle,
            Arc::clone(&cache),
            config.analysis_cache_ttl,
            config.oracle_timeout,
        ));
        let invalidator = CacheInvalidator::new(Arc::clone(&cache));
        let processor = MessageProcessor::new(
            Arc::clone(&gateway),
            RewardEngine::new(Arc::clone(&cache), config.reward_cache_ttl),
            Arc::clone(&store),
            StatsCommitter::new(Arc::clone(&store), config.spam_threshold),
            invalidator.clone(),
        );
        let batcher = Arc::new(Batcher::new(
            Arc::new(processor),
            config.batch_size,
            config.max_queue_depth,
        ));
        let history = HistoryService::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            invalidator.clone(),
            config.history_cache_ttl,
            config.history_page_size,
        );

        Self {
            limiter: RateLimiter::new(config.rate_limit_max, config.rate_limit_window),
            batcher,
            gateway,
            store,
            cache,
            history,
            invalidator,
            tick_interval: config.tick_interval,
        }
    }

    /// Start the periodic batch drain
    pub fn start(&self) -> BatcherHandle {
        Arc::clone(&self.batcher).spawn(self.tick_interval)
    }

    /// Submit a message and wait for its committed record
    pub async fn submit(
        &self,
        sender_id: Uuid,
        group_id: Uuid,
        text: impl Into<String>,
    ) -> Result<MessageRecord, PipelineError> {
        let text = text.into();
        validate_text(&text)?;

        if !self.limiter.allow(sender_id) {
            tracing::info!("[Pipeline] Rate limited sender {}", sender_id);
            return Err(PipelineError::RateLimited);
        }

        self.batcher
            .submit(Submission {
                sender_id,
                group_id,
                text,
            })
            .await
    }

    /// One page of a group's history, newest first
    pub async fn load_history(
        &self,
        group_id: Uuid,
        before: Option<Uuid>,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        self.history.load(group_id, before).await
    }

    /// Soft-delete a message, returning its group when something was deleted
    pub async fn delete_message(&self, message_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let group_id = self.store.soft_delete(message_id).await?;
        if let Some(group_id) = group_id {
            self.invalidator.invalidate_group(group_id).await;
            tracing::info!("[Pipeline] Message {} deleted from group {}", message_id, group_id);
        }
        Ok(group_id)
    }

    pub fn store(&self) -> &Arc<dyn StatsStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn queue_depth(&self) -> usize {
        self.batcher.queue_depth()
    }

    /// Analyses that used the fallback since startup
    pub fn degraded_analyses(&self) -> u64 {
        self.gateway.degraded_count()
    }
}
