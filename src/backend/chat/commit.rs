/**
 * Stats Commit Transaction
 *
 * Persists one analysed message together with the sender and group
 * aggregates it feeds. Inside a single store transaction:
 *
 * 1. Lock the sender, then the group (both must exist)
 * 2. Insert the message record
 * 3. Update the sender aggregate
 * 4. Update the group aggregate and its leaderboard
 *
 * Spam is screened before the transaction opens, so a rejected message never
 * touches the store. Any failure after `begin` rolls the transaction back and
 * the caller gets the error, never a partial record.
 */
use crate::backend::chat::error::PipelineError;
use crate::backend::store::{
    Contributor, GroupAggregate, SenderAggregate, StatsStore, StatsTransaction, LEADERBOARD_SIZE,
};
use crate::shared::analysis::AnalysisResult;
use crate::shared::message::{MessageRecord, SenderRef};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Credit a committed message to its sender
pub(crate) fn apply_to_sender(
    sender: &mut SenderAggregate,
    quality: f64,
    reward: f64,
    now: DateTime<Utc>,
) {
    sender.token_balance += reward;
    sender.total_messages += 1;
    let total = sender.total_messages as f64;
    sender.average_message_quality =
        (sender.average_message_quality * (total - 1.0) + quality) / total;
    sender.reputation = (sender.reputation + reward / 10.0).clamp(0.0, 100.0);
    sender.last_active = now;
}

/// Credit a committed message to its group
///
/// `tokens_distributed` and leaderboard scores accumulate the quality score,
/// not the token reward.
pub(crate) fn apply_to_group(group: &mut GroupAggregate, sender_id: Uuid, quality: f64) {
    group.total_messages += 1;
    group.tokens_distributed += quality;

    match group
        .top_contributors
        .iter_mut()
        .find(|contributor| contributor.user_id == sender_id)
    {
        Some(contributor) => contributor.score += quality,
        None => group.top_contributors.push(Contributor {
            user_id: sender_id,
            score: quality,
        }),
    }

    // Stable, so equal scores keep their previous order
    group
        .top_contributors
        .sort_by(|a, b| b.score.total_cmp(&a.score));
    group.top_contributors.truncate(LEADERBOARD_SIZE);
}

/// Atomic writer of messages and their aggregates
#[derive(Clone)]
pub struct StatsCommitter {
    store: Arc<dyn StatsStore>,
    spam_threshold: f64,
}

impl StatsCommitter {
    pub fn new(store: Arc<dyn StatsStore>, spam_threshold: f64) -> Self {
        Self {
            store,
            spam_threshold,
        }
    }

    /// Reject an analysis whose spam likelihood is above the threshold
    pub fn screen(&self, analysis: &AnalysisResult) -> Result<(), PipelineError> {
        if analysis.is_spam(self.spam_threshold) {
            return Err(PipelineError::SpamRejected {
                spam_score: analysis.spam_score,
            });
        }
        Ok(())
    }

    /// Persist `text` with its analysis and reward
    pub async fn commit(
        &self,
        text: &str,
        analysis: &AnalysisResult,
        reward: f64,
        sender_id: Uuid,
        group_id: Uuid,
    ) -> Result<MessageRecord, PipelineError> {
        self.screen(analysis)?;

        let mut tx = self.store.begin().await?;
        match Self::apply(&mut tx, text, analysis, reward, sender_id, group_id).await {
            Ok(record) => {
                tx.commit().await?;
                tracing::debug!(
                    "[Commit] Message {} committed for sender {} in group {} ({} tokens)",
                    record.id,
                    sender_id,
                    group_id,
                    reward
                );
                Ok(record)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("[Commit] Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn apply(
        tx: &mut Box<dyn StatsTransaction>,
        text: &str,
        analysis: &AnalysisResult,
        reward: f64,
        sender_id: Uuid,
        group_id: Uuid,
    ) -> Result<MessageRecord, PipelineError> {
        let mut sender = tx
            .lock_sender(sender_id)
            .await?
            .ok_or_else(|| PipelineError::sender_not_found(sender_id))?;
        let mut group = tx
            .lock_group(group_id)
            .await?
            .ok_or_else(|| PipelineError::group_not_found(group_id))?;

        let now = Utc::now();
        let quality = analysis.quality;
        let record = MessageRecord {
            id: Uuid::new_v4(),
            message: text.to_string(),
            sender: SenderRef {
                id: sender.id,
                address: sender.address.clone(),
            },
            group_id,
            ai_score: quality,
            sentiment: analysis.sentiment,
            topics: analysis.topics.clone(),
            content_quality: quality,
            tokens_mined: reward,
            spam_score: analysis.spam_score,
            is_ai_generated: false,
            engagement_score: 0.0,
            is_deleted: false,
            response: analysis.response.clone(),
            created_at: now,
        };
        tx.insert_message(&record).await?;

        apply_to_sender(&mut sender, quality, reward, now);
        tx.update_sender(&sender).await?;

        apply_to_group(&mut group, sender_id, quality);
        tx.update_group(&group).await?;

        Ok(record)
    }
}
