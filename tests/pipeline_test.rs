//! Pipeline integration tests
//!
//! Drive `ChatPipeline` end to end over the in-memory store and cache.

mod common;

use assert_matches::assert_matches;
use chatmint::backend::analysis::DisabledOracle;
use chatmint::backend::cache::{history_key, CacheStore};
use chatmint::backend::chat::PipelineError;
use chatmint::backend::store::{FailPoint, SenderAggregate, StatsStore};
use chatmint::shared::config::PipelineConfig;
use chatmint::shared::message::Sentiment;
use common::{pipeline, seeded_store, test_config, KeywordOracle, SPAM_MARKER};
use futures_util::future::join_all;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

async fn wait_for_depth(pipeline: &chatmint::backend::chat::ChatPipeline, depth: usize) {
    while pipeline.queue_depth() < depth {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_submit_rewards_and_updates_aggregates() {
    let seeded = seeded_store().await;
    let (pipeline, _cache) = pipeline(&test_config(), KeywordOracle::new(), &seeded.store);
    let drainer = pipeline.start();

    let record = pipeline
        .submit(seeded.sender.id, seeded.group.id, "Ownership makes sense now")
        .await
        .unwrap();

    assert_eq!(record.tokens_mined, 1.3);
    assert_eq!(record.content_quality, 80.0);
    assert_eq!(record.ai_score, 80.0);
    assert_eq!(record.sentiment, Sentiment::Positive);
    assert_eq!(record.topics, vec!["rust".to_string(), "chat".to_string()]);
    assert_eq!(record.response, "Nice!");
    assert_eq!(record.sender.address, "0xa11ce");
    assert!(!record.is_deleted);

    let sender = seeded.store.find_sender(seeded.sender.id).await.unwrap().unwrap();
    assert_eq!(sender.total_messages, 1);
    assert_eq!(sender.token_balance, 1.3);
    assert_eq!(sender.average_message_quality, 80.0);
    assert!((sender.reputation - 0.13).abs() < 1e-9);

    let group = seeded.store.find_group(seeded.group.id).await.unwrap().unwrap();
    assert_eq!(group.total_messages, 1);
    assert_eq!(group.tokens_distributed, 80.0);
    assert_eq!(group.top_contributors.len(), 1);
    assert_eq!(group.top_contributors[0].user_id, seeded.sender.id);
    assert_eq!(group.top_contributors[0].score, 80.0);

    assert_eq!(seeded.store.message(record.id).await, Some(record));
    drainer.stop().await;
}

#[tokio::test]
async fn test_spam_is_rejected_without_touching_the_store() {
    let seeded = seeded_store().await;
    let (pipeline, _cache) = pipeline(&test_config(), KeywordOracle::new(), &seeded.store);
    let drainer = pipeline.start();

    let result = pipeline
        .submit(seeded.sender.id, seeded.group.id, format!("{} cheap tokens", SPAM_MARKER))
        .await;

    assert_matches!(result, Err(PipelineError::SpamRejected { spam_score }) if spam_score == 95.0);
    assert_eq!(seeded.store.message_count().await, 0);
    assert_eq!(
        seeded.store.find_sender(seeded.sender.id).await.unwrap(),
        Some(seeded.sender.clone())
    );
    assert_eq!(
        seeded.store.find_group(seeded.group.id).await.unwrap(),
        Some(seeded.group.clone())
    );
    drainer.stop().await;
}

#[tokio::test]
async fn test_unknown_references_are_reported() {
    let seeded = seeded_store().await;
    let (pipeline, _cache) = pipeline(&test_config(), KeywordOracle::new(), &seeded.store);
    let drainer = pipeline.start();

    let stranger = Uuid::new_v4();
    let result = pipeline.submit(stranger, seeded.group.id, "hello").await;
    assert_matches!(
        result,
        Err(PipelineError::ReferenceNotFound { entity: "sender", id }) if id == stranger
    );

    let nowhere = Uuid::new_v4();
    let result = pipeline.submit(seeded.sender.id, nowhere, "hello").await;
    assert_matches!(
        result,
        Err(PipelineError::ReferenceNotFound { entity: "group", id }) if id == nowhere
    );

    assert_eq!(seeded.store.message_count().await, 0);
    drainer.stop().await;
}

#[tokio::test]
async fn test_unavailable_oracle_degrades_to_fallback() {
    let seeded = seeded_store().await;
    let (pipeline, _cache) = pipeline(&test_config(), Arc::new(DisabledOracle), &seeded.store);
    let drainer = pipeline.start();

    let record = pipeline
        .submit(seeded.sender.id, seeded.group.id, "anyone around?")
        .await
        .unwrap();

    assert_eq!(record.content_quality, 50.0);
    assert_eq!(record.sentiment, Sentiment::Neutral);
    assert!(record.topics.is_empty());
    assert_eq!(record.spam_score, 0.0);
    assert_eq!(record.tokens_mined, 1.0);
    assert_eq!(pipeline.degraded_analyses(), 1);
    drainer.stop().await;
}

#[tokio::test]
async fn test_identical_messages_share_one_analysis() {
    let seeded = seeded_store().await;
    let oracle = KeywordOracle::new();
    let (pipeline, _cache) = pipeline(&test_config(), oracle.clone(), &seeded.store);
    let drainer = pipeline.start();

    let first = pipeline.submit(seeded.sender.id, seeded.group.id, "gm").await.unwrap();
    let second = pipeline.submit(seeded.sender.id, seeded.group.id, "gm").await.unwrap();

    assert_eq!(oracle.calls(), 1);
    assert_ne!(first.id, second.id);
    assert_eq!(first.content_quality, second.content_quality);
    drainer.stop().await;
}

#[tokio::test]
async fn test_failed_commit_persists_nothing() {
    let seeded = seeded_store().await;
    let (pipeline, cache) = pipeline(&test_config(), KeywordOracle::new(), &seeded.store);
    let drainer = pipeline.start();

    // Warm the history cache so the failed commit has something to leave alone
    assert!(pipeline.load_history(seeded.group.id, None).await.unwrap().is_empty());
    seeded.store.fail_at(FailPoint::UpdateGroup);

    let result = pipeline
        .submit(seeded.sender.id, seeded.group.id, "this one will not land")
        .await;

    assert_matches!(result, Err(PipelineError::CommitFailed(_)));
    assert_eq!(seeded.store.message_count().await, 0);
    assert_eq!(
        seeded.store.find_sender(seeded.sender.id).await.unwrap(),
        Some(seeded.sender.clone())
    );
    assert_eq!(
        seeded.store.find_group(seeded.group.id).await.unwrap(),
        Some(seeded.group.clone())
    );
    assert!(cache
        .get(&history_key(seeded.group.id, None))
        .await
        .unwrap()
        .is_some());

    // The fail point is one-shot
    let record = pipeline
        .submit(seeded.sender.id, seeded.group.id, "second try")
        .await
        .unwrap();
    assert_eq!(seeded.store.message_count().await, 1);
    assert_eq!(record.message, "second try");
    drainer.stop().await;
}

#[tokio::test]
async fn test_commit_invalidates_cached_history() {
    let seeded = seeded_store().await;
    let (pipeline, _cache) = pipeline(&test_config(), KeywordOracle::new(), &seeded.store);
    let drainer = pipeline.start();

    assert!(pipeline.load_history(seeded.group.id, None).await.unwrap().is_empty());

    let record = pipeline
        .submit(seeded.sender.id, seeded.group.id, "first!")
        .await
        .unwrap();

    let page = pipeline.load_history(seeded.group.id, None).await.unwrap();
    assert_eq!(page, vec![record]);
    drainer.stop().await;
}

#[tokio::test]
async fn test_deleted_message_leaves_history() {
    let seeded = seeded_store().await;
    let (pipeline, _cache) = pipeline(&test_config(), KeywordOracle::new(), &seeded.store);
    let drainer = pipeline.start();

    let keep = pipeline.submit(seeded.sender.id, seeded.group.id, "keep me").await.unwrap();
    let drop = pipeline.submit(seeded.sender.id, seeded.group.id, "drop me").await.unwrap();
    assert_eq!(pipeline.load_history(seeded.group.id, None).await.unwrap().len(), 2);

    assert_eq!(pipeline.delete_message(drop.id).await.unwrap(), Some(seeded.group.id));
    assert_eq!(pipeline.delete_message(Uuid::new_v4()).await.unwrap(), None);

    let page = pipeline.load_history(seeded.group.id, None).await.unwrap();
    assert_eq!(page, vec![keep]);

    // Rewards stay with the sender
    let sender = seeded.store.find_sender(seeded.sender.id).await.unwrap().unwrap();
    assert_eq!(sender.total_messages, 2);
    drainer.stop().await;
}

#[tokio::test]
async fn test_sixth_submission_in_window_is_rate_limited() {
    let seeded = seeded_store().await;
    let config = PipelineConfig::builder()
        .rate_limit(5, Duration::from_secs(1))
        .build()
        .unwrap();
    let (pipeline, _cache) = pipeline(&config, KeywordOracle::new(), &seeded.store);
    let drainer = pipeline.start();

    let results = join_all(
        (0..6).map(|i| pipeline.submit(seeded.sender.id, seeded.group.id, format!("msg {}", i))),
    )
    .await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 5);
    assert_matches!(results[5], Err(PipelineError::RateLimited));

    // Another sender has its own window
    let other = SenderAggregate::new("0xb0b");
    seeded.store.create_sender(&other).await.unwrap();
    assert!(pipeline.submit(other.id, seeded.group.id, "hi").await.is_ok());
    drainer.stop().await;
}

#[tokio::test]
async fn test_rate_limit_recovers_after_window() {
    let seeded = seeded_store().await;
    let config = PipelineConfig::builder()
        .rate_limit(1, Duration::from_millis(200))
        .tick_interval(Duration::from_millis(10))
        .build()
        .unwrap();
    let (pipeline, _cache) = pipeline(&config, KeywordOracle::new(), &seeded.store);
    let drainer = pipeline.start();

    assert!(pipeline.submit(seeded.sender.id, seeded.group.id, "one").await.is_ok());
    assert_matches!(
        pipeline.submit(seeded.sender.id, seeded.group.id, "two").await,
        Err(PipelineError::RateLimited)
    );

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(pipeline.submit(seeded.sender.id, seeded.group.id, "three").await.is_ok());
    drainer.stop().await;
}

#[tokio::test]
async fn test_invalid_text_is_rejected_before_queueing() {
    let seeded = seeded_store().await;
    let (pipeline, _cache) = pipeline(&test_config(), KeywordOracle::new(), &seeded.store);

    let result = pipeline.submit(seeded.sender.id, seeded.group.id, "   ").await;
    assert_matches!(result, Err(PipelineError::InvalidMessage(_)));
    assert_eq!(pipeline.queue_depth(), 0);
}

#[tokio::test]
async fn test_twelve_submissions_commit_in_arrival_order() {
    let seeded = seeded_store().await;
    let (pipeline, _cache) = pipeline(&test_config(), KeywordOracle::new(), &seeded.store);

    let mut pending = Vec::new();
    for i in 0..12 {
        let p = pipeline.clone();
        let (sender_id, group_id) = (seeded.sender.id, seeded.group.id);
        pending.push(tokio::spawn(async move {
            p.submit(sender_id, group_id, format!("message {}", i)).await
        }));
        wait_for_depth(&pipeline, i + 1).await;
    }

    let drainer = pipeline.start();
    let mut records = Vec::new();
    for handle in pending {
        records.push(handle.await.unwrap().unwrap());
    }

    // The last two were claimed by a later drain than the first ten
    let first_batch_latest = records[..10].iter().map(|r| r.created_at).max().unwrap();
    assert!(records[10..].iter().all(|r| r.created_at >= first_batch_latest));

    let group = seeded.store.find_group(seeded.group.id).await.unwrap().unwrap();
    assert_eq!(group.total_messages, 12);
    assert_eq!(seeded.store.message_count().await, 12);
    drainer.stop().await;
}

#[tokio::test]
async fn test_full_queue_rejects_new_submissions() {
    let seeded = seeded_store().await;
    let config = PipelineConfig::builder()
        .rate_limit(100, Duration::from_secs(1))
        .max_queue_depth(Some(2))
        .build()
        .unwrap();
    let (pipeline, _cache) = pipeline(&config, KeywordOracle::new(), &seeded.store);

    let mut pending = Vec::new();
    for i in 0..2 {
        let p = pipeline.clone();
        let (sender_id, group_id) = (seeded.sender.id, seeded.group.id);
        pending.push(tokio::spawn(async move {
            p.submit(sender_id, group_id, format!("queued {}", i)).await
        }));
        wait_for_depth(&pipeline, i + 1).await;
    }

    let result = pipeline.submit(seeded.sender.id, seeded.group.id, "overflow").await;
    assert_matches!(result, Err(PipelineError::QueueFull));

    // Queued work still completes once draining starts
    let drainer = pipeline.start();
    for handle in pending {
        assert!(handle.await.unwrap().is_ok());
    }
    drainer.stop().await;
}

#[tokio::test]
async fn test_submissions_after_shutdown_are_refused() {
    let seeded = seeded_store().await;
    let (pipeline, _cache) = pipeline(&test_config(), KeywordOracle::new(), &seeded.store);

    pipeline.start().stop().await;

    let result = pipeline.submit(seeded.sender.id, seeded.group.id, "too late").await;
    assert_matches!(result, Err(PipelineError::ShuttingDown));
    assert_eq!(seeded.store.message_count().await, 0);
}
