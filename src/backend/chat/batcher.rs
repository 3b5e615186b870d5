/**
 * Submission Queue and Batch Drainer
 *
 * Submissions are appended to a FIFO buffer and answered through a oneshot
 * channel once processed. A periodic tick claims up to `batch_size` of the
 * oldest entries and processes them concurrently.
 *
 * # Claiming
 *
 * `claim_batch` splices the front of the buffer under the buffer's lock, so
 * an entry is claimed by exactly one drain and never lost.
 *
 * # Re-entrancy
 *
 * Each tick starts its drain on its own task. Only one drain may be active:
 * a drain that finds another in progress returns `DrainOutcome::Busy` and
 * leaves the buffer alone, so at most `batch_size` submissions are in
 * flight at any time.
 *
 * # Shutdown
 *
 * `BatcherHandle::stop` halts the ticker, waits for the active drain to
 * finish and answers every submission still buffered with
 * `PipelineError::ShuttingDown`. The closed flag lives under the buffer's
 * lock, so an enqueue either lands before the final drain or is refused.
 */
use crate::backend::chat::error::PipelineError;
use crate::shared::message::MessageRecord;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// One accepted message awaiting processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub sender_id: Uuid,
    pub group_id: Uuid,
    pub text: String,
}

/// Result delivered to a submitter
pub type SubmissionResult = Result<MessageRecord, PipelineError>;

/// Per-message work performed by a drain
#[async_trait]
pub trait SubmissionProcessor: Send + Sync {
    async fn process(&self, submission: Submission) -> SubmissionResult;
}

struct PendingSubmission {
    submission: Submission,
    reply: oneshot::Sender<SubmissionResult>,
}

/// What a single drain did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another drain was active
    Busy,
    /// Nothing was queued
    Idle,
    /// This many submissions were processed
    Processed(usize),
}

/// Clears the draining flag when a drain ends, including by panic
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct Buffer {
    entries: VecDeque<PendingSubmission>,
    closed: bool,
}

/// FIFO submission buffer with a single-drain batch processor
pub struct Batcher {
    queue: Mutex<Buffer>,
    draining: AtomicBool,
    processor: Arc<dyn SubmissionProcessor>,
    batch_size: usize,
    max_depth: Option<usize>,
}

impl Batcher {
    pub fn new(
        processor: Arc<dyn SubmissionProcessor>,
        batch_size: usize,
        max_depth: Option<usize>,
    ) -> Self {
        Self {
            queue: Mutex::new(Buffer::default()),
            draining: AtomicBool::new(false),
            processor,
            batch_size: batch_size.max(1),
            max_depth,
        }
    }

    fn lock_queue(&self) -> MutexGuard<'_, Buffer> {
        // The buffer is consistent after every operation, so a poisoned lock
        // still guards valid data
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a submission, returning the channel its result arrives on
    pub fn enqueue(
        &self,
        submission: Submission,
    ) -> Result<oneshot::Receiver<SubmissionResult>, PipelineError> {
        let mut queue = self.lock_queue();
        if queue.closed {
            return Err(PipelineError::ShuttingDown);
        }
        if let Some(max_depth) = self.max_depth {
            if queue.entries.len() >= max_depth {
                tracing::warn!(
                    "[Batcher] Queue full ({} pending), rejecting submission from {}",
                    queue.entries.len(),
                    submission.sender_id
                );
                return Err(PipelineError::QueueFull);
            }
        }

        let (reply, rx) = oneshot::channel();
        queue.entries.push_back(PendingSubmission { submission, reply });
        Ok(rx)
    }

    /// Enqueue and wait for the outcome
    pub async fn submit(&self, submission: Submission) -> SubmissionResult {
        let rx = self.enqueue(submission)?;
        rx.await.unwrap_or(Err(PipelineError::ShuttingDown))
    }

    /// Number of submissions waiting to be claimed
    pub fn queue_depth(&self) -> usize {
        self.lock_queue().entries.len()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    fn claim_batch(&self) -> Vec<PendingSubmission> {
        let mut queue = self.lock_queue();
        let take = queue.entries.len().min(self.batch_size);
        queue.entries.drain(..take).collect()
    }

    /// Claim and process one batch unless a drain is already running
    pub async fn drain_once(&self) -> DrainOutcome {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!("[Batcher] Drain already in progress, skipping tick");
            return DrainOutcome::Busy;
        }
        let _guard = DrainGuard(&self.draining);

        let batch = self.claim_batch();
        if batch.is_empty() {
            return DrainOutcome::Idle;
        }

        let count = batch.len();
        tracing::debug!("[Batcher] Processing batch of {}", count);

        join_all(batch.into_iter().map(|pending| async move {
            let result = self.processor.process(pending.submission).await;
            // The submitter may have gone away
            let _ = pending.reply.send(result);
        }))
        .await;

        DrainOutcome::Processed(count)
    }

    /// Answer every buffered submission with `ShuttingDown` and refuse new ones
    pub fn close(&self) -> usize {
        let pending: Vec<PendingSubmission> = {
            let mut queue = self.lock_queue();
            queue.closed = true;
            queue.entries.drain(..).collect()
        };
        let count = pending.len();
        for entry in pending {
            let _ = entry.reply.send(Err(PipelineError::ShuttingDown));
        }
        count
    }

    /// Start the periodic drain
    pub fn spawn(self: Arc<Self>, tick: Duration) -> BatcherHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let batcher = Arc::clone(&self);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut active: Option<JoinHandle<DrainOutcome>> = None;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = interval.tick() => {
                        let drainer = Arc::clone(&batcher);
                        let handle = tokio::spawn(async move { drainer.drain_once().await });
                        // A Busy drain finishes at once; keep the handle of the real one
                        if !matches!(&active, Some(current) if !current.is_finished()) {
                            active = Some(handle);
                        }
                    }
                }
            }

            if let Some(current) = active {
                if let Err(e) = current.await {
                    tracing::error!("[Batcher] Drain task failed: {}", e);
                }
            }
        });

        tracing::info!("[Batcher] Drainer started (tick {:?})", tick);
        BatcherHandle {
            batcher: self,
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Running drainer
pub struct BatcherHandle {
    batcher: Arc<Batcher>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl BatcherHandle {
    /// Stop ticking, let the active drain finish, then reject what is left
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::error!("[Batcher] Drainer task failed: {}", e);
        }
        // Wait out a drain that was spawned but not tracked
        while self.batcher.is_draining() {
            tokio::task::yield_now().await;
        }
        let rejected = self.batcher.close();
        tracing::info!(
            "[Batcher] Drainer stopped, {} queued submissions rejected",
            rejected
        );
    }
}
