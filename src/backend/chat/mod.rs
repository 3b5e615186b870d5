//! Chat Message Pipeline
//!
//! Everything between "a sender posted a message" and "the message, its
//! reward and the aggregates it feeds are committed".
//!
//! # Architecture
//!
//! - **`batcher`** - FIFO submission buffer and single-drain batch processor
//! - **`commit`** - Atomic message + sender + group transaction
//! - **`pipeline`** - `ChatPipeline` facade and the per-message processor
//! - **`history`** - Cached, paged history reads
//! - **`handlers`** - HTTP handlers over the pipeline
//! - **`error`** - `PipelineError`, the failures reported to submitters
//!
//! # Example
//!
//! ```rust,no_run
//! use chatmint::backend::analysis::DisabledOracle;
//! use chatmint::backend::cache::MemoryCache;
//! use chatmint::backend::chat::ChatPipeline;
//! use chatmint::backend::store::MemoryStore;
//! use chatmint::shared::config::PipelineConfig;
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # async fn example() {
//! let pipeline = ChatPipeline::new(
//!     &PipelineConfig::default(),
//!     Arc::new(DisabledOracle),
//!     Arc::new(MemoryCache::new()),
//!     Arc::new(MemoryStore::new()),
//! );
//! let drainer = pipeline.start();
//! let outcome = pipeline.submit(Uuid::new_v4(), Uuid::new_v4(), "gm").await;
//! drainer.stop().await;
//! # }
//! ```

/// Submission queue and batch drain
pub mod batcher;

/// Stats commit transaction
pub mod commit;

/// Submitter-facing errors
pub mod error;

/// HTTP handlers
pub mod handlers;

/// Paged history reads
pub mod history;

/// Pipeline facade
pub mod pipeline;

pub use batcher::{Batcher, BatcherHandle, DrainOutcome, Submission, SubmissionProcessor};
pub use commit::StatsCommitter;
pub use error::PipelineError;
pub use history::HistoryService;
pub use pipeline::{ChatPipeline, MessageProcessor};
