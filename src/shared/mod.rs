//! Shared Module
//!
//! Types that cross the boundary between the ingestion pipeline and the
//! connection layer in front of it: the committed message record, analysis
//! results, group events, configuration, and the errors they raise.
//!
//! Nothing in here touches the network, the database, or the runtime, so the
//! module compiles without the `ssr` feature.

/// Committed message record and its parts
pub mod message;

/// Content analysis result
pub mod analysis;

/// Group event system
pub mod event;

/// Shared error types
pub mod error;

/// Pipeline configuration
pub mod config;

pub use analysis::AnalysisResult;
pub use config::{ConfigError, PipelineConfig, PipelineConfigBuilder};
pub use error::SharedError;
pub use event::{EventType, GroupEvent};
pub use message::{MessageRecord, SenderRef, Sentiment};
