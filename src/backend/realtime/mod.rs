//! Real-time Group Events
//!
//! Committed and deleted messages are pushed to the subscribers of their
//! group over Server-Sent Events.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs          - Module exports and cleanup task
//! ├── broadcast.rs    - Per-group broadcast channels
//! └── subscription.rs - SSE subscription handler
//! ```

use std::time::Duration;

/// Per-group broadcast channels
pub mod broadcast;

/// SSE subscription handler
pub mod subscription;

pub use broadcast::GroupBroadcast;
pub use subscription::handle_group_events;

/// Periodically drop group channels nobody subscribes to
pub fn spawn_channel_cleanup(
    broadcast: GroupBroadcast,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = broadcast.cleanup_inactive_channels();
            if removed > 0 {
                tracing::debug!("[Realtime] Removed {} inactive group channel(s)", removed);
            }
        }
    })
}
