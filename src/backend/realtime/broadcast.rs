/**
 * Per-Group Event Broadcasting
 *
 * Each group gets its own `tokio::sync::broadcast` channel, created on first
 * subscription. Publishing to a group nobody listens to is a no-op, and
 * channels whose last subscriber went away are removed by
 * `cleanup_inactive_channels`.
 *
 * Delivery is best-effort: a subscriber that falls more than the channel
 * capacity behind skips the events it missed.
 */
use crate::shared::event::GroupEvent;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Buffered events per group channel
pub const GROUP_CHANNEL_CAPACITY: usize = 100;

/// Registry of per-group broadcast channels
#[derive(Clone, Default)]
pub struct GroupBroadcast {
    channels: Arc<Mutex<HashMap<Uuid, broadcast::Sender<GroupEvent>>>>,
}

impl GroupBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<Uuid, broadcast::Sender<GroupEvent>>> {
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribe to a group's events, creating its channel if needed
    pub fn subscribe(&self, group_id: Uuid) -> broadcast::Receiver<GroupEvent> {
        self.channels()
            .entry(group_id)
            .or_insert_with(|| broadcast::channel(GROUP_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Send an event to the group's current subscribers
    ///
    /// Returns the number of subscribers reached.
    pub fn publish(&self, event: GroupEvent) -> usize {
        let sender = self.channels().get(&event.group_id).cloned();
        match sender {
            Some(sender) => match sender.send(event) {
                Ok(count) => {
                    tracing::debug!("[Realtime] Event delivered to {} subscriber(s)", count);
                    count
                }
                Err(_) => 0,
            },
            None => 0,
        }
    }

    /// Drop channels that have no subscribers left
    pub fn cleanup_inactive_channels(&self) -> usize {
        let mut channels = self.channels();
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        before - channels.len()
    }

    pub fn subscriber_count(&self, group_id: Uuid) -> usize {
        self.channels()
            .get(&group_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels().len()
    }
}
