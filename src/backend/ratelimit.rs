//! Per-sender submission rate limiting.
//!
//! Each accepted submission bumps its sender's counter and schedules a
//! decrement one window later. A sender whose live counter has reached the
//! cap is rejected without touching the counter. This is an approximate
//! sliding window: it forgives bursts spread across a window boundary better
//! than a fixed-window reset, and it may under-limit if the runtime is slow
//! to run the decrements.
//!
//! Counters live only in memory and reset on restart.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Sliding submission cap keyed by sender
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Live submissions per sender; a slot is removed when it decays to zero
    counters: Arc<DashMap<Uuid, u32>>,
    max_per_window: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            counters: Arc::new(DashMap::new()),
            max_per_window,
            window,
        }
    }

    /// Admit or reject one submission from `sender_id`.
    ///
    /// Must be called from within a tokio runtime: the decrement is a
    /// spawned timer.
    pub fn allow(&self, sender_id: Uuid) -> bool {
        match self.counters.entry(sender_id) {
            Entry::Occupied(mut slot) => {
                if *slot.get() >= self.max_per_window {
                    debug!(sender = %sender_id, "[RateLimit] Sender at cap");
                    return false;
                }
                *slot.get_mut() += 1;
            }
            Entry::Vacant(slot) => {
                slot.insert(1);
            }
        }

        let counters = Arc::clone(&self.counters);
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            release(&counters, sender_id);
        });
        true
    }

    /// Submissions from `sender_id` currently counted against the cap
    pub fn live_count(&self, sender_id: Uuid) -> u32 {
        self.counters.get(&sender_id).map(|slot| *slot).unwrap_or(0)
    }

    /// Senders with a non-zero counter
    pub fn tracked_senders(&self) -> usize {
        self.counters.len()
    }
}

fn release(counters: &DashMap<Uuid, u32>, sender_id: Uuid) {
    if let Entry::Occupied(mut slot) = counters.entry(sender_id) {
        if *slot.get() <= 1 {
            slot.remove();
        } else {
            *slot.get_mut() -= 1;
        }
    }
}
