use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Shared counters for the whole pipeline. Handed to every task as an
/// `Arc` rather than living in global state, so tests can observe a run
/// in isolation.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    published: AtomicU64,
    delivered: AtomicU64,
    delivery_failures: AtomicU64,
    consumed: AtomicU64,
    decode_failures: AtomicU64,
    poll_timeouts: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A message was queued for publication.
    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// The broker acknowledged placement of a published message.
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// The broker reported a published message as undeliverable.
    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A consumer decoded and handed off an event.
    pub fn record_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    /// A consumer received a payload it could not decode.
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A consumer poll window elapsed without a message.
    pub fn record_poll_timeout(&self) {
        self.poll_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            poll_timeouts: self.poll_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the pipeline counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub published: u64,
    pub delivered: u64,
    pub delivery_failures: u64,
    pub consumed: u64,
    pub decode_failures: u64,
    pub poll_timeouts: u64,
}
