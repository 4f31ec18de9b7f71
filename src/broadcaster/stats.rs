use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Activity counters for the broadcaster
#[derive(Debug, Default)]
pub struct BroadcasterStats {
    /// Total toasts emitted
    pub total_emitted: AtomicU64,
    /// Toasts removed by an explicit dismiss
    pub total_dismissed: AtomicU64,
    /// Toasts removed by their expiry timer
    pub total_expired: AtomicU64,
    /// Toasts evicted because the live cap was exceeded
    pub total_evicted: AtomicU64,
    /// Snapshot deliveries that panicked inside a subscriber callback
    pub delivery_failures: AtomicU64,
}

impl BroadcasterStats {
    pub fn snapshot(&self) -> BroadcasterStatsSnapshot {
        BroadcasterStatsSnapshot {
            total_emitted: self.total_emitted.load(Ordering::Relaxed),
            total_dismissed: self.total_dismissed.load(Ordering::Relaxed),
            total_expired: self.total_expired.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of broadcaster statistics
#[derive(Debug, Clone, Serialize)]
pub struct BroadcasterStatsSnapshot {
    pub total_emitted: u64,
    pub total_dismissed: u64,
    pub total_expired: u64,
    pub total_evicted: u64,
    pub delivery_failures: u64,
}
