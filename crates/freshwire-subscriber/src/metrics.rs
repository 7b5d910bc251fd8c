// Delivery metrics
//
// Dispatch failures are soft by design - a stale cache heals on the next
// mutation for the same path - so they surface here as counters instead of
// propagating into the event-consumption loop.

use std::sync::atomic::{AtomicU64, Ordering};

/// In-process delivery counters
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    /// Events judged new and handed to the dispatcher
    pub events_dispatched: AtomicU64,
    /// Events skipped because their timestamp was at or below the watermark
    pub events_deduped: AtomicU64,
    /// Revalidation calls that succeeded
    pub calls_succeeded: AtomicU64,
    /// Revalidation calls that exhausted their attempts
    pub calls_failed: AtomicU64,
    /// Individual retry attempts beyond the first
    pub calls_retried: AtomicU64,
    /// Push-channel reconnects
    pub reconnects: AtomicU64,
}

/// Point-in-time copy for logging
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub events_dispatched: u64,
    pub events_deduped: u64,
    pub calls_succeeded: u64,
    pub calls_failed: u64,
    pub calls_retried: u64,
    pub reconnects: u64,
}

impl DeliveryMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            events_deduped: self.events_deduped.load(Ordering::Relaxed),
            calls_succeeded: self.calls_succeeded.load(Ordering::Relaxed),
            calls_failed: self.calls_failed.load(Ordering::Relaxed),
            calls_retried: self.calls_retried.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = DeliveryMetrics::default();
        DeliveryMetrics::incr(&metrics.events_dispatched);
        DeliveryMetrics::incr(&metrics.events_dispatched);
        DeliveryMetrics::incr(&metrics.calls_failed);

        let snap = metrics.snapshot();
        assert_eq!(snap.events_dispatched, 2);
        assert_eq!(snap.calls_failed, 1);
        assert_eq!(snap.calls_succeeded, 0);
    }
}
