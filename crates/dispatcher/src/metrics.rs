//! Sink and dispatch metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::FailureKind;

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Records being processed right now
    in_flight: AtomicUsize,
    /// Total successfully processed records
    delivered_count: AtomicU64,
    /// Total records the sink returned an error for
    failure_count: AtomicU64,
    /// Total records whose processing panicked
    panic_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current queue length
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    /// Set current queue length
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn inc_in_flight(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_in_flight(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get total delivered count
    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    /// Increment delivered count
    pub fn inc_delivered_count(&self) {
        self.delivered_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get panic count
    pub fn panic_count(&self) -> u64 {
        self.panic_count.load(Ordering::Relaxed)
    }

    /// Increment panic count
    pub fn inc_panic_count(&self) {
        self.panic_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            in_flight: self.in_flight(),
            delivered_count: self.delivered_count(),
            failure_count: self.failure_count(),
            panic_count: self.panic_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub in_flight: usize,
    pub delivered_count: u64,
    pub failure_count: u64,
    pub panic_count: u64,
}

/// Dispatcher-wide outcome counters
#[derive(Debug, Default)]
pub struct DispatchStats {
    submitted: AtomicU64,
    delivered: AtomicU64,
    unknown_topic: AtomicU64,
    parse_errors: AtomicU64,
    sink_errors: AtomicU64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failure under its kind
    pub fn inc_failed(&self, kind: FailureKind) {
        let counter = match kind {
            FailureKind::UnknownTopic => &self.unknown_topic,
            FailureKind::ParseError => &self.parse_errors,
            FailureKind::SinkError => &self.sink_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            unknown_topic: self.unknown_topic.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    pub submitted: u64,
    pub delivered: u64,
    pub unknown_topic: u64,
    pub parse_errors: u64,
    pub sink_errors: u64,
}

impl DispatchStatsSnapshot {
    /// Total failed records
    pub fn failed(&self) -> u64 {
        self.unknown_topic + self.parse_errors + self.sink_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_stats_by_kind() {
        let stats = DispatchStats::new();
        stats.inc_submitted();
        stats.inc_submitted();
        stats.inc_submitted();
        stats.inc_delivered();
        stats.inc_failed(FailureKind::ParseError);
        stats.inc_failed(FailureKind::UnknownTopic);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.submitted, 3);
        assert_eq!(snapshot.delivered, 1);
        assert_eq!(snapshot.parse_errors, 1);
        assert_eq!(snapshot.unknown_topic, 1);
        assert_eq!(snapshot.sink_errors, 0);
        assert_eq!(snapshot.failed(), 2);
    }
}
