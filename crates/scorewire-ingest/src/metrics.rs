//! Lightweight ingest counters.
//!
//! Plain atomics, exposed through the status endpoint. Not a metrics
//! pipeline; a scrape-friendly exporter can wrap these later.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for the ingestion pipeline, shared across cycles.
#[derive(Debug, Default)]
pub struct IngestCounters {
    snapshots_accepted: AtomicU64,
    snapshots_rejected: AtomicU64,
    cycles_skipped_in_flight: AtomicU64,
    merge_anomalies: AtomicU64,
    fetch_failures: AtomicU64,
}

impl IngestCounters {
    /// Fresh zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot that made it through validation and merge.
    pub fn record_accepted(&self) {
        self.snapshots_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a snapshot rejected by the validator.
    pub fn record_rejected(&self) {
        self.snapshots_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cycle skipped because the key was already in flight.
    pub fn record_skipped(&self) {
        self.cycles_skipped_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    /// Record refused parts of otherwise-accepted snapshots.
    pub fn record_anomalies(&self, count: usize) {
        self.merge_anomalies
            .fetch_add(u64::try_from(count).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// Record an upstream fetch failure.
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time copy for the status endpoint.
    pub fn snapshot(&self) -> IngestCountersSnapshot {
        IngestCountersSnapshot {
            snapshots_accepted: self.snapshots_accepted.load(Ordering::Relaxed),
            snapshots_rejected: self.snapshots_rejected.load(Ordering::Relaxed),
            cycles_skipped_in_flight: self.cycles_skipped_in_flight.load(Ordering::Relaxed),
            merge_anomalies: self.merge_anomalies.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`IngestCounters`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IngestCountersSnapshot {
    /// Snapshots validated and merged.
    pub snapshots_accepted: u64,
    /// Snapshots rejected at the validation boundary.
    pub snapshots_rejected: u64,
    /// Cycles skipped by the per-key in-flight guard.
    pub cycles_skipped_in_flight: u64,
    /// Refused snapshot parts (status or minute regressions).
    pub merge_anomalies: u64,
    /// Upstream fetch failures.
    pub fetch_failures: u64,
}

/// Counters for the publish side.
#[derive(Debug, Default)]
pub struct PublishCounters {
    published: AtomicU64,
    dropped: AtomicU64,
}

impl PublishCounters {
    /// Fresh zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one message delivered to the broker.
    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one message dropped after a publish failure.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time copy for the status endpoint.
    pub fn snapshot(&self) -> PublishCountersSnapshot {
        PublishCountersSnapshot {
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`PublishCounters`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PublishCountersSnapshot {
    /// Messages delivered to the broker.
    pub published: u64,
    /// Messages dropped, never retried.
    pub dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let counters = IngestCounters::new();
        counters.record_accepted();
        counters.record_accepted();
        counters.record_rejected();
        counters.record_anomalies(3);
        let snap = counters.snapshot();
        assert_eq!(snap.snapshots_accepted, 2);
        assert_eq!(snap.snapshots_rejected, 1);
        assert_eq!(snap.merge_anomalies, 3);
        assert_eq!(snap.fetch_failures, 0);
    }

    #[test]
    fn publish_counters_accumulate() {
        let counters = PublishCounters::new();
        counters.record_published();
        counters.record_dropped();
        counters.record_published();
        let snap = counters.snapshot();
        assert_eq!(snap.published, 2);
        assert_eq!(snap.dropped, 1);
    }
}
