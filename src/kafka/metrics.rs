//! Export and intake counters.
//!
//! Plain atomic counters with snapshot accessors; updated from `&self`
//! so concurrent publishers can share one sink's metrics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one export sink instance.
#[derive(Debug, Default)]
pub struct ExportMetrics {
    /// Messages acknowledged by the broker.
    published_total: AtomicU64,
    /// Payload bytes published.
    bytes_total: AtomicU64,
    /// Publish attempts that returned an error.
    errors_total: AtomicU64,
}

/// Point-in-time view of [`ExportMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportMetricsSnapshot {
    /// Messages acknowledged by the broker.
    pub published_total: u64,
    /// Payload bytes published.
    pub bytes_total: u64,
    /// Publish attempts that returned an error.
    pub errors_total: u64,
}

impl ExportMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one acknowledged publish of `bytes` payload bytes.
    pub fn record_publish(&self, bytes: u64) {
        self.published_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_total.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records one failed publish attempt.
    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ExportMetricsSnapshot {
        ExportMetricsSnapshot {
            published_total: self.published_total.load(Ordering::Relaxed),
            bytes_total: self.bytes_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
        }
    }
}

/// Counters for one intake reader instance.
#[derive(Debug, Default)]
pub struct IntakeMetrics {
    /// Successfully decoded records handed to the caller.
    records_total: AtomicU64,
    /// Payload bytes read.
    bytes_total: AtomicU64,
    /// Messages skipped because the payload was malformed.
    malformed_skipped_total: AtomicU64,
    /// Messages skipped because the payload version was unsupported.
    version_skipped_total: AtomicU64,
}

/// Point-in-time view of [`IntakeMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeMetricsSnapshot {
    /// Successfully decoded records handed to the caller.
    pub records_total: u64,
    /// Payload bytes read.
    pub bytes_total: u64,
    /// Messages skipped because the payload was malformed.
    pub malformed_skipped_total: u64,
    /// Messages skipped because the payload version was unsupported.
    pub version_skipped_total: u64,
}

impl IntakeMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one decoded record of `bytes` payload bytes.
    pub fn record_record(&self, bytes: u64) {
        self.records_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_total.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records one skipped malformed message.
    pub fn record_malformed_skip(&self) {
        self.malformed_skipped_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one skipped unsupported-version message.
    pub fn record_version_skip(&self) {
        self.version_skipped_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot.
    #[must_use]
    pub fn snapshot(&self) -> IntakeMetricsSnapshot {
        IntakeMetricsSnapshot {
            records_total: self.records_total.load(Ordering::Relaxed),
            bytes_total: self.bytes_total.load(Ordering::Relaxed),
            malformed_skipped_total: self.malformed_skipped_total.load(Ordering::Relaxed),
            version_skipped_total: self.version_skipped_total.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_counters() {
        let metrics = ExportMetrics::new();
        metrics.record_publish(100);
        metrics.record_publish(50);
        metrics.record_error();

        let snap = metrics.snapshot();
        assert_eq!(snap.published_total, 2);
        assert_eq!(snap.bytes_total, 150);
        assert_eq!(snap.errors_total, 1);
    }

    #[test]
    fn test_intake_counters() {
        let metrics = IntakeMetrics::new();
        metrics.record_record(64);
        metrics.record_malformed_skip();
        metrics.record_version_skip();
        metrics.record_version_skip();

        let snap = metrics.snapshot();
        assert_eq!(snap.records_total, 1);
        assert_eq!(snap.bytes_total, 64);
        assert_eq!(snap.malformed_skipped_total, 1);
        assert_eq!(snap.version_skipped_total, 2);
    }
}
