//! Refresh statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for source refresh cycles.
///
/// All counters are atomic and can be safely read while a refresh runs.
#[derive(Debug, Default)]
pub struct RefreshStats {
    /// Refreshes that published a new snapshot.
    refreshed: AtomicU64,
    /// Refreshes that failed and kept the previous snapshot.
    failed: AtomicU64,
    /// Refreshes skipped because another was in flight.
    skipped: AtomicU64,
    /// Record count of the last published snapshot.
    last_instances: AtomicU64,
}

impl RefreshStats {
    /// Create zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a published snapshot.
    #[inline]
    pub fn record_refreshed(&self, instances: usize) {
        self.refreshed.fetch_add(1, Ordering::Relaxed);
        self.last_instances
            .store(instances as u64, Ordering::Relaxed);
    }

    /// Record a failed refresh.
    #[inline]
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a skipped refresh.
    #[inline]
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total published snapshots.
    #[inline]
    pub fn refreshed(&self) -> u64 {
        self.refreshed.load(Ordering::Relaxed)
    }

    /// Get total failed refreshes.
    #[inline]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Get total skipped refreshes.
    #[inline]
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Get the record count of the last published snapshot.
    #[inline]
    pub fn last_instances(&self) -> u64 {
        self.last_instances.load(Ordering::Relaxed)
    }

    /// Fraction of attempted refreshes that failed (0.0 to 1.0).
    pub fn failure_rate(&self) -> f64 {
        let failed = self.failed() as f64;
        let total = failed + self.refreshed() as f64;
        if total == 0.0 {
            0.0
        } else {
            failed / total
        }
    }
}
