//! Mempool statistics tracking

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Snapshot of mempool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MempoolStats {
    /// Mbufs in the pool
    pub capacity: usize,
    /// Slots currently issued
    pub in_use: usize,
    /// Highest `in_use` observed at allocation time
    pub peak_in_use: usize,
    /// Successful allocations
    pub total_allocations: u64,
    /// Slots returned to the free set
    pub total_frees: u64,
    /// Allocations that found the pool exhausted
    pub allocation_failures: u64,
}

impl MempoolStats {
    /// Free slots at snapshot time
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.in_use)
    }

    /// Allocation success rate (0.0 to 1.0)
    pub fn success_rate(&self) -> f64 {
        let attempts = self.total_allocations + self.allocation_failures;
        if attempts == 0 {
            return 1.0;
        }
        self.total_allocations as f64 / attempts as f64
    }

    /// Pool utilization (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.in_use as f64 / self.capacity as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "MempoolStats {{ capacity: {}, in_use: {}, peak: {}, allocations: {}, frees: {}, \
             failures: {}, success_rate: {:.2}%, utilization: {:.2}% }}",
            self.capacity,
            self.in_use,
            self.peak_in_use,
            self.total_allocations,
            self.total_frees,
            self.allocation_failures,
            self.success_rate() * 100.0,
            self.utilization() * 100.0
        )
    }
}

/// Counters updated on the allocation path; all relaxed
#[derive(Debug, Default)]
pub struct AtomicMempoolStats {
    peak_in_use: AtomicUsize,
    total_allocations: AtomicU64,
    total_frees: AtomicU64,
    allocation_failures: AtomicU64,
}

impl AtomicMempoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful allocation with the in-use count it produced
    pub fn record_allocation(&self, in_use: usize) {
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        self.peak_in_use.fetch_max(in_use, Ordering::Relaxed);
    }

    pub fn record_bulk_allocation(&self, n: usize, in_use: usize) {
        self.total_allocations.fetch_add(n as u64, Ordering::Relaxed);
        self.peak_in_use.fetch_max(in_use, Ordering::Relaxed);
    }

    pub fn record_free(&self) {
        self.total_frees.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, capacity: usize, in_use: usize) -> MempoolStats {
        MempoolStats {
            capacity,
            in_use,
            peak_in_use: self.peak_in_use.load(Ordering::Relaxed),
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            total_frees: self.total_frees.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.peak_in_use.store(0, Ordering::Relaxed);
        self.total_allocations.store(0, Ordering::Relaxed);
        self.total_frees.store(0, Ordering::Relaxed);
        self.allocation_failures.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let stats = AtomicMempoolStats::new();
        stats.record_allocation(1);
        stats.record_allocation(2);
        stats.record_allocation(3);
        stats.record_failure();
        stats.record_free();

        let snap = stats.snapshot(4, 2);
        assert_eq!(snap.peak_in_use, 3);
        assert_eq!(snap.available(), 2);
        assert!((snap.success_rate() - 0.75).abs() < f64::EPSILON);
        assert!((snap.utilization() - 0.5).abs() < f64::EPSILON);
        assert!(snap.summary().contains("failures: 1"));

        stats.reset();
        assert_eq!(stats.snapshot(4, 0).total_allocations, 0);
    }
}
