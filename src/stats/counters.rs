// src/stats/counters.rs
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared mining counters
///
/// Mutated by device workers and reporter workers, read by the stats
/// aggregator and the devfee policy. Each counter is individually
/// linearizable; there is no cross-counter atomicity, which is fine
/// because counters are telemetry and never drive correctness
/// decisions.
pub struct Counters {
    hashes: AtomicU64,
    devfee_hashes: AtomicU64,
    shares_found: AtomicU64,
    shares_accepted: AtomicU64,
    pool_has_results: AtomicBool,
    per_device: Vec<AtomicU64>,
}

impl Counters {
    /// Creates counters for a fixed number of devices
    ///
    /// # Arguments
    /// * `device_count` - Number of per-device hash counters to track
    pub fn new(device_count: usize) -> Self {
        Counters {
            hashes: AtomicU64::new(0),
            devfee_hashes: AtomicU64::new(0),
            shares_found: AtomicU64::new(0),
            shares_accepted: AtomicU64::new(0),
            pool_has_results: AtomicBool::new(false),
            per_device: (0..device_count).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Credits processed hashes to the global, per-device and
    /// (optionally) devfee counters
    ///
    /// # Arguments
    /// * `device_index` - Worker's device slot
    /// * `count` - Hashes processed by the dispatch
    /// * `devfee` - Whether the originating task was a devfee task
    pub fn add_hashes(&self, device_index: usize, count: u64, devfee: bool) {
        self.hashes.fetch_add(count, Ordering::Relaxed);
        if let Some(device) = self.per_device.get(device_index) {
            device.fetch_add(count, Ordering::Relaxed);
        }
        if devfee {
            self.devfee_hashes.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Counts one (non-devfee) share whose submission finished
    pub fn share_found(&self) {
        self.shares_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one accepted share
    pub fn share_accepted(&self) {
        self.shares_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records that the pool reports explicit acceptance results
    pub fn mark_pool_results(&self) {
        self.pool_has_results.store(true, Ordering::Relaxed);
    }

    /// Total hashes processed
    pub fn hashes(&self) -> u64 {
        self.hashes.load(Ordering::Relaxed)
    }

    /// Hashes processed against devfee tasks
    pub fn devfee_hashes(&self) -> u64 {
        self.devfee_hashes.load(Ordering::Relaxed)
    }

    /// Shares found (devfee shares excluded)
    pub fn shares_found(&self) -> u64 {
        self.shares_found.load(Ordering::Relaxed)
    }

    /// Shares the pool explicitly or implicitly accepted
    pub fn shares_accepted(&self) -> u64 {
        self.shares_accepted.load(Ordering::Relaxed)
    }

    /// Whether the pool has ever reported an explicit result
    pub fn pool_has_results(&self) -> bool {
        self.pool_has_results.load(Ordering::Relaxed)
    }

    /// Snapshot of the per-device hash counters
    pub fn device_hashes(&self) -> Vec<u64> {
        self.per_device
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_land_in_the_right_buckets() {
        let counters = Counters::new(2);
        counters.add_hashes(0, 1000, false);
        counters.add_hashes(1, 500, true);

        assert_eq!(counters.hashes(), 1500);
        assert_eq!(counters.devfee_hashes(), 500);
        assert_eq!(counters.device_hashes(), vec![1000, 500]);
    }

    #[test]
    fn out_of_range_device_still_counts_globally() {
        let counters = Counters::new(1);
        counters.add_hashes(5, 100, false);
        assert_eq!(counters.hashes(), 100);
        assert_eq!(counters.device_hashes(), vec![0]);
    }

    #[test]
    fn share_counters_are_independent() {
        let counters = Counters::new(1);
        counters.share_found();
        counters.share_found();
        counters.share_accepted();
        assert_eq!(counters.shares_found(), 2);
        assert_eq!(counters.shares_accepted(), 1);
        assert!(!counters.pool_has_results());
        counters.mark_pool_results();
        assert!(counters.pool_has_results());
    }
}
