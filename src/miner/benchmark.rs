// src/miner/benchmark.rs
//! Benchmark record persistence and calibration bookkeeping
//!
//! Calibration results are keyed by `"device:kernel"` and written back
//! to disk immediately after every kernel finishes, so an interrupted
//! run never repeats work it already paid for. A missing or corrupt
//! record file is treated as an empty store.

use crate::utils::error::MinerError;
use log::{debug, info};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Iteration count the warm-up phase starts from
pub const WARMUP_START_ITERATIONS: u32 = 4096;

/// Iteration count calibration starts from (doubled before the first test)
pub const CALIBRATION_START_ITERATIONS: u32 = 2048;

/// Dispatch latency the warm-up phase steers towards
pub const TARGET_LATENCY: Duration = Duration::from_millis(700);

/// Single-dispatch latency that disqualifies an iteration count
pub const LATENCY_CEILING: Duration = Duration::from_secs(3);

/// Wall-clock budget of the warm-up phase
pub const WARMUP_BUDGET: Duration = Duration::from_secs(15);

/// Minimum measurement window per candidate iteration count
pub const CALIBRATION_WINDOW: Duration = Duration::from_secs(2);

/// Minimum dispatches per candidate iteration count
pub const CALIBRATION_MIN_RUNS: u32 = 4;

/// A persisted calibration result: measured hash rate and the iteration
/// count that produced it
pub type BenchmarkRecord = (f64, u32);

/// Durable store of calibration results across runs
pub struct BenchmarkStore {
    path: PathBuf,
    records: Mutex<HashMap<String, BenchmarkRecord>>,
}

impl BenchmarkStore {
    /// Loads the store from disk
    ///
    /// A missing or unparsable file yields an empty store; calibration
    /// simply runs again.
    ///
    /// # Arguments
    /// * `path` - Location of the JSON record file
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = std::fs::read_to_string(&path)
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_else(|| {
                debug!("no usable benchmark data at {}", path.display());
                HashMap::new()
            });
        BenchmarkStore {
            path,
            records: Mutex::new(records),
        }
    }

    fn key(device: &str, kernel: &str) -> String {
        format!("{}:{}", device, kernel)
    }

    /// Whether a record exists for this device/kernel pair
    pub fn contains(&self, device: &str, kernel: &str) -> bool {
        self.records
            .lock()
            .unwrap()
            .contains_key(&Self::key(device, kernel))
    }

    /// Looks up the record for a device/kernel pair
    pub fn get(&self, device: &str, kernel: &str) -> Option<BenchmarkRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&Self::key(device, kernel))
            .copied()
    }

    /// Stores a calibration result and rewrites the record file
    ///
    /// # Arguments
    /// * `device` - Device identity
    /// * `kernel` - Kernel name
    /// * `record` - Measured `(hash_rate, iterations)` pair
    ///
    /// # Errors
    /// Returns `MinerError` if the file cannot be written
    pub fn record(
        &self,
        device: &str,
        kernel: &str,
        record: BenchmarkRecord,
    ) -> Result<(), MinerError> {
        let mut records = self.records.lock().unwrap();
        records.insert(Self::key(device, kernel), record);
        let data = serde_json::to_string(&*records)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    /// Picks the fastest recorded kernel for a device
    ///
    /// # Arguments
    /// * `device` - Device identity
    /// * `kernels` - Kernel names to consider
    ///
    /// # Returns
    /// The best `(kernel, iterations)` choice, or `None` if no kernel
    /// has a usable (non-zero rate) record
    pub fn best_for(&self, device: &str, kernels: &[String]) -> Option<(String, u32)> {
        let records = self.records.lock().unwrap();
        let mut best: Option<(f64, String, u32)> = None;
        for kernel in kernels {
            if let Some(&(rate, iterations)) = records.get(&Self::key(device, kernel)) {
                if rate > 0.0 && best.as_ref().map_or(true, |(r, _, _)| rate > *r) {
                    best = Some((rate, kernel.clone(), iterations));
                }
            }
        }
        best.map(|(_, kernel, iterations)| (kernel, iterations))
    }
}

/// Monotonic progress estimate over a device's calibration run
///
/// The estimate weighs each pending iteration count by its expected
/// wall-clock cost, derived from the per-iteration latency the warm-up
/// phase observed. Progress is logged at 2% steps and capped at 98% so
/// the estimate never claims completion before calibration does.
pub struct CalibrationProgress {
    device: String,
    expected: HashMap<u32, f64>,
    total_secs: f64,
    done_secs: f64,
    last_logged: u64,
}

impl CalibrationProgress {
    /// Plans progress accounting for a device's calibration run
    ///
    /// # Arguments
    /// * `device` - Device identity (for log lines)
    /// * `per_iteration` - Seconds one iteration took during warm-up
    /// * `kernel_count` - Number of kernels still to calibrate
    pub fn plan(device: impl Into<String>, per_iteration: f64, kernel_count: usize) -> Self {
        let mut expected = HashMap::new();
        let mut per_kernel = 0.0;
        let mut count = CALIBRATION_START_ITERATIONS * 2;
        loop {
            let latency = count as f64 * per_iteration;
            if latency > 4.0 {
                break;
            }
            let cost = (latency * CALIBRATION_MIN_RUNS as f64).max(2.2);
            expected.insert(count, cost);
            per_kernel += cost;
            match count.checked_mul(2) {
                Some(next) => count = next,
                None => break,
            }
        }
        let warmup = WARMUP_BUDGET.as_secs_f64();
        CalibrationProgress {
            device: device.into(),
            expected,
            total_secs: (warmup + per_kernel * kernel_count as f64) / 0.95,
            done_secs: warmup,
            last_logged: 0,
        }
    }

    /// Records one finished iteration-count measurement
    ///
    /// # Arguments
    /// * `iterations` - The iteration count that just finished
    pub fn advance(&mut self, iterations: u32) {
        if let Some(cost) = self.expected.get(&iterations) {
            self.done_secs += cost;
        }
        let percent = (self.done_secs / self.total_secs * 100.0) as u64;
        if percent >= self.last_logged + 2 && percent <= 98 {
            self.last_logged = percent;
            info!("benchmarking {} ... {}%", self.device, percent);
        }
    }
}

/// Formats a hash rate for log output
pub fn format_rate(rate: f64) -> String {
    format!("{:.2}MH/s", rate / 1e6)
}
