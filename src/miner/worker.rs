// src/miner/worker.rs
//! Device worker implementation
//!
//! One worker owns one accelerator. It calibrates any kernels that have
//! no benchmark record yet, adopts the fastest recorded kernel, then
//! loops forever: allocate a nonce range, dispatch it, verify reported
//! candidates, queue qualifying shares, bump counters. The worker never
//! touches the network; submission is fully delegated to the reporter
//! workers through the share queue.

use crate::accel::{Accelerator, RESULT_SENTINEL};
use crate::context::MinerContext;
use crate::miner::benchmark::{
    BenchmarkRecord, BenchmarkStore, CALIBRATION_MIN_RUNS, CALIBRATION_START_ITERATIONS,
    CALIBRATION_WINDOW, CalibrationProgress, LATENCY_CEILING, TARGET_LATENCY, WARMUP_BUDGET,
    WARMUP_START_ITERATIONS, format_rate,
};
use crate::miner::scheduler::{NonceRange, Share, Task};
use crate::miner::verify;
use crate::utils::error::MinerError;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Kernel the warm-up phase prefers when present
const WARMUP_KERNEL: &str = "hash_solver_3";

/// Worker loop bound to a single accelerator device
pub struct Worker {
    accel: Box<dyn Accelerator>,
    ctx: Arc<MinerContext>,
    store: Arc<BenchmarkStore>,
    device_index: usize,
    threads: usize,
}

impl Worker {
    /// Creates a worker for one device
    ///
    /// # Arguments
    /// * `accel` - The device, owned exclusively by this worker
    /// * `ctx` - Shared miner context
    /// * `store` - Benchmark record store
    /// * `device_index` - Slot in the per-device counters
    /// * `threads` - Thread-count override; the device default applies
    ///   when `None`
    pub fn new(
        accel: Box<dyn Accelerator>,
        ctx: Arc<MinerContext>,
        store: Arc<BenchmarkStore>,
        device_index: usize,
        threads: Option<usize>,
    ) -> Self {
        let threads = threads.unwrap_or_else(|| accel.default_threads());
        Worker {
            accel,
            ctx,
            store,
            device_index,
            threads,
        }
    }

    /// Runs the worker until shutdown
    ///
    /// Calibrates kernels missing a benchmark record, then mines with
    /// the fastest recorded kernel. Dispatch errors in steady state are
    /// logged and retried after a pause instead of killing the thread.
    pub fn run(mut self) {
        let device = self.accel.device_id().to_string();

        let pending: Vec<String> = self
            .accel
            .kernel_names()
            .iter()
            .filter(|kernel| !self.store.contains(&device, kernel))
            .cloned()
            .collect();
        if !pending.is_empty() {
            if let Err(e) = self.run_calibration(&pending) {
                error!("benchmark failed on {}: {}", device, e);
                return;
            }
        }

        let Some((kernel, iterations)) = self.store.best_for(&device, self.accel.kernel_names())
        else {
            if self.ctx.is_running() {
                error!("no usable kernel recorded for {}, device disabled", device);
            }
            return;
        };
        info!(
            "{}: starting normal mining with {} and {} iterations per thread",
            device, kernel, iterations
        );

        while self.ctx.is_running() {
            match self.run_once(&kernel, iterations) {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    warn!("dispatch failed on {}: {}", device, e);
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        }
    }

    /// Allocates and processes one nonce range
    ///
    /// One step of the steady-state loop; also the measured unit during
    /// warm-up and calibration.
    ///
    /// # Returns
    /// The dispatch latency, or `None` when shutting down
    ///
    /// # Errors
    /// Returns `MinerError` if the dispatch itself fails
    pub fn run_once(
        &mut self,
        kernel: &str,
        iterations: u32,
    ) -> Result<Option<Duration>, MinerError> {
        let Some((task, range)) = self.next_range(iterations) else {
            return Ok(None);
        };

        let started = Instant::now();
        let args = task.kernel_args(iterations, range.base as u32);
        let results = self.accel.dispatch(kernel, self.threads, &args)?;
        let elapsed = started.elapsed();

        self.collect_candidates(&task, &range, &results);
        self.ctx
            .counters
            .add_hashes(self.device_index, range.size, task.is_devfee);
        Ok(Some(elapsed))
    }

    /// Waits for the scheduler to hand out a range
    ///
    /// The scheduler is populated before workers start, so the wait
    /// only spins during startup races; `None` means shutdown.
    fn next_range(&self, iterations: u32) -> Option<(Arc<Task>, NonceRange)> {
        let size = self.threads as u64 * iterations as u64;
        loop {
            if !self.ctx.is_running() {
                return None;
            }
            if let Some(pair) = self.ctx.scheduler.allocate(size) {
                return Some(pair);
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    /// Verifies reported candidates and queues qualifying shares
    ///
    /// Every candidate is re-hashed on the host as a cross-check of the
    /// accelerator's own comparison; a digest without the expected zero
    /// prefix points at a hardware or driver fault and is logged but
    /// not fatal.
    fn collect_candidates(&self, task: &Task, range: &NonceRange, results: &[u32]) {
        let mut i = 0;
        while i < results.len() {
            if results[i] == RESULT_SENTINEL {
                i += 1;
                continue;
            }
            if i + 1 >= results.len() || results[i + 1] == RESULT_SENTINEL {
                warn!("hash integrity error, please check your graphics card drivers");
                i += 1;
                continue;
            }
            let (a, b) = (results[i], results[i + 1]);
            i += 2;

            let input = task.rebuild_candidate(a, b, range.base as u32);
            let digest = verify::digest(&input);
            if !verify::has_zero_prefix(&digest) {
                warn!("hash integrity error, please check your graphics card drivers");
            }
            if verify::meets_complexity(&digest, &task.complexity) {
                let share = Share {
                    input,
                    giver: task.giver.clone(),
                    digest,
                    task_created_at: task.created_at,
                    target: task.target.clone(),
                    is_devfee: task.is_devfee,
                };
                if self.ctx.shares.send(share).is_err() {
                    warn!("share queue closed, dropping share");
                }
            }
        }
    }

    /// Warm-up: find an iteration count with near-target latency
    ///
    /// Doubles the count whenever a dispatch completes under the target
    /// latency, for a fixed wall-clock budget.
    ///
    /// # Returns
    /// The settled `(iterations, last dispatch latency)`, or `None`
    /// when shutting down
    fn warmup(&mut self, kernel: &str) -> Result<Option<(u32, Duration)>, MinerError> {
        let mut iterations = WARMUP_START_ITERATIONS;
        let started = Instant::now();
        let mut last = Duration::ZERO;
        loop {
            let Some(elapsed) = self.run_once(kernel, iterations)? else {
                return Ok(None);
            };
            last = elapsed;
            if elapsed < TARGET_LATENCY {
                iterations = iterations.saturating_mul(2);
            }
            if started.elapsed() > WARMUP_BUDGET {
                return Ok(Some((iterations, last)));
            }
        }
    }

    /// Calibrates one kernel and persists the best observed record
    ///
    /// Doubles the iteration count; for each candidate count runs
    /// several dispatches inside a short window and measures the
    /// realized rate. A candidate is abandoned the moment any single
    /// dispatch exceeds the latency ceiling, and that also ends the
    /// search upward.
    fn calibrate_kernel(
        &mut self,
        kernel: &str,
        progress: &mut CalibrationProgress,
    ) -> Result<(), MinerError> {
        let device = self.accel.device_id().to_string();
        let mut iterations = CALIBRATION_START_ITERATIONS;
        let mut best: BenchmarkRecord = (0.0, 0);

        'search: loop {
            iterations = match iterations.checked_mul(2) {
                Some(next) => next,
                None => break 'search,
            };
            let started = Instant::now();
            let mut runs = 0u32;
            loop {
                match self.run_once(kernel, iterations)? {
                    None => break 'search,
                    Some(elapsed) if elapsed > LATENCY_CEILING => break 'search,
                    Some(_) => {}
                }
                runs += 1;
                if runs >= CALIBRATION_MIN_RUNS && started.elapsed() > CALIBRATION_WINDOW {
                    break;
                }
            }
            progress.advance(iterations);

            let hashes = runs as u64 * self.threads as u64 * iterations as u64;
            let secs = started.elapsed().as_secs_f64();
            let rate = hashes as f64 / secs;
            debug!(
                "benchmark data: {} {} iterations {} ({} hashes in {:.2}s)",
                kernel,
                iterations,
                format_rate(rate),
                hashes,
                secs
            );
            if rate > best.0 {
                best = (rate, iterations);
            }
        }

        self.store.record(&device, kernel, best)
    }

    /// Calibrates every kernel without a record for this device
    fn run_calibration(&mut self, pending: &[String]) -> Result<(), MinerError> {
        let device = self.accel.device_id().to_string();
        info!("starting benchmark for {} ...", device);
        info!("the hashrate may be unstable for several minutes due to benchmarking");

        let warm_kernel = self
            .accel
            .kernel_names()
            .iter()
            .find(|name| name.as_str() == WARMUP_KERNEL)
            .or_else(|| self.accel.kernel_names().first())
            .cloned()
            .ok_or_else(|| MinerError::DeviceError(format!("no kernels on {}", device)))?;

        let Some((iterations, latency)) = self.warmup(&warm_kernel)? else {
            return Ok(());
        };
        let per_iteration = latency.as_secs_f64() / iterations as f64;
        let mut progress = CalibrationProgress::plan(&device, per_iteration, pending.len());

        for kernel in pending {
            if !self.ctx.is_running() {
                break;
            }
            self.calibrate_kernel(kernel, &mut progress)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::{ARG_WORDS, RESULT_WORDS};
    use crate::miner::scheduler::INPUT_LEN;
    use crate::types::SubmitTarget;
    use crossbeam_channel::unbounded;
    use std::sync::Mutex;
    use url::Url;

    /// Accelerator double that replays canned result words and records
    /// every argument buffer it was dispatched with.
    struct SimAccelerator {
        results: Vec<u32>,
        seen: Arc<Mutex<Vec<[u32; ARG_WORDS]>>>,
        names: Vec<String>,
    }

    impl SimAccelerator {
        fn new(pairs: &[(u32, u32)]) -> (Self, Arc<Mutex<Vec<[u32; ARG_WORDS]>>>) {
            let mut results = vec![RESULT_SENTINEL; RESULT_WORDS];
            for (i, (a, b)) in pairs.iter().enumerate() {
                results[i * 2] = *a;
                results[i * 2 + 1] = *b;
            }
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sim = SimAccelerator {
                results,
                seen: seen.clone(),
                names: vec!["hash_solver_3".to_string()],
            };
            (sim, seen)
        }
    }

    impl Accelerator for SimAccelerator {
        fn device_id(&self) -> &str {
            "sim device"
        }

        fn kernel_names(&self) -> &[String] {
            &self.names
        }

        fn default_threads(&self) -> usize {
            64
        }

        fn dispatch(
            &mut self,
            _kernel: &str,
            _threads: usize,
            args: &[u32; ARG_WORDS],
        ) -> Result<Vec<u32>, MinerError> {
            self.seen.lock().unwrap().push(*args);
            Ok(self.results.clone())
        }
    }

    fn test_task(complexity: [u8; 32]) -> Task {
        let mut input = [0u8; INPUT_LEN];
        for (i, b) in input.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(3).wrapping_add(1);
        }
        Task::new(
            input,
            serde_json::json!(42),
            complexity,
            SubmitTarget::new(Url::parse("https://pool.example").unwrap(), "wallet"),
            false,
        )
    }

    #[test]
    fn dispatch_pipeline_reconstructs_and_queues_shares() {
        let (tx, rx) = unbounded();
        let ctx = Arc::new(MinerContext::new(1, tx));
        let task = test_task([0xff; 32]);
        let expect_task = task.clone();
        ctx.scheduler.replace(task);
        // skip to a non-zero cursor so base_offset is 256
        ctx.scheduler.allocate(256).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(BenchmarkStore::load(dir.path().join("bench.txt")));
        let (sim, seen) = SimAccelerator::new(&[(5, 9)]);
        let mut worker = Worker::new(Box::new(sim), ctx.clone(), store, 0, Some(16));

        worker.run_once("hash_solver_3", 4).unwrap().unwrap();

        // argument buffer carried the iteration count and base offset
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0][0], 4);
        assert_eq!(seen[0][1], 256);

        // counters credited with threads * iterations = 64 hashes
        assert_eq!(ctx.counters.hashes(), 64);
        assert_eq!(ctx.counters.device_hashes(), vec![64]);
        assert_eq!(ctx.counters.devfee_hashes(), 0);

        // exactly one share, rebuilt deterministically from (a=5, b=9, base=256)
        let share = rx.try_recv().unwrap();
        let expect_input = expect_task.rebuild_candidate(5, 9, 256);
        assert_eq!(share.input, expect_input);
        assert_eq!(share.digest, verify::digest(&expect_input));
        assert_eq!(share.giver, serde_json::json!(42));
        assert!(!share.is_devfee);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn non_qualifying_candidates_are_dropped() {
        let (tx, rx) = unbounded();
        let ctx = Arc::new(MinerContext::new(1, tx));
        // threshold of all zeroes: nothing can compare below it
        ctx.scheduler.replace(test_task([0x00; 32]));

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(BenchmarkStore::load(dir.path().join("bench.txt")));
        let (sim, _) = SimAccelerator::new(&[(5, 9)]);
        let mut worker = Worker::new(Box::new(sim), ctx.clone(), store, 0, Some(16));

        worker.run_once("hash_solver_3", 4).unwrap().unwrap();

        assert!(rx.try_recv().is_err());
        // hashes are still counted even when no share qualifies
        assert_eq!(ctx.counters.hashes(), 64);
    }

    #[test]
    fn devfee_tasks_feed_the_devfee_counter() {
        let (tx, _rx) = unbounded();
        let ctx = Arc::new(MinerContext::new(1, tx));
        let mut task = test_task([0xff; 32]);
        task.is_devfee = true;
        ctx.scheduler.replace(task);

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(BenchmarkStore::load(dir.path().join("bench.txt")));
        let (sim, _) = SimAccelerator::new(&[]);
        let mut worker = Worker::new(Box::new(sim), ctx.clone(), store, 0, Some(8));

        worker.run_once("hash_solver_3", 2).unwrap().unwrap();
        assert_eq!(ctx.counters.devfee_hashes(), 16);
        assert_eq!(ctx.counters.hashes(), 16);
    }
}
