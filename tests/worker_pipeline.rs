// tests/worker_pipeline.rs
//! End-to-end worker pipeline tests with a simulated accelerator:
//! allocate a range, dispatch, reconstruct reported candidates, verify
//! digests against the task complexity and route shares to the queue.

use crossbeam_channel::unbounded;
use std::sync::{Arc, Mutex};
use ton_miner_rs::accel::{ARG_WORDS, Accelerator, RESULT_SENTINEL, RESULT_WORDS};
use ton_miner_rs::miner::benchmark::BenchmarkStore;
use ton_miner_rs::miner::scheduler::INPUT_LEN;
use ton_miner_rs::miner::verify;
use ton_miner_rs::{MinerContext, MinerError, SubmitTarget, Task, Worker};
use url::Url;

/// Replays canned result words and records every dispatch's arguments.
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

fn fixed_task(complexity: [u8; 32], is_devfee: bool) -> Task {
    let mut input = [0u8; INPUT_LEN];
    for (i, b) in input.iter_mut().enumerate() {
        *b = (i as u8).wrapping_mul(7).wrapping_add(13);
    }
    let pool = if is_devfee {
        "https://next.ton-pool.com"
    } else {
        "https://eu.ton-pool.com"
    };
    Task::new(
        input,
        serde_json::json!("giver-xyz"),
        complexity,
        SubmitTarget::new(Url::parse(pool).unwrap(), "wallet-1"),
        is_devfee,
    )
}

#[test]
fn candidate_pair_folds_into_the_fixed_suffix_positions() {
    let mut complexity = [0u8; 32];
    // 0x00000000ffff...ff: four zero bytes, then all ones
    for b in complexity.iter_mut().skip(4) {
        *b = 0xff;
    }

    let (tx, rx) = unbounded();
    let ctx = Arc::new(MinerContext::new(1, tx));
    let task = fixed_task(complexity, false);
    let suffix = task.suffix;
    let template = task.input;
    ctx.scheduler.replace(task);
    // consume the first 256 nonces so the dispatched range starts at 256
    ctx.scheduler.allocate(256).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(BenchmarkStore::load(dir.path().join("bench.txt")));
    let (sim, seen) = SimAccelerator::new(&[(5, 9)]);
    let mut worker = Worker::new(Box::new(sim), ctx.clone(), store, 0, Some(32));

    worker.run_once("hash_solver_3", 8).unwrap().unwrap();

    // the argument buffer carried the base offset and the task fields
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let args = &seen[0];
    assert_eq!(args[0], 8);
    assert_eq!(args[1], 256);
    assert_eq!(args[10..22], suffix[..12]);
    assert_eq!(args[22], suffix[14]);

    // reconstruct the expected candidate independently: b=9 at words
    // 0/12, a=5 at words 1/13, offset=256 at words 2/14
    let mut words = suffix;
    words[0] ^= 9;
    words[12] ^= 9;
    words[1] ^= 5;
    words[13] ^= 5;
    words[2] ^= 256;
    words[14] ^= 256;
    let mut expect = [0u8; INPUT_LEN];
    expect[..64].copy_from_slice(&template[..64]);
    let mut tail = [0u8; 60];
    for (i, word) in words.iter().enumerate() {
        tail[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
    }
    expect[64..].copy_from_slice(&tail[..INPUT_LEN - 64]);

    let digest = verify::digest(&expect);
    let qualifies = verify::meets_complexity(&digest, &complexity);

    match rx.try_recv() {
        Ok(share) => {
            assert!(qualifies, "share queued although digest did not qualify");
            assert_eq!(share.input, expect);
            assert_eq!(share.digest, digest);
            assert_eq!(share.giver, serde_json::json!("giver-xyz"));
            assert_eq!(share.target.wallet, "wallet-1");
        }
        Err(_) => assert!(!qualifies, "qualifying share was not queued"),
    }

    // hashes credited: threads * iterations
    assert_eq!(ctx.counters.hashes(), 32 * 8);
}

#[test]
fn devfee_shares_carry_the_devfee_target() {
    let (tx, rx) = unbounded();
    let ctx = Arc::new(MinerContext::new(1, tx));
    ctx.scheduler.replace(fixed_task([0xff; 32], true));

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(BenchmarkStore::load(dir.path().join("bench.txt")));
    let (sim, _) = SimAccelerator::new(&[(1, 2)]);
    let mut worker = Worker::new(Box::new(sim), ctx.clone(), store, 0, Some(4));

    worker.run_once("hash_solver_3", 2).unwrap().unwrap();

    let share = rx.try_recv().unwrap();
    assert!(share.is_devfee);
    assert_eq!(share.target.pool.as_str(), "https://next.ton-pool.com/");
    assert_eq!(ctx.counters.devfee_hashes(), 8);
}

#[test]
fn tasks_allocated_before_a_replace_keep_their_target() {
    let (tx, rx) = unbounded();
    let ctx = Arc::new(MinerContext::new(1, tx));
    ctx.scheduler.replace(fixed_task([0xff; 32], false));

    // a worker snapshots the task with its range...
    let (task, range) = ctx.scheduler.allocate(64).unwrap();

    // ...then the devfee fetcher replaces the board
    ctx.scheduler.replace(fixed_task([0xff; 32], true));

    // the in-flight snapshot still routes to the original pool
    assert!(!task.is_devfee);
    assert_eq!(task.target.pool.as_str(), "https://eu.ton-pool.com/");
    assert_eq!(range.base, 0);

    // while new allocations see the devfee task from a reset cursor
    let (fresh, fresh_range) = ctx.scheduler.allocate(64).unwrap();
    assert!(fresh.is_devfee);
    assert_eq!(fresh_range.base, 0);
    drop(rx);
}
