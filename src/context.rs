// src/context.rs
use crate::miner::scheduler::{Scheduler, Share};
use crate::stats::Counters;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared state every long-lived component holds a handle to
///
/// Owns the task scheduler, the counter groups and the share queue's
/// sending side, plus the shutdown flag the supervisor flips when the
/// process is asked to stop. Passed around as `Arc<MinerContext>`
/// instead of process-wide globals.
pub struct MinerContext {
    /// Current task and nonce distribution
    pub scheduler: Scheduler,
    /// Shared mining counters
    pub counters: Counters,
    /// Sending side of the share reporting queue
    pub shares: Sender<Share>,
    running: AtomicBool,
}

impl MinerContext {
    /// Creates the shared context
    ///
    /// # Arguments
    /// * `device_count` - Number of devices (sizes per-device counters)
    /// * `shares` - Sender feeding the reporter workers
    pub fn new(device_count: usize, shares: Sender<Share>) -> Self {
        MinerContext {
            scheduler: Scheduler::new(),
            counters: Counters::new(device_count),
            shares,
            running: AtomicBool::new(true),
        }
    }

    /// Whether components should keep running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Asks all components to wind down
    ///
    /// Steady-state mining never calls this; it exists so workers and
    /// loops have a defined way out when the process is shutting down.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
