// src/miner/mod.rs
//! Core mining functionality
//!
//! This module contains all components related to the mining process:
//! - Task scheduling and nonce distribution
//! - Device worker loops and candidate verification
//! - Benchmark calibration and record persistence

/// Benchmark record persistence and calibration bookkeeping
///
/// Holds the durable `(hash_rate, iterations)` records per device and
/// kernel, and the monotonic calibration progress estimate.
pub mod benchmark;

/// Mining task scheduler
///
/// Handles the single current task and atomic nonce-range allocation.
/// Manages task replacement from the job fetchers.
pub mod scheduler;

/// Hash verification primitives
///
/// Digest computation, midstate precomputation and the complexity
/// threshold comparison.
pub mod verify;

/// Device worker implementation
///
/// Contains the worker loop that dispatches nonce ranges to an
/// accelerator, verifies candidates and queues qualifying shares.
pub mod worker;

// Re-export main components for cleaner imports
pub use self::benchmark::BenchmarkStore;
pub use self::scheduler::{NonceRange, Scheduler, Share, Task};
pub use self::worker::Worker;
