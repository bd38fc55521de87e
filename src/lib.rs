//! ton_miner-rs - pool miner for TON-style proof-of-work in Rust
//!
//! This crate implements a pool-mining client that searches a
//! cryptographic nonce space across OpenCL compute devices:
//! - Atomic job distribution and nonce-range allocation across workers
//! - Per-device, per-kernel benchmark calibration with durable records
//! - Background job fetching (polling, WebSocket push, devfee mixing)
//! - Share reporting with bounded retries

#![warn(missing_docs)]
#![deny(unsafe_code)]

/// Accelerator capability: dispatch contract and OpenCL backend
pub mod accel;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared miner context (scheduler, counters, share queue, shutdown)
pub mod context;

/// Miner core implementation including scheduling, workers and
/// benchmark calibration
pub mod miner;

/// Network communication components for job fetching and share
/// submission
pub mod network;

/// Statistics collection and reporting functionality
pub mod stats;

/// Shared type definitions
pub mod types;

/// Utility functions and error handling
pub mod utils;

// Core exports
pub use accel::Accelerator;
pub use cli::Commands;
pub use config::Config;
pub use context::MinerContext;
pub use miner::{BenchmarkStore, NonceRange, Scheduler, Share, Task, Worker};
pub use network::{PoolClient, RawJob, SubmitOutcome};
pub use stats::{Counters, StatsReporter};
pub use types::SubmitTarget;
pub use utils::{MinerError, init_logging};
