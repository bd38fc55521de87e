// src/network/mod.rs
//! Network communication components
//!
//! This module handles all network interactions with mining pools:
//! - `PoolClient`: the JSON-over-HTTPS pool protocol, including job
//!   parsing and share submission
//! - `fetcher`: the background loops that keep the current task fresh
//!   (primary poll, WebSocket push, devfee)
//! - `submitter`: the reporter workers that drain the share queue

/// Mining pool client implementation
///
/// Handles the pool's HTTP endpoints, the push-channel probe, and
/// turning raw jobs into ready-to-mine tasks.
pub mod pool;

/// Background job-fetching loops
///
/// Primary polling, the optional WebSocket push channel, and the
/// devfee top-up policy.
pub mod fetcher;

/// Share reporting pipeline
///
/// Fixed pool of reporter workers submitting shares with bounded
/// retries.
pub mod submitter;

// Re-export main components for cleaner imports
pub use pool::{PoolClient, RawJob, SubmitOutcome};
