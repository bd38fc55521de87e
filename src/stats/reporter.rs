// src/stats/reporter.rs
//! Periodic hashrate reporting
//!
//! Samples the shared counters on a fixed interval into a small sliding
//! window, logs the average rate over the window, and periodically logs
//! the rate over just the last interval. With `--stats` the same
//! samples are dumped to `stats.json` for external consumption.

use crate::context::MinerContext;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
//use crate::utils::error::MinerError;

/// Number of samples kept in the sliding window
const WINDOW: usize = 7;

/// Every how many ticks the recent-rate line is logged
const RECENT_EVERY: u64 = 6;

struct Sample {
    at: Instant,
    total: u64,
    per_device: Vec<u64>,
}

fn window_rate(start: &Sample, end: &Sample) -> f64 {
    let secs = end.at.duration_since(start.at).as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (end.total - start.total) as f64 / secs
}

/// Collects and reports mining statistics
pub struct StatsReporter {
    ctx: Arc<MinerContext>,
    interval: Duration,
    stats_path: Option<PathBuf>,
}

impl StatsReporter {
    /// Creates a new StatsReporter with the specified sampling interval
    ///
    /// # Arguments
    /// * `ctx` - Shared miner context holding the counters
    /// * `interval` - How often to sample and log
    /// * `stats_path` - Where to dump `stats.json`, if enabled
    pub fn new(ctx: Arc<MinerContext>, interval: Duration, stats_path: Option<PathBuf>) -> Self {
        StatsReporter {
            ctx,
            interval,
            stats_path,
        }
    }

    /// Starts the periodic reporting thread
    pub fn start(self) {
        std::thread::spawn(move || self.run());
    }

    fn sample(&self) -> Sample {
        Sample {
            at: Instant::now(),
            total: self.ctx.counters.hashes(),
            per_device: self.ctx.counters.device_hashes(),
        }
    }

    fn run(self) {
        let started = Instant::now();
        let mut samples = vec![self.sample()];
        let mut count = 0u64;

        while self.ctx.is_running() {
            std::thread::sleep(self.interval);
            count += 1;
            samples.push(self.sample());
            if samples.len() > WINDOW {
                samples.remove(0);
            }

            let first = &samples[0];
            let last = &samples[samples.len() - 1];
            let secs = last.at.duration_since(first.at).as_secs_f64();
            let mut line = format!(
                "average hashrate: {:.2}MH/s in {:.2}s, {} shares found",
                window_rate(first, last) / 1e6,
                secs,
                self.ctx.counters.shares_found()
            );
            if self.ctx.counters.pool_has_results() {
                line.push_str(&format!(
                    ", {} accepted",
                    self.ctx.counters.shares_accepted()
                ));
            }
            log::info!("{}", line);

            if count >= RECENT_EVERY && count % RECENT_EVERY == 2 && samples.len() >= 2 {
                let prev = &samples[samples.len() - 2];
                let secs = last.at.duration_since(prev.at).as_secs_f64();
                log::info!(
                    "hashrate in last minute: {:.2}MH/s in {:.2}s",
                    window_rate(prev, last) / 1e6,
                    secs
                );
            }

            if let Some(path) = &self.stats_path {
                // recent window early on, averaged window afterwards
                let start = if count < 8 {
                    &samples[samples.len() - 2]
                } else if count % RECENT_EVERY == 2 {
                    first
                } else {
                    continue;
                };
                if let Err(e) = self.dump(path, start, last, started) {
                    log::warn!("failed to write {}: {}", path.display(), e);
                }
            }
        }
    }

    fn dump(
        &self,
        path: &PathBuf,
        start: &Sample,
        end: &Sample,
        started: Instant,
    ) -> Result<(), std::io::Error> {
        let secs = end.at.duration_since(start.at).as_secs_f64().max(1e-9);
        let rates: Vec<f64> = start
            .per_device
            .iter()
            .zip(&end.per_device)
            .map(|(a, b)| (b - a) as f64 / secs / 1e6)
            .collect();
        let accepted = self.ctx.counters.shares_accepted();
        let found = self.ctx.counters.shares_found();
        let body = serde_json::json!({
            "total": (end.total - start.total) as f64 / secs / 1e3,
            "rates": rates,
            "uptime": started.elapsed().as_secs_f64(),
            "accepted": accepted,
            "rejected": found.saturating_sub(accepted),
        });
        std::fs::write(path, body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_divides_hash_delta_by_time_delta() {
        let base = Instant::now();
        let start = Sample {
            at: base,
            total: 1_000,
            per_device: vec![1_000],
        };
        let end = Sample {
            at: base + Duration::from_secs(10),
            total: 21_000,
            per_device: vec![21_000],
        };
        assert!((window_rate(&start, &end) - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn zero_elapsed_time_reports_zero_rate() {
        let base = Instant::now();
        let s = Sample {
            at: base,
            total: 5,
            per_device: vec![],
        };
        let e = Sample {
            at: base,
            total: 50,
            per_device: vec![],
        };
        assert_eq!(window_rate(&s, &e), 0.0);
    }
}
