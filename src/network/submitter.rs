// src/network/submitter.rs
//! Share reporting pipeline
//!
//! A fixed pool of reporter workers drains the share queue and submits
//! each share to its originating pool with bounded retries. Devfee
//! shares are submitted like any other but stay invisible to the
//! user-facing counters and quiet in the logs.

use crate::context::MinerContext;
use crate::miner::scheduler::Share;
use crate::network::pool::{PoolClient, SubmitOutcome};
use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Total submission attempts per share (one initial try plus retries)
pub const SUBMIT_ATTEMPTS: u32 = 6;

/// Pause between submission attempts
pub const RETRY_PAUSE: Duration = Duration::from_millis(500);

/// Number of reporter workers draining the queue
pub const REPORTER_WORKERS: usize = 8;

/// Timeout for the n-th submission attempt (1-based); attempts get
/// progressively more patient
pub fn attempt_timeout(attempt: u32) -> Duration {
    Duration::from_secs(4 * attempt as u64)
}

/// Spawns the reporter worker pool
///
/// # Arguments
/// * `pool` - Shared pool client
/// * `ctx` - Shared miner context
/// * `shares` - Receiving side of the share queue
pub fn spawn_reporters(
    pool: Arc<PoolClient>,
    ctx: Arc<MinerContext>,
    shares: Receiver<Share>,
) -> Vec<JoinHandle<()>> {
    (0..REPORTER_WORKERS)
        .map(|_| {
            let pool = pool.clone();
            let ctx = ctx.clone();
            let shares = shares.clone();
            tokio::spawn(report_shares(pool, ctx, shares))
        })
        .collect()
}

/// One reporter worker: blocking-pops shares and submits them
pub async fn report_shares(pool: Arc<PoolClient>, ctx: Arc<MinerContext>, shares: Receiver<Share>) {
    while ctx.is_running() {
        let queue = shares.clone();
        let share = match tokio::task::spawn_blocking(move || queue.recv()).await {
            Ok(Ok(share)) => share,
            // queue closed or runtime tearing down
            _ => break,
        };
        submit_share(&pool, &ctx, share).await;
    }
}

/// Submits one share with bounded retries, then accounts for it
async fn submit_share(pool: &PoolClient, ctx: &MinerContext, share: Share) {
    let digest_hex = hex::encode(share.digest);
    debug!(
        "trying to submit share {}{} [giver = {}]",
        digest_hex,
        if share.is_devfee { " (devfee)" } else { "" },
        share.giver
    );

    for attempt in 1..=SUBMIT_ATTEMPTS {
        match pool.submit(&share, attempt_timeout(attempt)).await {
            Ok(outcome) => {
                conclude(ctx, &share, &digest_hex, outcome);
                break;
            }
            Err(e) if attempt == SUBMIT_ATTEMPTS => {
                if !share.is_devfee {
                    warn!("failed to submit share {}: {}", digest_hex, e);
                }
            }
            Err(e) => {
                if !share.is_devfee {
                    warn!(
                        "failed to submit share {}, retrying ({}/{}): {}",
                        digest_hex,
                        attempt,
                        SUBMIT_ATTEMPTS - 1,
                        e
                    );
                }
                tokio::time::sleep(RETRY_PAUSE).await;
            }
        }
    }

    // a share counts as found once its submission concluded, delivered
    // or dropped; devfee shares never touch user-visible totals
    if !share.is_devfee {
        ctx.counters.share_found();
    }
}

fn conclude(ctx: &MinerContext, share: &Share, digest_hex: &str, outcome: SubmitOutcome) {
    if share.is_devfee {
        return;
    }
    match outcome {
        SubmitOutcome::LegacyAccepted => {
            info!("found share {}", digest_hex);
            ctx.counters.share_accepted();
        }
        SubmitOutcome::Accepted => {
            ctx.counters.mark_pool_results();
            info!("successfully submitted share {}", digest_hex);
            ctx.counters.share_accepted();
        }
        SubmitOutcome::Rejected => {
            ctx.counters.mark_pool_results();
            warn!(
                "share {} rejected (job was got {}s ago)",
                digest_hex,
                share.task_created_at.elapsed().as_secs()
            );
        }
    }
}
