// src/types.rs
use url::Url;

/// Destination a share must be submitted to
///
/// Every task carries the pool URL and wallet it was fetched for, so
/// shares found against a devfee task are routed to the devfee pool
/// even after the primary pool has replaced the current task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTarget {
    /// Base URL of the pool the share belongs to
    pub pool: Url,
    /// Wallet address credited for the share
    pub wallet: String,
}

impl SubmitTarget {
    /// Creates a new submit target
    ///
    /// # Arguments
    /// * `pool` - Base URL of the pool
    /// * `wallet` - Wallet address credited for shares
    pub fn new(pool: Url, wallet: impl Into<String>) -> Self {
        SubmitTarget {
            pool,
            wallet: wallet.into(),
        }
    }
}
