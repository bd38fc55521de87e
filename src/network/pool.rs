// src/network/pool.rs
//! Mining pool client implementation
//!
//! Handles communication with the pool's JSON-over-HTTPS interface:
//! the startup wallet check, job fetching (for the primary and devfee
//! pools), the push-channel probe, and share submission. Parsing a raw
//! job into a ready-to-mine task also lives here, since the template
//! assembly is part of the job protocol.

use crate::miner::scheduler::{INPUT_LEN, Share, Task};
use crate::types::SubmitTarget;
use crate::utils::error::MinerError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use rand::RngCore;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

/// Timeout applied to every fetch/probe request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Leading magic bytes of every input template
const INPUT_HEADER: [u8; 7] = [0x00, 0xf2, b'M', b'i', b'n', b'e', 0x00];

/// Raw job object as served by `GET /job` and the push channel
#[derive(Debug, Clone, Deserialize)]
pub struct RawJob {
    /// URL-safe base64 wallet the job credits
    pub wallet: String,
    /// Hex pool-assigned prefix, mixed into the template
    pub prefix: String,
    /// Job expiry timestamp
    pub expire: u32,
    /// Hex job seed
    pub seed: String,
    /// Hex digest threshold
    pub complexity: String,
    /// Opaque giver identifier, echoed back on submission
    pub giver: Value,
}

impl RawJob {
    /// Builds a mining task from this job
    ///
    /// Validates the wallet, mixes a fresh random prefix into the
    /// pool-assigned one (so two tasks never share a template even when
    /// the pool repeats itself), assembles the 123-byte input template
    /// and precomputes the hash state.
    ///
    /// # Arguments
    /// * `target` - Pool/wallet pair shares of this task submit to
    /// * `is_devfee` - Whether the job came from a devfee pool
    ///
    /// # Errors
    /// Returns `MinerError` on a malformed wallet, prefix, seed or
    /// complexity
    pub fn to_task(&self, target: SubmitTarget, is_devfee: bool) -> Result<Task, MinerError> {
        let wallet = URL_SAFE.decode(&self.wallet)?;
        if wallet.len() < 34 {
            return Err(MinerError::ProtocolError(format!(
                "wallet decodes to {} bytes, need at least 34",
                wallet.len()
            )));
        }
        if (wallet[1] as u32 * 4) % 256 != 0 {
            return Err(MinerError::ProtocolError(
                "wallet has an invalid workchain byte".to_string(),
            ));
        }

        let pool_prefix = hex::decode(&self.prefix)?;
        let mut prefix = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut prefix[4..]);
        for (byte, pool_byte) in prefix.iter_mut().zip(&pool_prefix) {
            *byte ^= pool_byte;
        }

        let seed = hex::decode(&self.seed)?;
        if seed.len() != 16 {
            return Err(MinerError::ProtocolError(format!(
                "seed is {} bytes, expected 16",
                seed.len()
            )));
        }
        let complexity: [u8; 32] = hex::decode(&self.complexity)?
            .try_into()
            .map_err(|_| MinerError::ProtocolError("complexity is not 32 bytes".to_string()))?;

        let mut input = [0u8; INPUT_LEN];
        input[..7].copy_from_slice(&INPUT_HEADER);
        input[7..11].copy_from_slice(&self.expire.to_be_bytes());
        input[11..43].copy_from_slice(&wallet[2..34]);
        input[43..75].copy_from_slice(&prefix);
        input[75..91].copy_from_slice(&seed);
        input[91..123].copy_from_slice(&prefix);

        Ok(Task::new(
            input,
            self.giver.clone(),
            complexity,
            target,
            is_devfee,
        ))
    }
}

/// Pool's verdict on a submitted share
///
/// Older pools omit the `accepted` field entirely, which means the
/// share counts as accepted; the variant keeps that legacy branch
/// explicit instead of burying it in control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// No `accepted` field in the response (legacy protocol)
    LegacyAccepted,
    /// Explicitly accepted
    Accepted,
    /// Explicitly rejected
    Rejected,
}

impl SubmitOutcome {
    /// Classifies a submission response body
    pub fn from_response(body: &Value) -> Self {
        match body.get("accepted") {
            None => SubmitOutcome::LegacyAccepted,
            Some(value) if value.as_bool() == Some(true) => SubmitOutcome::Accepted,
            Some(_) => SubmitOutcome::Rejected,
        }
    }
}

/// Client for communicating with a mining pool
///
/// Handles all pool protocol interactions including:
/// - The startup wallet/connectivity check
/// - Job fetching from the primary and devfee pools
/// - The push-channel probe
/// - Share submission
pub struct PoolClient {
    client: reqwest::Client,
    base: Url,
    wallet: String,
}

impl PoolClient {
    /// Creates a new PoolClient instance
    ///
    /// # Arguments
    /// * `base` - Base URL of the primary pool
    /// * `wallet` - The miner's wallet address
    ///
    /// # Errors
    /// Returns `MinerError` if the HTTP client cannot be built
    pub fn new(base: Url, wallet: impl Into<String>) -> Result<Self, MinerError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("ton_miner-rs/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(PoolClient {
            client,
            base,
            wallet: wallet.into(),
        })
    }

    /// Base URL of the primary pool
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Submit target for tasks fetched from the primary pool
    pub fn submit_target(&self) -> SubmitTarget {
        SubmitTarget::new(self.base.clone(), self.wallet.clone())
    }

    /// Verifies the pool knows the configured wallet
    ///
    /// # Errors
    /// Returns `MinerError` if the pool is unreachable or does not
    /// acknowledge the wallet; fatal at startup
    pub async fn check_wallet(&self) -> Result<(), MinerError> {
        let url = self.base.join(&format!("/wallet/{}", self.wallet))?;
        let body: Value = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;
        if body.get("ok").is_none() {
            return Err(MinerError::ProtocolError(format!(
                "please check your wallet address: {}",
                self.wallet
            )));
        }
        Ok(())
    }

    /// Fetches a job from the primary pool
    ///
    /// # Errors
    /// Returns `MinerError` on transport or parse failure
    pub async fn fetch_job(&self) -> Result<RawJob, MinerError> {
        self.fetch_job_from(&self.base).await
    }

    /// Fetches a job from an arbitrary pool (used by the devfee loop)
    ///
    /// # Arguments
    /// * `base` - Base URL of the pool to query
    ///
    /// # Errors
    /// Returns `MinerError` on transport or parse failure
    pub async fn fetch_job_from(&self, base: &Url) -> Result<RawJob, MinerError> {
        let url = base.join("/job")?;
        let job = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;
        Ok(job)
    }

    /// Probes whether the pool offers the push channel
    ///
    /// The pool signals WebSocket support by answering the plain HTTP
    /// probe of `/job-ws` with status 400 (switch protocols).
    ///
    /// # Errors
    /// Returns `MinerError` on transport failure
    pub async fn probe_push(&self) -> Result<bool, MinerError> {
        let url = self.base.join("/job-ws")?;
        let response = self.client.get(url).timeout(REQUEST_TIMEOUT).send().await?;
        Ok(response.status().as_u16() == 400)
    }

    /// Push-channel URL: the pool URL with its scheme switched to
    /// WebSocket
    ///
    /// # Errors
    /// Returns `MinerError` if the pool URL cannot carry a `ws` scheme
    pub fn push_url(&self) -> Result<Url, MinerError> {
        let mut url = self.base.join("/job-ws")?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme).map_err(|_| {
            MinerError::ProtocolError(format!("cannot derive a push URL from {}", self.base))
        })?;
        Ok(url)
    }

    /// Submits a share to its originating pool
    ///
    /// # Arguments
    /// * `share` - The share to submit (carries its own target)
    /// * `timeout` - Per-attempt timeout
    ///
    /// # Errors
    /// Returns `MinerError` on transport or parse failure
    pub async fn submit(
        &self,
        share: &Share,
        timeout: Duration,
    ) -> Result<SubmitOutcome, MinerError> {
        let url = share.target.pool.join("/submit")?;
        let body = json!({
            "inputs": [hex::encode(share.input)],
            "giver": share.giver,
            "miner_addr": share.target.wallet,
        });
        let response: Value = self
            .client
            .post(url)
            .json(&body)
            .timeout(timeout)
            .send()
            .await?
            .json()
            .await?;
        Ok(SubmitOutcome::from_response(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 36 bytes; byte 1 is 0, so the workchain check passes
    fn wallet_b64(byte1: u8) -> String {
        let mut wallet = [0u8; 36];
        wallet[0] = 0x11;
        wallet[1] = byte1;
        for (i, b) in wallet.iter_mut().enumerate().skip(2) {
            *b = i as u8;
        }
        URL_SAFE.encode(wallet)
    }

    fn raw_job(wallet: String) -> RawJob {
        RawJob {
            wallet,
            prefix: "aabbccdd".to_string(),
            expire: 0x01020304,
            seed: "00112233445566778899aabbccddeeff".to_string(),
            complexity: "00000000ffff0000000000000000000000000000000000000000000000000000"
                .to_string(),
            giver: json!("giver-1"),
        }
    }

    fn target() -> SubmitTarget {
        SubmitTarget::new(Url::parse("https://pool.example").unwrap(), "w")
    }

    #[test]
    fn raw_job_deserializes() {
        let job: RawJob = serde_json::from_str(
            r#"{
                "wallet": "AAAA",
                "prefix": "00",
                "expire": 7,
                "seed": "00",
                "complexity": "ff",
                "giver": {"id": 3}
            }"#,
        )
        .unwrap();
        assert_eq!(job.expire, 7);
        assert_eq!(job.giver, json!({"id": 3}));
    }

    #[test]
    fn task_template_has_the_fixed_layout() {
        let task = raw_job(wallet_b64(0)).to_task(target(), false).unwrap();

        assert_eq!(&task.input[..7], &INPUT_HEADER);
        assert_eq!(&task.input[7..11], &[0x01, 0x02, 0x03, 0x04]);
        // wallet bytes 2..34 follow the expiry
        assert_eq!(task.input[11], 2);
        assert_eq!(task.input[42], 33);
        // both prefix copies are identical
        assert_eq!(&task.input[43..75], &task.input[91..123]);
        // the random half of the prefix keeps its first four bytes zero,
        // so the pool prefix shows through unmixed there
        assert_eq!(&task.input[43..47], &[0xaa, 0xbb, 0xcc, 0xdd]);
        // seed sits between the prefix copies
        assert_eq!(
            hex::encode(&task.input[75..91]),
            "00112233445566778899aabbccddeeff"
        );
        assert_eq!(task.complexity[4], 0xff);
        assert!(!task.is_devfee);
    }

    #[test]
    fn prefix_mixing_differs_between_tasks() {
        let job = raw_job(wallet_b64(64));
        let a = job.to_task(target(), false).unwrap();
        let b = job.to_task(target(), false).unwrap();
        // same job, different random prefix
        assert_ne!(&a.input[47..75], &b.input[47..75]);
    }

    #[test]
    fn bad_workchain_byte_is_a_protocol_fault() {
        let err = raw_job(wallet_b64(1)).to_task(target(), false).unwrap_err();
        assert!(matches!(err, MinerError::ProtocolError(_)));
    }

    #[test]
    fn short_wallet_is_a_protocol_fault() {
        let mut job = raw_job(wallet_b64(0));
        job.wallet = URL_SAFE.encode([0u8; 8]);
        assert!(matches!(
            job.to_task(target(), false),
            Err(MinerError::ProtocolError(_))
        ));
    }

    #[test]
    fn submit_outcome_by_field_presence() {
        assert_eq!(
            SubmitOutcome::from_response(&json!({})),
            SubmitOutcome::LegacyAccepted
        );
        assert_eq!(
            SubmitOutcome::from_response(&json!({"accepted": true})),
            SubmitOutcome::Accepted
        );
        assert_eq!(
            SubmitOutcome::from_response(&json!({"accepted": false})),
            SubmitOutcome::Rejected
        );
        // a malformed accepted field is not an acceptance
        assert_eq!(
            SubmitOutcome::from_response(&json!({"accepted": "yes"})),
            SubmitOutcome::Rejected
        );
    }

    #[test]
    fn push_url_swaps_the_scheme() {
        let pool = PoolClient::new(Url::parse("https://eu.ton-pool.com").unwrap(), "w").unwrap();
        assert_eq!(pool.push_url().unwrap().as_str(), "wss://eu.ton-pool.com/job-ws");

        let pool = PoolClient::new(Url::parse("http://localhost:8080").unwrap(), "w").unwrap();
        assert_eq!(pool.push_url().unwrap().as_str(), "ws://localhost:8080/job-ws");
    }
}
