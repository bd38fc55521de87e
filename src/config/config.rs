// src/config/config.rs
use crate::utils::error::MinerError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Main configuration structure for the mining application
///
/// Contains all settings needed to run the miner: pool and wallet,
/// device selection, thread count, and the locations of the kernel
/// sources and persisted benchmark records. Every field can also be
/// supplied or overridden on the command line.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Pool base URL (e.g. "https://eu.ton-pool.com")
    #[serde(default)]
    pub pool_url: Option<String>,

    /// Wallet address credited for mined shares
    #[serde(default)]
    pub wallet: Option<String>,

    /// Restrict mining to one OpenCL platform index
    #[serde(default)]
    pub platform: Option<usize>,

    /// Restrict mining to one device index per platform
    #[serde(default)]
    pub device: Option<usize>,

    /// Thread count override, applied to all devices
    /// (default: derived from each device's capabilities)
    #[serde(default)]
    pub threads: Option<usize>,

    /// Dump periodic statistics to the stats file
    #[serde(default)]
    pub stats: bool,

    /// Directory holding the OpenCL kernel sources
    #[serde(default = "default_kernel_dir")]
    pub kernel_dir: PathBuf,

    /// Location of the persisted benchmark records
    #[serde(default = "default_benchmark_file")]
    pub benchmark_file: PathBuf,

    /// Location of the stats dump written when `stats` is enabled
    #[serde(default = "default_stats_file")]
    pub stats_file: PathBuf,
}

fn default_kernel_dir() -> PathBuf {
    "kernels".into()
}

fn default_benchmark_file() -> PathBuf {
    "benchmark_data.txt".into()
}

fn default_stats_file() -> PathBuf {
    "stats.json".into()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pool_url: None,
            wallet: None,
            platform: None,
            device: None,
            threads: None,
            stats: false,
            kernel_dir: default_kernel_dir(),
            benchmark_file: default_benchmark_file(),
            stats_file: default_stats_file(),
        }
    }
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(MinerError)` - If file couldn't be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&config_str)
            .map_err(|e| MinerError::ConfigError(format!("Invalid config format: {}", e)))
    }

    /// Checks that the merged configuration is runnable
    ///
    /// # Returns
    /// The parsed pool URL and the wallet address
    ///
    /// # Errors
    /// Returns `MinerError::ConfigError` when the pool URL or wallet is
    /// missing or the URL does not parse
    pub fn require_pool(&self) -> Result<(Url, String), MinerError> {
        let pool = self
            .pool_url
            .as_deref()
            .ok_or_else(|| MinerError::ConfigError("pool URL is required".to_string()))?;
        let wallet = self
            .wallet
            .clone()
            .ok_or_else(|| MinerError::ConfigError("wallet address is required".to_string()))?;
        let url = Url::parse(pool)
            .map_err(|e| MinerError::ConfigError(format!("invalid pool URL '{}': {}", pool, e)))?;
        Ok((url, wallet))
    }

    /// Generates a configuration template string
    ///
    /// # Returns
    /// String containing a commented TOML configuration template
    pub fn generate_template() -> String {
        let mut template = String::new();
        template.push_str("# ton_miner-rs configuration\n\n");
        template.push_str("pool_url = \"https://eu.ton-pool.com\"\n");
        template.push_str("wallet = \"YOUR_WALLET_ADDRESS\"\n\n");
        template.push_str("# Restrict to one OpenCL platform / device (optional)\n");
        template.push_str("# platform = 0\n");
        template.push_str("# device = 0\n\n");
        template.push_str("# Thread count for all devices (default: per-device auto)\n");
        template.push_str("# threads = 65536\n\n");
        template.push_str("# Dump periodic stats to stats.json\n");
        template.push_str("stats = false\n\n");
        template.push_str("# Where the OpenCL kernel sources live\n");
        template.push_str("kernel_dir = \"kernels\"\n");
        template.push_str("# Where calibration results are persisted\n");
        template.push_str("benchmark_file = \"benchmark_data.txt\"\n");
        template
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_a_minimal_file_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "pool_url = \"https://eu.ton-pool.com\"\nwallet = \"w\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.pool_url.as_deref(), Some("https://eu.ton-pool.com"));
        assert_eq!(config.kernel_dir, PathBuf::from("kernels"));
        assert_eq!(config.benchmark_file, PathBuf::from("benchmark_data.txt"));
        assert!(!config.stats);

        let (url, wallet) = config.require_pool().unwrap();
        assert_eq!(url.as_str(), "https://eu.ton-pool.com/");
        assert_eq!(wallet, "w");
    }

    #[test]
    fn missing_pool_or_wallet_is_a_config_fault() {
        let config = Config::default();
        assert!(matches!(
            config.require_pool(),
            Err(MinerError::ConfigError(_))
        ));
    }

    #[test]
    fn template_round_trips_through_the_parser() {
        let config: Config = toml::from_str(&Config::generate_template()).unwrap();
        assert!(config.pool_url.is_some());
        assert!(config.require_pool().is_ok());
    }
}
