// src/config/mod.rs
//! Configuration management for the miner
//!
//! This module handles all configuration-related functionality including:
//! - Loading and parsing configuration files
//! - Generating configuration templates
//! - Merging command-line overrides
//!
//! The configuration uses TOML format; every setting can also be given
//! on the command line, which wins over the file.

/// Core configuration implementation
///
/// Contains the [`Config`] struct and related helpers that define
/// the miner's configuration structure and behavior.
pub mod config;

// Re-export key items for easy access
pub use config::Config;

use crate::utils::error::MinerError;
use std::path::Path;

/// Loads the configuration file, falling back to defaults when the
/// file does not exist
///
/// A present-but-broken file is still an error; only absence is
/// forgiven, since every required setting can come from the command
/// line instead.
///
/// # Arguments
/// * `path` - Path to the configuration file
///
/// # Errors
/// Returns `MinerError` if the file exists but cannot be parsed
pub fn load_or_default(path: &Path) -> Result<Config, MinerError> {
    if path.exists() {
        Config::load(path)
    } else {
        Ok(Config::default())
    }
}

/// Generates a commented configuration template
///
/// # Returns
/// String containing a ready-to-use TOML configuration template
pub fn generate_template() -> String {
    Config::generate_template()
}
