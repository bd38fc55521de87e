// src/cli/mod.rs
//! Command-line interface definitions
//!
//! Declares the `run`, `info` and `config` subcommands and their
//! options. Parsing is handled by `clap`; anything given here wins
//! over the configuration file.

/// Subcommand and option structs
pub mod commands;

// Re-export for easier access
pub use commands::{Action, Commands, ConfigOptions, RunOptions};
