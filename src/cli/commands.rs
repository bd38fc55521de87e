// src/cli/commands.rs
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ton_miner-rs - pool miner for TON-style proof-of-work
#[derive(Parser, Debug)]
#[command(name = "ton-miner-rs")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// The action to perform (start mining, list devices, or generate config)
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the miner application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Start mining against a pool
    Run(RunOptions),

    /// List OpenCL platforms and devices
    Info,

    /// Generate configuration file template
    Config(ConfigOptions),
}

/// Options for starting the mining operation
#[derive(Parser, Debug)]
pub struct RunOptions {
    /// Pool URL (overrides config)
    #[arg(value_name = "POOL_URL")]
    pub pool: Option<String>,

    /// Wallet address (overrides config)
    #[arg(value_name = "WALLET")]
    pub wallet: Option<String>,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// OpenCL platform ID to mine on
    #[arg(short, long)]
    pub platform: Option<usize>,

    /// Device ID to mine on (within each selected platform)
    #[arg(short, long)]
    pub device: Option<usize>,

    /// Number of threads, applied to all devices
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Dump stats to stats.json
    #[arg(long)]
    pub stats: bool,

    /// Show all logs
    #[arg(long)]
    pub debug: bool,

    /// Only show warnings and errors
    #[arg(long)]
    pub silent: bool,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "config.toml")]
    pub output: PathBuf,
}
