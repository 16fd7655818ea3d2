//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Network device configuration backup and drift detection.
#[derive(Parser, Debug)]
#[command(name = "cfgdrift", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "cfgdrift.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Back up all devices, compare against stored snapshots, and write
    /// diff reports where warranted.
    Run,

    /// Explain diff reports written within the configured lookback window
    /// and forward the explanations.
    Explain,

    /// Write a template configuration file and exit.
    Init,
}
