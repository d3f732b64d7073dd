//! Command line interface for the `netcondition` binary.
//!
//! Kept free of crate imports so the build script can render the man page
//! from it.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Command line arguments for the `netcondition` binary.
#[derive(Debug, Parser)]
#[command(
    name = "netcondition",
    version,
    about = "Inspect and simulate traffic-condition profiles"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the built-in condition presets.
    Presets,
    /// List the built-in scenario bundles and their routes.
    Scenarios,
    /// Validate a TOML configuration file without applying it.
    Check {
        /// Configuration file to validate.
        path: PathBuf,
    },
    /// Simulate requests against a preset in virtual time.
    Simulate(SimulateArgs),
}

/// Options for `simulate`.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Preset to simulate.
    #[arg(long, default_value = "3g")]
    pub preset: String,
    /// Pattern the preset is registered under.
    #[arg(long, default_value = "**")]
    pub pattern: String,
    /// Path every simulated request targets.
    #[arg(long, default_value = "/api/simulated")]
    pub path: String,
    /// Number of requests.
    #[arg(short = 'n', long, default_value_t = 100)]
    pub requests: usize,
    /// Seed for reproducible draws.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Time of day used for peak windows, as HH:MM.
    #[arg(long, value_name = "HH:MM")]
    pub at: Option<String>,
    /// Print Prometheus metrics gathered during the run.
    #[arg(long)]
    pub metrics: bool,
}
