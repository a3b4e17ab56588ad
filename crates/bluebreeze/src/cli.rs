//! Clap derive structures for the `bluebreeze` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// bluebreeze -- drive the BLE bridge core with a simulated radio
#[derive(Debug, Parser)]
#[command(
    name = "bluebreeze",
    version,
    about = "Drive the BlueBreeze BLE bridge with a simulated radio",
    long_about = "Runs a scripted BLE producer against the bridge core and prints \
        every event the bridge forwards.\n\n\
        Events go to stdout; logs go to stderr.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "BLUEBREEZE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the scripted producer and print forwarded events
    Simulate(SimulateArgs),

    /// Inspect or create the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Number of simulated peripherals
    #[arg(long, short = 'd')]
    pub devices: Option<usize>,

    /// Data ticks after discovery
    #[arg(long, short = 't')]
    pub ticks: Option<u32>,

    /// Delay between ticks in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Drop scan sightings weaker than this RSSI (dBm)
    #[arg(long, allow_negative_numbers = true)]
    pub min_rssi: Option<i16>,

    /// Event output format
    #[arg(long, short = 'f', value_enum, default_value_t = EventFormat::Text)]
    pub format: EventFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventFormat {
    /// One aligned line per event
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the default config file location
    Path,

    /// Print the effective configuration as TOML
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
