//! Clap derive structures for the `fleetpulse` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so this file may
//! only depend on clap, clap_complete, and humantime.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fleetpulse -- live event stream for your IoT fleet dashboard
#[derive(Debug, Parser)]
#[command(
    name = "fleetpulse",
    version,
    about = "Stream live IoT fleet events from the command line",
    long_about = "Connects to a fleet dashboard's push channel, keeps the connection alive\n\
        with heartbeats and exponential-backoff reconnects, and prints every\n\
        alert, telemetry update, and change notification as it arrives.",
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
    /// Server profile to use
    #[arg(long, short = 'p', env = "FLEETPULSE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Dashboard URL (overrides profile)
    #[arg(long, short = 's', env = "FLEETPULSE_SERVER", global = true)]
    pub server: Option<String>,

    /// Bearer token (overrides profile credentials)
    #[arg(long, env = "FLEETPULSE_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Log output format (logs go to stderr)
    #[arg(long, env = "FLEETPULSE_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and print events as they arrive
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage configuration profiles and credentials
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Print events as JSON lines instead of text
    #[arg(long)]
    pub json: bool,

    /// Stop after this long (e.g. "90s", "5m"); default runs until Ctrl-C
    #[arg(long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Fail if the first connection is not acknowledged within this long
    #[arg(long, value_parser = humantime::parse_duration)]
    pub connect_timeout: Option<Duration>,

    /// Print a device summary table on exit
    #[arg(long)]
    pub summary: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display configured profiles (tokens redacted)
    Show,

    /// Store a profile's token in the system keyring
    SetToken {
        /// Read the token from stdin instead of prompting
        #[arg(long)]
        stdin: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
