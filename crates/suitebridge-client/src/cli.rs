//! Command-line interface definition.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

/// suitebridge - OAuth-backed calendar access and free-slot search
#[derive(Debug, Parser)]
#[command(name = "suitebridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "SUITEBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Emit logs as JSON on stderr
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authentication commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Find free slots in a calendar window
    Free(FreeArgs),

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Authentication actions.
#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Authorize access, reusing a stored credential when it still works
    Login {
        /// Discard the stored token and run the browser flow again
        #[arg(long, short)]
        force: bool,
    },

    /// Show the stored credential without contacting the network
    Status,

    /// Delete the stored token
    Logout,
}

/// Arguments of the `free` command.
#[derive(Debug, Args)]
pub struct FreeArgs {
    /// Window start (RFC 3339, e.g. 2025-03-10T09:00:00Z)
    #[arg(long, value_parser = parse_rfc3339)]
    pub start: DateTime<Utc>,

    /// Window end (RFC 3339)
    #[arg(long, value_parser = parse_rfc3339)]
    pub end: DateTime<Utc>,

    /// Minimum slot length in minutes (defaults to [slots] in config)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub min_duration: Option<u32>,

    /// Calendar to query (defaults to [google] calendar_id in config)
    #[arg(long)]
    pub calendar: Option<String>,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}
