//! Command-line interface for serviced.
use clap::{Parser, Subcommand};

use crate::constants::DEFAULT_LOG_LINES;

/// Command-line interface for serviced.
#[derive(Parser)]
#[command(name = "serviced", version, author)]
#[command(
    about = "Lightweight service manager for systemd .service files (no systemd required)",
    long_about = None
)]
pub struct Cli {
    /// Preview actions without executing them.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Enable verbose/debug output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also pkill stale processes by executable basename before a start.
    #[arg(long, global = true)]
    pub aggressive_clean: bool,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for serviced.
#[derive(Subcommand)]
pub enum Commands {
    /// Start a service, or all enabled services when no name is given.
    Start {
        /// Service name (optional for autostart).
        service: Option<String>,
    },

    /// Stop a service.
    Stop {
        /// Service name.
        service: String,
    },

    /// Restart a service.
    Restart {
        /// Service name.
        service: String,
    },

    /// Enable a service to start automatically.
    Enable {
        /// Service name.
        service: String,
    },

    /// Disable a service.
    Disable {
        /// Service name.
        service: String,
    },

    /// Show service status.
    Status {
        /// Service name.
        service: String,
    },

    /// Show service log.
    Log {
        /// Service name.
        service: String,

        /// Number of log lines to show.
        #[arg(short = 'n', long, default_value_t = DEFAULT_LOG_LINES)]
        lines: usize,
    },

    /// List all services.
    List,

    /// List running services.
    ListRunning,

    /// Show version.
    Version,
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
