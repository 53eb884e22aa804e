//! Command-line argument definitions for podwatch.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Command-line interface for podwatch.
#[derive(Debug, Parser)]
#[command(name = "podwatch")]
#[command(
    author,
    version,
    about = "Inspect and follow a Docker-compatible container engine"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Container engine socket path or URL.
    #[arg(long, global = true)]
    pub engine_socket: Option<String>,

    /// Remote API version.
    #[arg(long, global = true)]
    pub api_version: Option<String>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check that the engine answers.
    Ping,

    /// Show the engine version.
    Version,

    /// List containers.
    Ps(PsArgs),

    /// Print engine events as JSON lines.
    Events(EventsArgs),

    /// Print resource usage of a container as JSON lines.
    Stats(StatsArgs),

    /// Print the logs of a container.
    Logs(LogsArgs),
}

/// Arguments for the `ps` subcommand.
#[derive(Debug, Parser)]
pub struct PsArgs {
    /// Include stopped containers.
    #[arg(long, short)]
    pub all: bool,
}

/// Arguments for the `events` subcommand.
#[derive(Debug, Parser)]
pub struct EventsArgs {
    /// JSON filter expression passed to the engine.
    #[arg(long)]
    pub filters: Option<String>,

    /// Replay events from this many seconds ago and exit.
    #[arg(long)]
    pub since: Option<u64>,

    /// Stop the replay at this many seconds ago.
    #[arg(long, requires = "since")]
    pub until: Option<u64>,
}

/// Arguments for the `stats` subcommand.
#[derive(Debug, Parser)]
pub struct StatsArgs {
    /// Container ID or name.
    #[arg(required = true)]
    pub container: String,
}

/// Arguments for the `logs` subcommand.
#[derive(Debug, Parser)]
pub struct LogsArgs {
    /// Container ID or name.
    #[arg(required = true)]
    pub container: String,

    /// Only show this many trailing lines.
    #[arg(long)]
    pub tail: Option<u64>,

    /// Show engine timestamps.
    #[arg(long)]
    pub timestamps: bool,

    /// The container was created with a TTY, so its logs are not framed.
    #[arg(long)]
    pub tty: bool,
}
