//! Configuration system for podwatch.
//!
//! This module provides the configuration structures and CLI definitions for
//! the podwatch binary. Layers are merged with `ortho_config`: CLI flags
//! override environment variables, which override configuration files, which
//! override defaults.
//!
//! The configuration file is expected at `~/.config/podwatch/config.toml` by
//! default.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_socket = "tcp://10.0.0.5:2376"
//! api_version = "v1.18"
//! connect_timeout_secs = 10
//!
//! [tls]
//! ca_cert_path = "/etc/podwatch/ca.pem"
//! client_cert_path = "/etc/podwatch/cert.pem"
//! client_key_path = "/etc/podwatch/key.pem"
//!
//! [log]
//! filter = "podwatch=debug"
//! format = "json"
//! ```

mod cli;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{Cli, Commands, EventsArgs, LogsArgs, PsArgs, StatsArgs};
pub use loader::{env_var_names, load_config, load_config_with_env};
pub use types::{AppConfig, DEFAULT_CONNECT_TIMEOUT_SECS, LogConfig, LogFormat, TlsConfig};
