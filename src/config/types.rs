//! Configuration data types for podwatch.

use std::time::Duration;

use camino::Utf8PathBuf;
use clap::ValueEnum;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::engine::{ClientOptions, TlsSettings};
use crate::error::{ConfigError, Result};

/// Default dial timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Output format of the diagnostic log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human readable records.
    #[default]
    Compact,
    /// One JSON object per record.
    Json,
}

/// Diagnostic logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, such as `info` or `podwatch=debug`.
    pub filter: String,

    /// Record format.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: String::from("info"),
            format: LogFormat::Compact,
        }
    }
}

/// TLS material for network endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TlsConfig {
    /// CA bundle used to verify the engine.
    pub ca_cert_path: Option<Utf8PathBuf>,

    /// Client certificate chain for mutual TLS.
    pub client_cert_path: Option<Utf8PathBuf>,

    /// Client private key for mutual TLS.
    pub client_key_path: Option<Utf8PathBuf>,
}

impl TlsConfig {
    /// Returns whether any TLS path is set.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.ca_cert_path.is_some()
            || self.client_cert_path.is_some()
            || self.client_key_path.is_some()
    }

    /// Checks that the configured paths form a usable combination.
    ///
    /// Once any path is set the CA bundle is required, and the client
    /// certificate and key must be given together.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` without a CA bundle and
    /// `ConfigError::InvalidValue` when only half of the client identity is
    /// set.
    pub fn validate(&self) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        if self.ca_cert_path.is_none() {
            return Err(ConfigError::MissingRequired {
                field: String::from("tls.ca_cert_path"),
            }
            .into());
        }
        match (&self.client_cert_path, &self.client_key_path) {
            (Some(_), None) | (None, Some(_)) => Err(ConfigError::InvalidValue {
                field: String::from("tls"),
                reason: String::from(
                    "client_cert_path and client_key_path must be set together",
                ),
            }
            .into()),
            _ => Ok(()),
        }
    }

    /// Load the TLS settings, or `None` when TLS is not configured.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::validate`], or `TransportError::Tls`
    /// when the PEM files cannot be loaded.
    pub fn load(&self) -> Result<Option<TlsSettings>> {
        self.validate()?;
        let Some(ca_cert) = self.ca_cert_path.as_deref() else {
            return Ok(None);
        };
        let identity = self
            .client_cert_path
            .as_deref()
            .zip(self.client_key_path.as_deref());
        Ok(Some(TlsSettings::from_pem_files(ca_cert, identity)?))
    }
}

/// Root application configuration.
///
/// This structure is loaded from configuration files, environment variables,
/// and command-line arguments with layered precedence. The precedence order
/// (lowest to highest) is: defaults, configuration file, environment variables,
/// command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `PODWATCH_CONFIG_PATH` environment variable
/// 2. `.podwatch.toml` in the current working directory
/// 3. `.podwatch.toml` in the home directory
/// 4. `~/.config/podwatch/config.toml` (XDG default)
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "PODWATCH",
    post_merge_hook,
    discovery(
        app_name = "podwatch",
        env_var = "PODWATCH_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".podwatch.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// The container engine socket path or URL.
    pub engine_socket: Option<String>,

    /// Remote API version, such as `v1.18`.
    pub api_version: Option<String>,

    /// Dial timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    #[ortho_config(skip_cli)]
    pub connect_timeout_secs: u64,

    /// Whether the endpoint is a swarm manager.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub swarm: bool,

    /// TLS material for network endpoints.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub tls: TlsConfig,

    /// Diagnostic logging.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub log: LogConfig,
}

const fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine_socket: None,
            api_version: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            swarm: false,
            tls: TlsConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Assemble client options from this configuration, loading TLS material
    /// if configured.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`TlsConfig::load`].
    pub fn client_options(&self) -> Result<ClientOptions> {
        Ok(ClientOptions {
            api_version: self.api_version.clone(),
            connect_timeout: Some(Duration::from_secs(self.connect_timeout_secs)),
            tls: self.tls.load()?,
            swarm: self.swarm,
        })
    }
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        if self.connect_timeout_secs == 0 {
            self.connect_timeout_secs = DEFAULT_CONNECT_TIMEOUT_SECS;
        }
        Ok(())
    }
}
