//! Engine endpoint classification.
//!
//! Turns a user-supplied endpoint string into a dial target plus the base URL
//! that request paths are appended to.

use camino::Utf8PathBuf;
use url::Url;

use crate::error::TransportError;

/// Placeholder authority used in request URLs for local socket endpoints.
///
/// Local sockets have no network address, so the URL host is fixed and the
/// socket path is dialled directly.
pub const LOCAL_SOCKET_BASE_URL: &str = "http://docker.sock";

/// Where connections to the engine are dialled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialTarget {
    /// A Unix domain socket at the given filesystem path.
    Unix(Utf8PathBuf),
    /// A TCP address, optionally wrapped in TLS.
    Tcp {
        /// Host name or IP literal (without brackets).
        host: String,
        /// TCP port.
        port: u16,
        /// Whether the connection must be wrapped in TLS.
        tls: bool,
    },
}

/// A parsed engine endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    target: DialTarget,
    base_url: String,
}

impl Endpoint {
    /// Parse an endpoint string.
    ///
    /// Supported forms:
    /// - `unix:///path/to/socket` and bare `/path/to/socket`
    /// - `tcp://host:port` and `host:port`, which become `https` when
    ///   `tls_configured` is set and `http` otherwise
    /// - `http://host:port` and `https://host:port`, used as given
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidEndpoint` for unknown schemes, missing
    /// hosts or ports, and `https` endpoints without TLS configuration.
    pub fn parse(raw: &str, tls_configured: bool) -> Result<Self, TransportError> {
        let trimmed = raw.trim();
        if let Some(path) = trimmed.strip_prefix("unix://") {
            return Self::unix(raw, path);
        }
        if trimmed.starts_with('/') {
            return Self::unix(raw, trimmed);
        }

        let (scheme, rest) = trimmed.split_once("://").unwrap_or(("", trimmed));
        let effective_scheme = match scheme {
            "" | "tcp" if tls_configured => "https",
            "" | "tcp" | "http" => "http",
            "https" => "https",
            other => {
                return Err(invalid(raw, format!("unsupported scheme '{other}'")));
            }
        };
        if effective_scheme == "https" && !tls_configured {
            return Err(invalid(raw, "https endpoints require TLS configuration"));
        }

        let url = Url::parse(&format!("{effective_scheme}://{rest}"))
            .map_err(|error| invalid(raw, error.to_string()))?;
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid(raw, "missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid(raw, "missing port"))?;

        Ok(Self {
            base_url: format!("{effective_scheme}://{host}:{port}"),
            target: DialTarget::Tcp {
                host: host.trim_start_matches('[').trim_end_matches(']').to_owned(),
                port,
                tls: effective_scheme == "https",
            },
        })
    }

    fn unix(raw: &str, path: &str) -> Result<Self, TransportError> {
        if path.is_empty() {
            return Err(invalid(raw, "missing socket path"));
        }
        Ok(Self {
            target: DialTarget::Unix(Utf8PathBuf::from(path)),
            base_url: String::from(LOCAL_SOCKET_BASE_URL),
        })
    }

    /// Returns where connections are dialled.
    #[must_use]
    pub const fn target(&self) -> &DialTarget {
        &self.target
    }

    /// Returns the URL prefix that API paths are appended to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns whether connections are wrapped in TLS.
    #[must_use]
    pub const fn uses_tls(&self) -> bool {
        matches!(self.target, DialTarget::Tcp { tls: true, .. })
    }
}

fn invalid(endpoint: &str, reason: impl Into<String>) -> TransportError {
    TransportError::InvalidEndpoint {
        endpoint: endpoint.to_owned(),
        reason: reason.into(),
    }
}
