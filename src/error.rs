//! Semantic error types for the podwatch client.
//!
//! This module defines the error hierarchy for podwatch, following the principle of
//! using semantic error enums (via `thiserror`) for conditions the caller might
//! inspect, retry, or map to an HTTP status, while reserving opaque errors
//! (`eyre::Report`) for the application boundary.
//!
//! The client never retries. Transport failures, status failures and stream
//! decode failures are surfaced exactly once and left to the caller.

use std::sync::Arc;

use thiserror::Error;

/// Hint appended to transport failures that may stem from a TLS mismatch.
const TLS_HINT: &str = ". Are you trying to connect to a TLS-enabled engine without TLS?";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

const fn tls_hint_suffix(tls_hint: &bool) -> &'static str {
    if *tls_hint { TLS_HINT } else { "" }
}

/// Errors raised while reaching the container engine.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The engine endpoint could not be parsed into a usable URL.
    #[error("invalid engine endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The endpoint as supplied.
        endpoint: String,
        /// Why the endpoint was rejected.
        reason: String,
    },

    /// TLS material could not be loaded or assembled.
    #[error("failed to configure TLS: {message}")]
    Tls {
        /// A description of the TLS failure.
        message: String,
    },

    /// The HTTP exchange failed before a status line was received.
    #[error("{message}{}", tls_hint_suffix(.tls_hint))]
    Request {
        /// The underlying transport failure.
        message: String,
        /// Whether the failure may be caused by a plain-text client talking
        /// to a TLS endpoint.
        tls_hint: bool,
    },

    /// The response body could not be read to completion.
    #[error("failed to read response body: {message}")]
    Body {
        /// A description of the read failure.
        message: String,
    },

    /// The engine answered the ping with something other than `OK`, or the
    /// ping itself failed.
    #[error("container engine health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the failure.
        message: String,
    },

    /// The ping did not complete in time.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout that elapsed.
        seconds: u64,
    },
}

/// Errors reported by the engine API itself.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The engine answered with a status code of 400 or above.
    #[error("{status}: {reason}")]
    Status {
        /// Numeric HTTP status code.
        status: u16,
        /// Canonical status text.
        reason: String,
    },

    /// A request could not be assembled.
    #[error("failed to build {what} request: {message}")]
    Encode {
        /// The operation whose request failed.
        what: &'static str,
        /// A description of the failure.
        message: String,
    },

    /// A one-shot response could not be decoded.
    #[error("failed to decode {what} response: {message}")]
    Decode {
        /// The operation whose response was malformed.
        what: &'static str,
        /// A description of the decode failure.
        message: String,
    },

    /// The engine answered with a body missing a field the client needs.
    #[error("{what} response is missing '{field}'")]
    MissingField {
        /// The operation whose response was incomplete.
        what: &'static str,
        /// The absent field.
        field: &'static str,
    },

    /// The operation is not available against this kind of endpoint.
    #[error("{operation} is not supported by {endpoint_kind} endpoints")]
    Unsupported {
        /// The rejected operation.
        operation: &'static str,
        /// The kind of endpoint that rejected it.
        endpoint_kind: &'static str,
    },
}

/// Errors raised while decoding an open, streaming response body.
///
/// A stream delivers at most one of these, after which it terminates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// A structured-data unit was malformed.
    #[error("malformed stream unit: {message}")]
    Malformed {
        /// The decoder's description of the problem.
        message: String,
    },

    /// The body ended part way through a unit or frame.
    #[error("stream truncated: {pending} undecoded byte(s) at end of body")]
    Truncated {
        /// Bytes received that never formed a complete unit.
        pending: usize,
    },

    /// A multiplexed log frame named an unknown output stream.
    #[error("unknown log stream selector {selector}")]
    UnknownStream {
        /// The stream selector byte from the frame header.
        selector: u8,
    },

    /// Reading the body failed mid-stream.
    #[error("failed reading stream body: {message}")]
    Body {
        /// A description of the read failure.
        message: String,
    },
}

/// Top-level error type for the podwatch client.
///
/// This enum aggregates all domain-specific errors into a single type that can
/// be used throughout the crate. At the application boundary (main.rs),
/// these errors are converted to `eyre::Report` for human-readable reporting.
#[derive(Debug, Error)]
pub enum PodwatchError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred reaching the engine.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The engine rejected or garbled a request.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A streaming response could not be decoded.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl PodwatchError {
    /// Returns the HTTP status code when this is a status failure.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api(ApiError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Returns whether the engine reported `404 Not Found`.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status_code(), Some(404))
    }

    /// Returns whether the engine reported `500 Internal Server Error`.
    #[must_use]
    pub const fn is_server_internal_error(&self) -> bool {
        matches!(self.status_code(), Some(500))
    }
}

/// A specialised `Result` type for podwatch operations.
pub type Result<T> = std::result::Result<T, PodwatchError>;
