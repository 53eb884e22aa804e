//! Error classification helpers for engine transport failures.
//!
//! This module converts low-level `hyper-util` client errors into semantic
//! `TransportError` values so callers receive actionable diagnostics.

use crate::error::TransportError;

/// Classify a failed HTTP exchange.
///
/// When no TLS is configured and the failure is anything other than a plain
/// connection refusal, the error is marked with a TLS hint: a plain-text
/// client talking to a TLS engine typically sees the connection reset or a
/// garbled response rather than a refusal.
pub(super) fn classify_request_error(
    error: &hyper_util::client::legacy::Error,
    tls_configured: bool,
) -> TransportError {
    let message = describe_chain(error);
    TransportError::Request {
        tls_hint: !tls_configured && !is_connection_refused(error, &message),
        message,
    }
}

fn is_connection_refused(error: &(dyn std::error::Error + 'static), message: &str) -> bool {
    io_error_kind_in_chain(error) == Some(std::io::ErrorKind::ConnectionRefused)
        || message.to_lowercase().contains("connection refused")
}

/// Render an error and its sources as one line.
fn describe_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(err) = current {
        let text = err.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        current = err.source();
    }
    rendered
}

/// Walk the error source chain looking for an `io::Error` kind.
fn io_error_kind_in_chain(error: &(dyn std::error::Error + 'static)) -> Option<std::io::ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}
