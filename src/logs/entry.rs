//! Decoded log records.

use std::borrow::Cow;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::StreamError;

/// Output stream a log record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    /// Standard input echoed back by the engine.
    Stdin,
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl LogStream {
    /// Map a frame header selector byte to a stream.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::UnknownStream` for selectors other than 0, 1
    /// and 2.
    pub const fn from_selector(selector: u8) -> Result<Self, StreamError> {
        match selector {
            0 => Ok(Self::Stdin),
            1 => Ok(Self::Stdout),
            2 => Ok(Self::Stderr),
            other => Err(StreamError::UnknownStream { selector: other }),
        }
    }
}

/// One log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Stream the record was written to.
    pub stream: LogStream,
    /// Engine timestamp, when timestamps were requested and present.
    pub timestamp: Option<OffsetDateTime>,
    /// Record bytes, without the timestamp prefix.
    pub payload: Bytes,
}

impl LogEntry {
    /// Build an entry, splitting off a leading timestamp when requested.
    ///
    /// With timestamps requested, a payload that starts with an RFC 3339
    /// token followed by a space is split into the parsed timestamp and the
    /// remaining bytes. Anything else is kept whole.
    #[must_use]
    pub fn new(stream: LogStream, payload: Bytes, timestamps: bool) -> Self {
        if timestamps && let Some((timestamp, rest)) = split_timestamp(&payload) {
            return Self {
                stream,
                timestamp: Some(timestamp),
                payload: rest,
            };
        }
        Self {
            stream,
            timestamp: None,
            payload,
        }
    }

    /// Returns the payload as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

fn split_timestamp(payload: &Bytes) -> Option<(OffsetDateTime, Bytes)> {
    let space = payload.iter().position(|byte| *byte == b' ')?;
    let (token, _) = payload.split_at_checked(space)?;
    let parsed = OffsetDateTime::parse(std::str::from_utf8(token).ok()?, &Rfc3339).ok()?;
    Some((parsed, payload.slice(space.saturating_add(1)..)))
}
