//! Container log retrieval.
//!
//! The logs endpoint answers in one of two shapes. Containers created without
//! a pseudo-terminal produce a multiplexed body of framed records (see
//! [`FrameDecoder`]); containers with a TTY produce raw bytes. The body
//! carries no marker saying which, so callers state the framing up front via
//! [`LogsOptions::framing`].

mod demux;
mod entry;

use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use hyper::body::Body;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use std::fmt;
use tracing::trace;

pub use demux::{DEFAULT_MAX_FRAME_LEN, Frame, FrameDecoder};
pub use entry::{LogEntry, LogStream};

use crate::engine::{EngineClient, EngineRequest};
use crate::error::{PodwatchError, Result, StreamError};

/// How a log body is framed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFraming {
    /// Framed stdout/stderr records, for containers without a TTY.
    #[default]
    Multiplexed,
    /// Unframed bytes, for containers with a TTY.
    Raw,
}

/// Parameters for [`EngineClient::container_logs`].
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault)]
pub struct LogsOptions {
    /// Include standard output.
    #[default = true]
    pub stdout: bool,
    /// Include standard error.
    #[default = true]
    pub stderr: bool,
    /// Ask the engine to prefix each record with its timestamp.
    pub timestamps: bool,
    /// Only return this many trailing lines.
    pub tail: Option<u64>,
    /// Body framing; must match how the container was created.
    pub framing: LogFraming,
}

impl EngineClient {
    /// Fetch the logs of `container_id`.
    ///
    /// # Errors
    ///
    /// Returns the usual dispatch errors, or a `StreamError` when a
    /// multiplexed body is malformed or truncated.
    pub async fn container_logs(
        &self,
        container_id: &str,
        options: &LogsOptions,
    ) -> Result<Vec<LogEntry>> {
        let framing = options.framing;
        let timestamps = options.timestamps;
        self.send_request_streaming(logs_request(container_id, options), |body| async move {
            let entries = read_log_entries(body, framing, timestamps).await?;
            Ok::<_, PodwatchError>(entries)
        })
        .await
    }
}

fn logs_request(container_id: &str, options: &LogsOptions) -> EngineRequest {
    EngineRequest::get(format!("containers/{container_id}/logs"))
        .named("container logs")
        .query("stdout", options.stdout)
        .query("stderr", options.stderr)
        .query("timestamps", options.timestamps)
        .query_opt("tail", options.tail)
}

/// Decode a whole log body into entries.
///
/// Multiplexed bodies yield one entry per frame, in order. A raw body yields
/// a single [`LogStream::Stdout`] entry holding every byte, or nothing when
/// the body is empty.
///
/// # Errors
///
/// Returns `StreamError::Body` when reading fails, and for multiplexed
/// bodies `StreamError::UnknownStream` or `StreamError::Truncated` when the
/// framing is broken.
pub async fn read_log_entries<B>(
    mut body: B,
    framing: LogFraming,
    timestamps: bool,
) -> std::result::Result<Vec<LogEntry>, StreamError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: fmt::Display,
{
    let mut entries = Vec::new();
    let mut decoder = FrameDecoder::new();
    let mut raw = BytesMut::new();

    while let Some(next) = body.frame().await {
        let frame = next.map_err(|error| StreamError::Body {
            message: error.to_string(),
        })?;
        let Ok(data) = frame.into_data() else {
            continue;
        };
        trace!(bytes = data.len(), "log chunk received");
        match framing {
            LogFraming::Raw => raw.extend_from_slice(&data),
            LogFraming::Multiplexed => {
                decoder.push(&data);
                while let Some(Frame { stream, payload }) = decoder.next_frame()? {
                    entries.push(LogEntry::new(stream, payload, timestamps));
                }
            }
        }
    }

    match framing {
        LogFraming::Multiplexed => decoder.finish()?,
        LogFraming::Raw if !raw.is_empty() => {
            entries.push(LogEntry::new(LogStream::Stdout, raw.freeze(), timestamps));
        }
        LogFraming::Raw => {}
    }
    Ok(entries)
}
