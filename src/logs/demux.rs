//! Multiplexed log frame decoder.
//!
//! Without a pseudo-terminal the engine interleaves stdout and stderr in one
//! body. Each frame is an 8-byte header followed by its payload:
//!
//! ```text
//! [selector, 0, 0, 0, len3, len2, len1, len0] payload...
//! ```
//!
//! The selector names the stream; the last four header bytes hold the
//! payload length as a big-endian `u32`.

use bytes::{Buf, Bytes, BytesMut};

use super::entry::LogStream;
use crate::error::StreamError;

const HEADER_LEN: usize = 8;

/// Largest frame payload the decoder accepts.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Stream the payload belongs to.
    pub stream: LogStream,
    /// Frame payload.
    pub payload: Bytes,
}

/// Incremental decoder for multiplexed log bodies.
///
/// Bytes may be pushed in chunks of any size; a frame is only yielded once
/// its header and whole payload have arrived.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty decoder that rejects payloads longer than `max` bytes.
    #[must_use]
    pub fn with_max_frame_len(max: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame_len: max,
        }
    }

    /// Append received bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Take the next complete frame, if one has been buffered.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::UnknownStream` as soon as a header names a
    /// selector other than 0, 1 or 2, and `StreamError::Malformed` when a
    /// header declares a payload longer than the limit.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, StreamError> {
        let Some((selector, length)) = parse_header(&self.buffer) else {
            return Ok(None);
        };
        let stream = LogStream::from_selector(selector)?;
        let Some(total) = usize::try_from(length)
            .ok()
            .filter(|payload_len| *payload_len <= self.max_frame_len)
            .and_then(|payload_len| payload_len.checked_add(HEADER_LEN))
        else {
            return Err(StreamError::Malformed {
                message: format!(
                    "frame length {length} exceeds the {} byte limit",
                    self.max_frame_len
                ),
            });
        };
        if self.buffer.len() < total {
            return Ok(None);
        }

        self.buffer.advance(HEADER_LEN);
        let payload = self.buffer.split_to(total.saturating_sub(HEADER_LEN)).freeze();
        Ok(Some(Frame { stream, payload }))
    }

    /// Signal end of body.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Truncated` when the body ended part way through
    /// a header or payload.
    pub fn finish(&self) -> Result<(), StreamError> {
        if self.buffer.is_empty() {
            Ok(())
        } else {
            Err(StreamError::Truncated {
                pending: self.buffer.len(),
            })
        }
    }
}

#[expect(
    clippy::big_endian_bytes,
    reason = "the frame header encodes its payload length big-endian"
)]
fn parse_header(buffer: &[u8]) -> Option<(u8, u32)> {
    let [selector, _, _, _, l0, l1, l2, l3] = *buffer.first_chunk::<HEADER_LEN>()?;
    Some((selector, u32::from_be_bytes([l0, l1, l2, l3])))
}
