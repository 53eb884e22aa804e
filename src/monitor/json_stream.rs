//! Incremental decoder for concatenated JSON values.
//!
//! Event and stats endpoints write one JSON object after another with no
//! enclosing array and no delimiter. Bytes arrive in arbitrary chunks, so a
//! value may be split across several reads; the decoder buffers the
//! remainder until the next chunk completes it.

use std::marker::PhantomData;

use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use serde_json::Deserializer;

use crate::error::StreamError;

/// Largest single value the decoder buffers before giving up.
pub const DEFAULT_MAX_UNIT_LEN: usize = 16 * 1024 * 1024;

/// Sans-io decoder yielding one `T` per complete JSON value.
///
/// Objects and arrays are located by a bracket scan that resumes where the
/// previous chunk left off, so each byte is scanned once and parsed once.
#[derive(Debug)]
pub struct JsonStreamDecoder<T> {
    buffer: BytesMut,
    scan: Scan,
    max_unit_len: usize,
    unit: PhantomData<fn() -> T>,
}

impl<T> Default for JsonStreamDecoder<T> {
    fn default() -> Self {
        Self::with_max_unit_len(DEFAULT_MAX_UNIT_LEN)
    }
}

impl<T> JsonStreamDecoder<T> {
    /// Create an empty decoder that rejects values longer than `max` bytes.
    #[must_use]
    pub fn with_max_unit_len(max: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scan: Scan::default(),
            max_unit_len: max,
            unit: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> JsonStreamDecoder<T> {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the body.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Decode the next complete value, if one is buffered.
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Malformed` when the buffered bytes cannot be the
    /// start of a valid value of type `T`, or when a pending value grows past
    /// the length limit.
    pub fn next_unit(&mut self) -> Result<Option<T>, StreamError> {
        if self.scan.offset == 0 {
            let blank = self
                .buffer
                .iter()
                .take_while(|byte| byte.is_ascii_whitespace())
                .count();
            self.buffer.advance(blank);
        }
        let Some(&lead) = self.buffer.first() else {
            return Ok(None);
        };
        if !matches!(lead, b'{' | b'[') {
            return self.next_scalar();
        }

        let Some(len) = self.scan.advance(&self.buffer) else {
            return self.check_pending().map(|()| None);
        };
        self.scan = Scan::default();
        let raw = self.buffer.split_to(len);
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|error| StreamError::Malformed {
                message: error.to_string(),
            })
    }

    /// Check the buffer at end of body.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Truncated` when anything other than whitespace
    /// is left over, meaning the body ended part way through a value.
    pub fn finish(&self) -> Result<(), StreamError> {
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            Ok(())
        } else {
            Err(StreamError::Truncated {
                pending: self.buffer.len(),
            })
        }
    }

    /// Bare strings, numbers and literals are short; parse them directly.
    fn next_scalar(&mut self) -> Result<Option<T>, StreamError> {
        let (outcome, consumed) = {
            let mut values = Deserializer::from_slice(&self.buffer).into_iter::<T>();
            let next = values.next();
            (next, values.byte_offset())
        };

        match outcome {
            None => Ok(None),
            Some(Ok(unit)) => {
                self.buffer.advance(consumed);
                Ok(Some(unit))
            }
            Some(Err(error)) if error.is_eof() => self.check_pending().map(|()| None),
            Some(Err(error)) => Err(StreamError::Malformed {
                message: error.to_string(),
            }),
        }
    }

    fn check_pending(&self) -> Result<(), StreamError> {
        if self.buffer.len() > self.max_unit_len {
            return Err(StreamError::Malformed {
                message: format!(
                    "stream unit exceeds {} bytes without completing",
                    self.max_unit_len
                ),
            });
        }
        Ok(())
    }
}

/// Resumable bracket scan over the value at the front of the buffer.
#[derive(Debug, Default, Clone, Copy)]
struct Scan {
    /// Bytes of the pending value already scanned.
    offset: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Scan {
    /// Continue scanning `bytes`, returning the value's length once its
    /// closing bracket is seen.
    fn advance(&mut self, bytes: &[u8]) -> Option<usize> {
        for (index, &byte) in bytes.iter().enumerate().skip(self.offset) {
            self.offset = index.saturating_add(1);
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }
            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth = self.depth.saturating_add(1),
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(self.offset);
                    }
                }
                _ => {}
            }
        }
        None
    }
}
