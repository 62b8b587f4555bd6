//! Errors raised by the frame codec and request decoding.
//!
//! I/O errors are wrapped in `Arc` so the enums stay cheap to clone and small
//! enough for the `result_large_err` lint.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Transport-level failures while reading or writing a frame.
///
/// A clean end of stream is not an error; it is reported as
/// [`FrameRead::EndOfChannel`](crate::frame::FrameRead::EndOfChannel).
#[derive(Debug, Clone, Error)]
pub enum FrameError {
    /// The stream ended part-way through a frame.
    #[error("truncated frame: expected {expected} bytes, received {received}")]
    Truncated {
        /// Bytes the current frame section required.
        expected: usize,
        /// Bytes delivered before the stream ended.
        received: usize,
    },

    /// The length prefix is zero or exceeds the frame limit.
    #[error("malformed frame length {length} (limit {limit} bytes)")]
    MalformedLength {
        /// Decoded length prefix.
        length: u32,
        /// Largest accepted payload.
        limit: u32,
    },

    /// An outbound payload is empty or too large to frame.
    #[error("cannot frame payload of {size} bytes (limit {limit} bytes)")]
    PayloadSize {
        /// Size of the rejected payload.
        size: usize,
        /// Largest accepted payload.
        limit: u32,
    },

    /// The underlying stream failed.
    #[error("frame I/O failed: {0}")]
    Io(#[source] Arc<io::Error>),
}

impl FrameError {
    /// Returns `true` when the inbound byte stream itself is corrupt.
    ///
    /// Corrupt input cannot be resynchronised, so callers treat these faults
    /// as fatal rather than as a peer hang-up.
    #[must_use]
    pub const fn is_corrupt_stream(&self) -> bool {
        matches!(self, Self::Truncated { .. } | Self::MalformedLength { .. })
    }
}

impl From<io::Error> for FrameError {
    fn from(error: io::Error) -> Self {
        Self::Io(Arc::new(error))
    }
}

/// Failures decoding a request payload into a [`RequestEnvelope`].
///
/// [`RequestEnvelope`]: crate::envelope::RequestEnvelope
#[derive(Debug, Error)]
pub enum RequestError {
    /// The payload is not valid UTF-8 JSON.
    #[error("malformed request JSON: {message}")]
    MalformedJson {
        /// Parser message.
        message: String,
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },

    /// The payload is valid JSON but not an object.
    #[error("request must be a JSON object, found {found}")]
    NotAnObject {
        /// JSON type that was found instead.
        found: &'static str,
    },

    /// Neither `operation` nor `Operation` carries a non-empty string.
    #[error("request is missing a non-empty 'operation' field")]
    MissingOperation,

    /// The operation field holds something other than a string.
    #[error("'{key}' must be a string, found {found}")]
    OperationNotString {
        /// Key that held the operation.
        key: &'static str,
        /// JSON type that was found instead.
        found: &'static str,
    },
}

impl RequestError {
    /// Creates a malformed JSON error from a parser error.
    #[must_use]
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::MalformedJson {
            message: source.to_string(),
            source,
        }
    }
}
