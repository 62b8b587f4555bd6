//! Fatal host errors.

use axhost_protocol::FrameError;
use thiserror::Error;

/// Faults that stop the host.
///
/// The host still drains in-flight work before returning one of these.
#[derive(Debug, Error)]
pub enum HostError {
    /// The input channel was corrupt or failed.
    #[error("input channel fault: {0}")]
    Transport(#[source] FrameError),

    /// A response frame could not be written.
    #[error("failed to write response: {0}")]
    Write(#[source] FrameError),

    /// The response writer task ended abnormally.
    #[error("response writer stopped unexpectedly: {message}")]
    WriterPanicked {
        /// Join failure description.
        message: String,
    },
}
