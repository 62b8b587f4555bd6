//! Host lifecycle state.

use std::fmt;

use tracing::debug;

use super::HOST_TARGET;

/// What moved the host out of `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// The controller closed the input channel on a frame boundary.
    EndOfChannel,
    /// Shutdown was requested out-of-band through a [`ShutdownHandle`].
    ///
    /// [`ShutdownHandle`]: super::ShutdownHandle
    Requested,
    /// The input channel was corrupt or failed.
    TransportFault,
    /// The output channel failed.
    OutputFault,
}

impl ShutdownCause {
    /// Returns the log spelling of the cause.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EndOfChannel => "end_of_channel",
            Self::Requested => "requested",
            Self::TransportFault => "transport_fault",
            Self::OutputFault => "output_fault",
        }
    }
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a [`ProcessHost`](super::ProcessHost).
///
/// The only transitions are `Running -> Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostState {
    /// Reading and dispatching requests.
    #[default]
    Running,
    /// Waiting for in-flight operations; no request is dispatched.
    Draining(ShutdownCause),
    /// Finished; no further I/O happens.
    Stopped(ShutdownCause),
}

impl HostState {
    /// Returns `true` while requests are dispatched.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns the shutdown cause once the host has left `Running`.
    #[must_use]
    pub const fn cause(self) -> Option<ShutdownCause> {
        match self {
            Self::Running => None,
            Self::Draining(cause) | Self::Stopped(cause) => Some(cause),
        }
    }

    /// Moves from `Running` to `Draining`.
    ///
    /// Returns `false`, leaving the state untouched, if the host already left
    /// `Running`; the first cause wins.
    pub(crate) fn begin_drain(&mut self, cause: ShutdownCause) -> bool {
        if !self.is_running() {
            return false;
        }
        debug!(target: HOST_TARGET, cause = %cause, "host state: running -> draining");
        *self = Self::Draining(cause);
        true
    }

    /// Moves from `Draining` to `Stopped`.
    ///
    /// Returns `false` unless the host was draining.
    pub(crate) fn stop(&mut self) -> bool {
        let Self::Draining(cause) = *self else {
            return false;
        };
        debug!(target: HOST_TARGET, cause = %cause, "host state: draining -> stopped");
        *self = Self::Stopped(cause);
        true
    }
}
