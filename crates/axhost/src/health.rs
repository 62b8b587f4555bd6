//! Structured reporting for host lifecycle events and faults.

use std::sync::Arc;

use axhost_protocol::{FrameError, ResponseError};

use crate::dispatch::DispatchError;
use crate::host::{HostSettings, ShutdownCause};
use crate::tracker::DrainOutcome;

/// Tracing target for lifecycle events.
pub(crate) const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer notified at every host state transition and fault.
pub trait HostReporter: Send + Sync {
    /// Invoked when the host enters `Running`.
    fn host_started(&self, settings: &HostSettings);

    /// Invoked when a shutdown trigger is observed.
    fn shutdown_requested(&self, cause: ShutdownCause);

    /// Invoked on entering `Draining`.
    fn draining(&self, in_flight: usize);

    /// Invoked when a drain finishes in time, or the drain had nothing to wait on.
    fn drain_completed(&self, outcome: DrainOutcome);

    /// Invoked when the drain timeout elapses with work still running.
    fn drain_timed_out(&self, outcome: DrainOutcome);

    /// Invoked on entering `Stopped`.
    fn stopped(&self, cause: ShutdownCause);

    /// Invoked when the input stream is corrupt or fails.
    fn transport_fault(&self, error: &FrameError);

    /// Invoked when a request is answered with an error before reaching a handler.
    fn request_rejected(&self, error: &DispatchError);

    /// Invoked when a handler reports failure or panics.
    fn operation_failed(&self, operation: &str, error: &ResponseError);
}

impl<T> HostReporter for Arc<T>
where
    T: HostReporter + ?Sized,
{
    fn host_started(&self, settings: &HostSettings) {
        (**self).host_started(settings);
    }

    fn shutdown_requested(&self, cause: ShutdownCause) {
        (**self).shutdown_requested(cause);
    }

    fn draining(&self, in_flight: usize) {
        (**self).draining(in_flight);
    }

    fn drain_completed(&self, outcome: DrainOutcome) {
        (**self).drain_completed(outcome);
    }

    fn drain_timed_out(&self, outcome: DrainOutcome) {
        (**self).drain_timed_out(outcome);
    }

    fn stopped(&self, cause: ShutdownCause) {
        (**self).stopped(cause);
    }

    fn transport_fault(&self, error: &FrameError) {
        (**self).transport_fault(error);
    }

    fn request_rejected(&self, error: &DispatchError) {
        (**self).request_rejected(error);
    }

    fn operation_failed(&self, operation: &str, error: &ResponseError) {
        (**self).operation_failed(operation, error);
    }
}

/// Default reporter that records events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHostReporter;

impl StructuredHostReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HostReporter for StructuredHostReporter {
    fn host_started(&self, settings: &HostSettings) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "host_started",
            drain_timeout = ?settings.drain_timeout,
            max_frame_bytes = settings.frame_limit.get(),
            max_in_flight = settings.max_in_flight,
            "worker host running"
        );
    }

    fn shutdown_requested(&self, cause: ShutdownCause) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_requested",
            cause = %cause,
            "shutdown requested"
        );
    }

    fn draining(&self, in_flight: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "draining",
            in_flight,
            "draining in-flight operations"
        );
    }

    fn drain_completed(&self, outcome: DrainOutcome) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "drain_completed",
            outcome = ?outcome,
            "drain completed"
        );
    }

    fn drain_timed_out(&self, outcome: DrainOutcome) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "drain_timed_out",
            outcome = ?outcome,
            "drain timed out"
        );
    }

    fn stopped(&self, cause: ShutdownCause) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "stopped",
            cause = %cause,
            "worker host stopped"
        );
    }

    fn transport_fault(&self, error: &FrameError) {
        let kind = if error.is_corrupt_stream() {
            "corrupt_input"
        } else {
            "io"
        };
        tracing::error!(
            target: HEALTH_TARGET,
            event = "transport_fault",
            kind,
            error = %error,
            "input channel fault"
        );
    }

    fn request_rejected(&self, error: &DispatchError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "request_rejected",
            category = %error.category(),
            operation = error.operation().unwrap_or("<none>"),
            error = %error,
            "request rejected"
        );
    }

    fn operation_failed(&self, operation: &str, error: &ResponseError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "operation_failed",
            operation,
            error = ?error,
            "operation failed"
        );
    }
}
