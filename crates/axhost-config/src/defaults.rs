//! Policy defaults applied when a configuration layer leaves a field unset.
//!
//! The drain timeout and frame bound mirror the wire protocol's fixed policy;
//! configuration may lower them but the host never exceeds the protocol cap.

use std::time::Duration;

use crate::logging::LogFormat;
use crate::variant::WorkerVariant;

/// Default log filter expression used by the worker binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default bound on how long shutdown waits for in-flight operations.
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;

/// Largest payload the wire protocol admits (10 MiB).
pub const PROTOCOL_MAX_FRAME_BYTES: u32 = 10 * 1024 * 1024;

/// Default number of operations allowed to execute concurrently.
pub const DEFAULT_MAX_IN_FLIGHT: u32 = 16;

/// Default log filter expression used by the worker binary.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the worker binary.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default drain timeout.
#[must_use]
pub const fn default_drain_timeout() -> Duration {
    Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS)
}

/// Default operation set.
#[must_use]
pub const fn default_variant() -> WorkerVariant {
    WorkerVariant::Worker
}
