//! Request/response host for accessibility worker processes.
//!
//! A worker process is driven by a single controller over its standard
//! streams. Each request arrives as a length-prefixed JSON frame naming an
//! operation; the host looks the operation up in an [`OperationRegistry`],
//! runs the handler on the async runtime, and writes exactly one response
//! envelope per request, in request order.
//!
//! The moving parts are:
//!
//! - [`OperationRegistry`] maps operation names to [`OperationHandler`]s, with
//!   an optional [`FallbackHandler`] for names it does not contain.
//! - [`OperationTracker`] records every operation that is still executing so a
//!   shutdown can wait for it, within a bound.
//! - [`ProcessHost`] owns the protocol streams and walks the
//!   `Running -> Draining -> Stopped` lifecycle.
//! - [`HostReporter`] observes lifecycle transitions and faults;
//!   [`StructuredHostReporter`] turns them into `tracing` records on stderr.
//!
//! Standard output belongs to the protocol. Nothing in this crate, and no
//! handler, may write to it directly.

mod dispatch;
mod health;
mod host;
mod registry;
pub mod telemetry;
mod tracker;

pub use dispatch::DispatchError;
pub use health::{HostReporter, StructuredHostReporter};
pub use host::{
    HostError, HostSettings, HostState, ProcessHost, ShutdownCause, ShutdownHandle, StopReport,
};
pub use registry::{
    FallbackHandler, HandlerFailure, HandlerFn, OperationHandler, OperationOutcome,
    OperationRegistry, OperationRegistryBuilder, OperationRequest, RegistryError, Typed,
    TypedOperation, handler_fn, typed,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use tracker::{DrainOutcome, InFlightOperation, OperationGuard, OperationId, OperationTracker};

#[cfg(test)]
mod tests;
