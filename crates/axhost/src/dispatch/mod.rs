//! Request decoding, routing, and outcome conversion.
//!
//! The dispatcher turns a frame payload into either an accepted request bound
//! to a handler, or a [`DispatchError`] answered without running anything.
//! Accepted requests are executed by the host on their own task; the
//! dispatcher converts whatever they produce into a [`ResponseEnvelope`].

mod errors;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use axhost_protocol::{RequestEnvelope, ResponseEnvelope, ResponseError};
use serde_json::Value;
use tracing::debug;

pub use self::errors::DispatchError;
use crate::health::HostReporter;
use crate::registry::{
    FallbackHandler, HandlerFailure, OperationHandler, OperationOutcome, OperationRegistry,
    OperationRequest,
};

/// Tracing target for dispatch events.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Where an accepted request is routed.
enum Route {
    Handler(Arc<dyn OperationHandler>),
    Fallback(Arc<dyn FallbackHandler>),
}

/// A decoded request with its route resolved.
pub(crate) struct Accepted {
    request: OperationRequest,
    route: Route,
}

impl Accepted {
    /// Returns the operation name.
    pub(crate) fn operation(&self) -> &str {
        &self.request.name
    }
}

impl fmt::Debug for Accepted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let route = match self.route {
            Route::Handler(_) => "handler",
            Route::Fallback(_) => "fallback",
        };
        f.debug_struct("Accepted")
            .field("operation", &self.request.name)
            .field("route", &route)
            .finish()
    }
}

/// Routes requests against a frozen registry.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    registry: Arc<OperationRegistry>,
    reporter: Arc<dyn HostReporter>,
}

impl Dispatcher {
    pub(crate) fn new(registry: Arc<OperationRegistry>, reporter: Arc<dyn HostReporter>) -> Self {
        Self { registry, reporter }
    }

    /// Decodes `payload` and resolves its handler.
    ///
    /// Names missing from the registry are routed to the fallback hook when
    /// one is installed; the fallback decides later whether to claim them.
    pub(crate) fn accept(&self, payload: &[u8]) -> Result<Accepted, DispatchError> {
        let envelope = RequestEnvelope::parse(payload).map_err(DispatchError::from_request_error)?;
        let (name, params) = envelope.into_parts();
        let route = match (self.registry.lookup(&name), self.registry.fallback()) {
            (Some(handler), _) => Route::Handler(handler),
            (None, Some(fallback)) => Route::Fallback(fallback),
            (None, None) => return Err(DispatchError::unknown_operation(name)),
        };
        debug!(
            target: DISPATCH_TARGET,
            operation = %name,
            fallback = matches!(route, Route::Fallback(_)),
            "request accepted"
        );
        Ok(Accepted {
            request: OperationRequest::new(name, Value::Object(params)),
            route,
        })
    }

    /// Runs an accepted request to completion.
    pub(crate) async fn execute(&self, accepted: Accepted) -> ResponseEnvelope {
        let Accepted { request, route } = accepted;
        let operation = request.name.clone();
        let outcome = match route {
            Route::Handler(handler) => handler.execute(request).await,
            Route::Fallback(fallback) => {
                let Some(outcome) = fallback.try_handle(request).await else {
                    return self.reject(&DispatchError::unknown_operation(operation));
                };
                outcome
            }
        };
        self.complete(&operation, outcome)
    }

    /// Answers a request that never reached a handler.
    pub(crate) fn reject(&self, error: &DispatchError) -> ResponseEnvelope {
        self.reporter.request_rejected(error);
        ResponseEnvelope::failure(error.to_descriptor())
    }

    /// Answers a request received after shutdown began.
    ///
    /// The operation name is recovered from the payload when possible so the
    /// caller can tell which request was refused.
    pub(crate) fn reject_for_shutdown(&self, payload: &[u8]) -> ResponseEnvelope {
        let operation = RequestEnvelope::parse(payload)
            .ok()
            .map(|envelope| envelope.operation().to_owned());
        self.reject(&DispatchError::shutting_down(operation))
    }

    /// Answers a request whose handler panicked.
    pub(crate) fn panicked(&self, operation: &str, payload: &(dyn Any + Send)) -> ResponseEnvelope {
        let message = panic_message(payload);
        self.fail(
            operation,
            DispatchError::handler_panicked(operation, message)
                .to_descriptor()
                .into(),
        )
    }

    /// Converts a handler outcome into the response envelope.
    pub(crate) fn complete(&self, operation: &str, outcome: OperationOutcome) -> ResponseEnvelope {
        match outcome {
            OperationOutcome::Success(data) => ResponseEnvelope::success(data),
            OperationOutcome::Failure(HandlerFailure::Structured(Value::Null)) => self.fail(
                operation,
                DispatchError::handler_failed(operation, "operation failed without error detail")
                    .to_descriptor()
                    .into(),
            ),
            OperationOutcome::Failure(HandlerFailure::Structured(detail)) => {
                self.fail(operation, ResponseError::Detail(detail))
            }
            OperationOutcome::Failure(HandlerFailure::Message(message)) => self.fail(
                operation,
                DispatchError::handler_failed(operation, message)
                    .to_descriptor()
                    .into(),
            ),
            OperationOutcome::Failure(HandlerFailure::InvalidParameters(message)) => self.fail(
                operation,
                DispatchError::invalid_parameters(operation, message)
                    .to_descriptor()
                    .into(),
            ),
        }
    }

    fn fail(&self, operation: &str, error: ResponseError) -> ResponseEnvelope {
        self.reporter.operation_failed(operation, &error);
        ResponseEnvelope::failure(error)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_owned())
}
