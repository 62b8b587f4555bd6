//! Handler abstractions consumed by the registry.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A decoded request handed to a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    /// Operation name the request resolved to.
    pub name: String,
    /// Request fields other than the operation name, as a JSON object.
    pub params: Value,
}

impl OperationRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// Failure reported by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerFailure {
    /// Plain message; the host wraps it in a `handler` category descriptor.
    Message(String),
    /// The request fields did not match the operation's parameters.
    InvalidParameters(String),
    /// Structured error passed through to the caller untouched.
    Structured(Value),
}

/// Result of executing an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    /// The operation succeeded with the given data.
    Success(Value),
    /// The operation failed.
    Failure(HandlerFailure),
}

impl OperationOutcome {
    /// Serialises `data` into a successful outcome.
    ///
    /// A value that cannot be represented as JSON becomes a failure.
    #[must_use]
    pub fn from_serialize<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::Success(value),
            Err(error) => Self::failure(format!("failed to serialise result: {error}")),
        }
    }

    /// Creates a failure carrying a plain message.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(HandlerFailure::Message(message.into()))
    }

    /// Creates a failure carrying a structured error.
    #[must_use]
    pub const fn structured_failure(detail: Value) -> Self {
        Self::Failure(HandlerFailure::Structured(detail))
    }

    /// Returns `true` for successful outcomes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Executes one named operation.
///
/// Handlers run on the async runtime alongside other in-flight operations.
/// They must not write to stdout; the host owns the output channel.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Executes the operation.
    async fn execute(&self, request: OperationRequest) -> OperationOutcome;
}

/// Claims operations the registry has no handler for.
///
/// Returning `None` leaves the operation unclaimed, which the host reports as
/// a dispatch fault.
#[async_trait]
pub trait FallbackHandler: Send + Sync {
    /// Attempts to handle an operation missing from the registry.
    async fn try_handle(&self, request: OperationRequest) -> Option<OperationOutcome>;
}

/// An operation with typed parameters and result.
///
/// Wrap implementations with [`typed`] to register them.
#[async_trait]
pub trait TypedOperation: Send + Sync {
    /// Parameters decoded from the request fields.
    type Params: DeserializeOwned + Send;
    /// Result encoded into the response `data`.
    type Output: Serialize + Send;

    /// Runs the operation.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerFailure`] describing why the operation failed.
    async fn run(&self, params: Self::Params) -> Result<Self::Output, HandlerFailure>;
}

/// Adapter exposing a [`TypedOperation`] as an [`OperationHandler`].
#[derive(Debug)]
pub struct Typed<T>(T);

/// Wraps a typed operation for registration.
#[must_use]
pub const fn typed<T: TypedOperation>(operation: T) -> Typed<T> {
    Typed(operation)
}

#[async_trait]
impl<T> OperationHandler for Typed<T>
where
    T: TypedOperation,
{
    async fn execute(&self, request: OperationRequest) -> OperationOutcome {
        let params = match serde_json::from_value::<T::Params>(request.params) {
            Ok(params) => params,
            Err(error) => {
                return OperationOutcome::Failure(HandlerFailure::InvalidParameters(
                    error.to_string(),
                ));
            }
        };
        match self.0.run(params).await {
            Ok(output) => OperationOutcome::from_serialize(&output),
            Err(failure) => OperationOutcome::Failure(failure),
        }
    }
}

/// Adapter exposing an async closure as an [`OperationHandler`].
pub struct HandlerFn<F, Fut> {
    function: F,
    _future: PhantomData<fn() -> Fut>,
}

/// Wraps an async closure for registration.
///
/// ```
/// use axhost::{OperationOutcome, handler_fn};
///
/// let ping = handler_fn(|_request| async { OperationOutcome::Success("pong".into()) });
/// # let _ = ping;
/// ```
#[must_use]
pub const fn handler_fn<F, Fut>(function: F) -> HandlerFn<F, Fut>
where
    F: Fn(OperationRequest) -> Fut + Send + Sync,
    Fut: Future<Output = OperationOutcome> + Send,
{
    HandlerFn {
        function,
        _future: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> OperationHandler for HandlerFn<F, Fut>
where
    F: Fn(OperationRequest) -> Fut + Send + Sync,
    Fut: Future<Output = OperationOutcome> + Send,
{
    async fn execute(&self, request: OperationRequest) -> OperationOutcome {
        (self.function)(request).await
    }
}
