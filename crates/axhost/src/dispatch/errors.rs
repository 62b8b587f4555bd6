//! Per-request failures answered with an error envelope.
//!
//! None of these end the host loop; each is converted into an
//! [`ErrorDescriptor`] whose category tells the caller which stage failed.

use axhost_protocol::{ErrorCategory, ErrorDescriptor, RequestError};
use thiserror::Error;

/// Errors surfaced while decoding, routing, or executing one request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The payload was not a JSON object.
    #[error("malformed request: {source}")]
    MalformedJson {
        /// Decoder error.
        #[source]
        source: RequestError,
    },

    /// The request named no operation.
    #[error("request is missing a non-empty 'operation' field")]
    MissingOperation,

    /// Neither the registry nor the fallback claimed the operation.
    #[error("No operation found for: {operation}")]
    UnknownOperation {
        /// Requested operation.
        operation: String,
    },

    /// The request fields did not match the operation's parameters.
    #[error("invalid parameters for '{operation}': {message}")]
    InvalidParameters {
        /// Requested operation.
        operation: String,
        /// Decoder message.
        message: String,
    },

    /// The handler reported a plain failure.
    #[error("operation '{operation}' failed: {message}")]
    HandlerFailed {
        /// Requested operation.
        operation: String,
        /// Handler message.
        message: String,
    },

    /// The handler panicked.
    #[error("operation '{operation}' panicked: {message}")]
    HandlerPanicked {
        /// Requested operation.
        operation: String,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// The host is shutting down.
    #[error("worker is shutting down; operation rejected")]
    ShuttingDown {
        /// Requested operation, when one could be extracted.
        operation: Option<String>,
    },
}

impl DispatchError {
    /// Maps a request decoding failure.
    #[must_use]
    pub fn from_request_error(source: RequestError) -> Self {
        match source {
            RequestError::MissingOperation => Self::MissingOperation,
            other => Self::MalformedJson { source: other },
        }
    }

    /// Creates an unknown operation error.
    #[must_use]
    pub fn unknown_operation(operation: impl Into<String>) -> Self {
        Self::UnknownOperation {
            operation: operation.into(),
        }
    }

    /// Creates an invalid parameters error.
    #[must_use]
    pub fn invalid_parameters(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a handler failure error.
    #[must_use]
    pub fn handler_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a handler panic error.
    #[must_use]
    pub fn handler_panicked(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerPanicked {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a shutdown rejection.
    #[must_use]
    pub const fn shutting_down(operation: Option<String>) -> Self {
        Self::ShuttingDown { operation }
    }

    /// Returns the failure class reported to the caller.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedJson { .. }
            | Self::MissingOperation
            | Self::InvalidParameters { .. } => ErrorCategory::Decode,
            Self::UnknownOperation { .. } => ErrorCategory::Dispatch,
            Self::HandlerFailed { .. } | Self::HandlerPanicked { .. } => ErrorCategory::Handler,
            Self::ShuttingDown { .. } => ErrorCategory::Shutdown,
        }
    }

    /// Returns the operation the request named, if known.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::MalformedJson { .. } | Self::MissingOperation => None,
            Self::UnknownOperation { operation }
            | Self::InvalidParameters { operation, .. }
            | Self::HandlerFailed { operation, .. }
            | Self::HandlerPanicked { operation, .. } => Some(operation.as_str()),
            Self::ShuttingDown { operation } => operation.as_deref(),
        }
    }

    /// Builds the descriptor written into the response envelope.
    #[must_use]
    pub fn to_descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            operation: self.operation().map(str::to_owned),
            category: self.category(),
            message: self.to_string(),
        }
    }
}
