//! Outbound response envelope.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message used when a handler fails without saying why.
const MISSING_DETAIL: &str = "operation failed without error detail";

/// Broad class of a failed request, written into every [`ErrorDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The request payload could not be decoded.
    Decode,
    /// No handler or fallback claimed the operation.
    Dispatch,
    /// The handler failed or panicked.
    Handler,
    /// The host is shutting down and rejected the request.
    Shutdown,
}

impl ErrorCategory {
    /// Returns the wire spelling of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Dispatch => "dispatch",
            Self::Handler => "handler",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error details produced by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorDescriptor {
    /// Operation the request named, when one could be extracted.
    pub operation: Option<String>,
    /// Failure class.
    pub category: ErrorCategory,
    /// Human-readable explanation.
    pub message: String,
}

impl ErrorDescriptor {
    /// Creates a descriptor with no associated operation.
    #[must_use]
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            operation: None,
            category,
            message: message.into(),
        }
    }

    /// Attaches the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }
}

/// The `error` member of a failed response.
///
/// Handlers that fail with their own structured error have it passed through
/// untouched as [`ResponseError::Detail`]; everything else is described by an
/// [`ErrorDescriptor`]. The wire form is untagged, so a failed response always
/// holds the normalised error: a detail shaped exactly like a descriptor is
/// stored as one, and a `null` detail is replaced by a `handler` descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseError {
    /// Host-generated description.
    Descriptor(ErrorDescriptor),
    /// Structured error supplied by a handler.
    Detail(Value),
}

impl ResponseError {
    /// Returns the host descriptor, if this is one.
    #[must_use]
    pub const fn descriptor(&self) -> Option<&ErrorDescriptor> {
        match self {
            Self::Descriptor(descriptor) => Some(descriptor),
            Self::Detail(_) => None,
        }
    }

    fn normalised(self) -> Self {
        match self {
            Self::Detail(Value::Null) => Self::Descriptor(ErrorDescriptor::new(
                ErrorCategory::Handler,
                MISSING_DETAIL,
            )),
            Self::Detail(detail) => {
                ErrorDescriptor::deserialize(&detail).map_or(Self::Detail(detail), Self::Descriptor)
            }
            descriptor @ Self::Descriptor(_) => descriptor,
        }
    }
}

impl From<ErrorDescriptor> for ResponseError {
    fn from(descriptor: ErrorDescriptor) -> Self {
        Self::Descriptor(descriptor)
    }
}

/// Response written for every accepted request.
///
/// `data` is only meaningful when `success` is `true` and `error` only when
/// it is `false`. A successful `null` result is stored as `None`, so decoding
/// an encoded envelope always yields an equal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    success: bool,
    data: Option<Value>,
    error: Option<ResponseError>,
}

impl ResponseEnvelope {
    /// Creates a successful response carrying `data`.
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: match data {
                Value::Null => None,
                other => Some(other),
            },
            error: None,
        }
    }

    /// Creates a failed response.
    ///
    /// The error is normalised as described on [`ResponseError`], so the
    /// envelope decodes back to an equal value.
    #[must_use]
    pub fn failure(error: impl Into<ResponseError>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into().normalised()),
        }
    }

    /// Returns `true` for successful responses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the result data of a successful response.
    #[must_use]
    pub const fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Returns the error of a failed response.
    #[must_use]
    pub const fn error(&self) -> Option<&ResponseError> {
        self.error.as_ref()
    }

    /// Encodes the envelope as a frame payload.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the data cannot be serialised.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes an envelope from a frame payload.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the payload is not a response envelope.
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
