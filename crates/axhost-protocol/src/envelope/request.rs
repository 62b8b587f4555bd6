//! Inbound request envelope.

use serde_json::{Map, Value};

use super::json_type_name;
use crate::error::RequestError;

/// Field naming the requested operation.
pub const OPERATION_KEY: &str = "operation";

/// Capitalised spelling accepted from older callers.
pub const OPERATION_KEY_LEGACY: &str = "Operation";

/// A decoded request: the operation name plus its parameters.
///
/// Parameters are the request object with the operation field removed, so a
/// request of `{"operation":"Echo","text":"hi"}` yields the parameters
/// `{"text":"hi"}`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    operation: String,
    params: Map<String, Value>,
}

impl RequestEnvelope {
    /// Builds a request for `operation` with the given parameter object.
    #[must_use]
    pub fn new(operation: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            operation: operation.into(),
            params,
        }
    }

    /// Decodes a frame payload.
    ///
    /// `operation` takes precedence over `Operation` when both are present;
    /// the losing key stays in the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when the payload is not a JSON object or does
    /// not name an operation with a non-empty string.
    pub fn parse(payload: &[u8]) -> Result<Self, RequestError> {
        let value: Value = serde_json::from_slice(payload).map_err(RequestError::from_json_error)?;
        let Value::Object(mut params) = value else {
            return Err(RequestError::NotAnObject {
                found: json_type_name(&value),
            });
        };

        let key = if params.contains_key(OPERATION_KEY) {
            OPERATION_KEY
        } else if params.contains_key(OPERATION_KEY_LEGACY) {
            OPERATION_KEY_LEGACY
        } else {
            return Err(RequestError::MissingOperation);
        };

        match params.remove(key) {
            Some(Value::String(operation)) if !operation.trim().is_empty() => {
                Ok(Self { operation, params })
            }
            Some(Value::String(_) | Value::Null) | None => Err(RequestError::MissingOperation),
            Some(other) => Err(RequestError::OperationNotString {
                key,
                found: json_type_name(&other),
            }),
        }
    }

    /// Returns the operation name.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the parameter object.
    #[must_use]
    pub const fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Splits the envelope into its operation name and parameters.
    #[must_use]
    pub fn into_parts(self) -> (String, Map<String, Value>) {
        (self.operation, self.params)
    }

    /// Encodes the request as a frame payload.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if a parameter value cannot be serialised.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut object = self.params.clone();
        object.insert(OPERATION_KEY.to_owned(), Value::String(self.operation.clone()));
        serde_json::to_vec(&Value::Object(object))
    }
}
