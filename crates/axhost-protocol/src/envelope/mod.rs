//! JSON envelopes carried inside frames.
//!
//! Requests are loose JSON objects naming an operation; every other field is
//! handed to the operation as its parameters. Responses always carry the three
//! keys `success`, `data`, and `error`, with absent values written as `null`.

mod request;
mod response;

pub use self::request::{OPERATION_KEY, OPERATION_KEY_LEGACY, RequestEnvelope};
pub use self::response::{ErrorCategory, ErrorDescriptor, ResponseEnvelope, ResponseError};

/// Names the JSON type of `value` for error messages.
pub(crate) const fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
