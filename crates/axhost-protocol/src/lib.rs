//! Wire protocol shared by the worker host and its controller.
//!
//! Each direction of a worker's standard I/O carries a sequence of frames. A
//! frame is a four-byte little-endian length followed by exactly that many
//! bytes of UTF-8 JSON:
//!
//! ```text
//! +------------------+------------------------------+
//! | length (4 bytes, | payload (length bytes,       |
//! | little-endian)   | UTF-8 JSON)                  |
//! +------------------+------------------------------+
//! ```
//!
//! The controller writes [`RequestEnvelope`] payloads and the worker answers
//! each with exactly one [`ResponseEnvelope`]. The [`frame`] module owns the
//! byte-level codec; the [`envelope`] module owns the JSON shapes.
//!
//! # Example
//!
//! ```
//! use axhost_protocol::{ResponseEnvelope, frame::{FrameLimit, FrameRead, read_frame, write_frame}};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let mut wire = Vec::new();
//! let response = ResponseEnvelope::success(serde_json::json!("pong"));
//! write_frame(&mut wire, &response.to_bytes().unwrap(), FrameLimit::PROTOCOL).await.unwrap();
//!
//! let mut reader = wire.as_slice();
//! let FrameRead::Frame(payload) = read_frame(&mut reader, FrameLimit::PROTOCOL).await.unwrap() else {
//!     panic!("expected a frame");
//! };
//! assert_eq!(ResponseEnvelope::from_slice(&payload).unwrap(), response);
//! # });
//! ```

pub mod envelope;
pub mod error;
pub mod frame;

pub use self::envelope::{
    ErrorCategory, ErrorDescriptor, OPERATION_KEY, OPERATION_KEY_LEGACY, RequestEnvelope,
    ResponseEnvelope, ResponseError,
};
pub use self::error::{FrameError, RequestError};
pub use self::frame::{
    FrameLimit, FrameRead, FrameReader, FrameWriter, MAX_FRAME_BYTES, read_frame, write_frame,
};
