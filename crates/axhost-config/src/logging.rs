//! Record formats for the worker's diagnostic stream.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How log records are rendered on standard error.
///
/// Standard output is reserved for response frames, so the format only
/// affects what a supervising process reads from the worker's stderr.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per record, with event fields flattened.
    #[default]
    Json,
    /// Single-line text for a developer watching the worker directly.
    Compact,
}

impl LogFormat {
    /// Returns `true` when records are machine-readable.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Error returned when `AXHOST_LOG_FORMAT` or `--log-format` names no format.
pub type LogFormatParseError = strum::ParseError;
