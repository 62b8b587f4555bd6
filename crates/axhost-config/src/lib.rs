//! Shared configuration for the accessibility worker host.
//!
//! Configuration is layered with `ortho_config`: built-in defaults, then an
//! optional configuration file, then `AXHOST_*` environment variables, then
//! command-line flags. Every field is optional in the merged representation so
//! that an absent value falls back to the policy defaults in [`defaults`].
//!
//! The host itself never reads configuration directly; the embedding
//! application loads a [`Config`], validates it, and passes the resolved values
//! to the host builder.

pub mod defaults;
mod logging;
mod variant;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::defaults::{
    DEFAULT_DRAIN_TIMEOUT_SECS, DEFAULT_LOG_FILTER, DEFAULT_MAX_IN_FLIGHT,
    PROTOCOL_MAX_FRAME_BYTES, default_drain_timeout, default_log_filter, default_log_format,
    default_variant,
};
pub use self::logging::{LogFormat, LogFormatParseError};
pub use self::variant::WorkerVariant;

/// Resolved worker configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "AXHOST")]
pub struct Config {
    /// Tracing filter expression, for example `info` or `axhost=debug`.
    pub log_filter: Option<String>,
    /// Output format for log records written to stderr.
    pub log_format: Option<LogFormat>,
    /// Seconds to wait for in-flight operations once shutdown begins.
    pub drain_timeout_secs: Option<u64>,
    /// Largest accepted frame payload, in bytes.
    pub max_frame_bytes: Option<u32>,
    /// Maximum number of operations executing at the same time.
    pub max_in_flight: Option<u32>,
    /// Operation set exposed by this process.
    pub variant: Option<WorkerVariant>,
}

impl Config {
    /// Returns the tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Returns the log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_default()
    }

    /// Returns the drain timeout.
    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout_secs
            .map_or_else(default_drain_timeout, Duration::from_secs)
    }

    /// Returns the maximum frame payload size in bytes.
    #[must_use]
    pub fn max_frame_bytes(&self) -> u32 {
        self.max_frame_bytes.unwrap_or(PROTOCOL_MAX_FRAME_BYTES)
    }

    /// Returns the concurrency bound for operation execution.
    #[must_use]
    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT)
    }

    /// Returns the operation set exposed by this process.
    #[must_use]
    pub fn variant(&self) -> WorkerVariant {
        self.variant.unwrap_or_default()
    }

    /// Checks that the resolved values are usable by the host.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the frame bound is zero or exceeds the
    /// protocol ceiling, or when the concurrency bound is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max_frame_bytes = self.max_frame_bytes();
        if max_frame_bytes == 0 || max_frame_bytes > PROTOCOL_MAX_FRAME_BYTES {
            return Err(ConfigError::FrameLimit {
                value: max_frame_bytes,
                ceiling: PROTOCOL_MAX_FRAME_BYTES,
            });
        }
        if self.max_in_flight() == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}

/// Errors raised when a loaded configuration cannot drive the host.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The configured frame bound is outside `1..=ceiling`.
    #[error("max_frame_bytes must be between 1 and {ceiling}, got {value}")]
    FrameLimit {
        /// Configured value.
        value: u32,
        /// Protocol ceiling.
        ceiling: u32,
    },
    /// The concurrency bound was zero.
    #[error("max_in_flight must be at least 1")]
    ZeroConcurrency,
}
