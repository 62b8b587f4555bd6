//! Operation sets exposed by the two worker variants.
//!
//! The `worker` variant registers every operation directly. The `monitor`
//! variant registers its own liveness operations and reaches the shared base
//! operations through the registry fallback.

use std::process;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axhost::{
    HandlerFailure, OperationOutcome, OperationRegistry, OperationRegistryBuilder, RegistryError,
    TypedOperation, handler_fn, typed,
};
use axhost_config::WorkerVariant;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Parameters accepted by `Delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelayParams {
    /// How long to sleep, in milliseconds.
    pub millis: u64,
}

/// Result returned by `Delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayResult {
    /// Measured sleep, in whole milliseconds.
    pub elapsed_ms: u64,
}

/// Result returned by `ProcessInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfoResult {
    /// Operating system process identifier.
    pub pid: u32,
    /// Variant the process runs as.
    pub variant: WorkerVariant,
    /// Worker package version.
    pub version: String,
}

/// Result returned by `Heartbeat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResult {
    /// Time since the registry was built, in whole milliseconds.
    pub uptime_ms: u64,
}

struct Delay;

#[async_trait]
impl TypedOperation for Delay {
    type Params = DelayParams;
    type Output = DelayResult;

    async fn run(&self, params: DelayParams) -> Result<DelayResult, HandlerFailure> {
        let started = tokio::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(params.millis)).await;
        Ok(DelayResult {
            elapsed_ms: whole_millis(started.elapsed()),
        })
    }
}

struct ProcessInfo {
    variant: WorkerVariant,
}

#[async_trait]
impl TypedOperation for ProcessInfo {
    type Params = IgnoredAny;
    type Output = ProcessInfoResult;

    async fn run(&self, _params: IgnoredAny) -> Result<ProcessInfoResult, HandlerFailure> {
        Ok(ProcessInfoResult {
            pid: process::id(),
            variant: self.variant,
            version: env!("CARGO_PKG_VERSION").to_owned(),
        })
    }
}

struct Heartbeat {
    started: Instant,
}

#[async_trait]
impl TypedOperation for Heartbeat {
    type Params = IgnoredAny;
    type Output = HeartbeatResult;

    async fn run(&self, _params: IgnoredAny) -> Result<HeartbeatResult, HandlerFailure> {
        Ok(HeartbeatResult {
            uptime_ms: whole_millis(self.started.elapsed()),
        })
    }
}

fn whole_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn register_ping(builder: &mut OperationRegistryBuilder) -> Result<(), RegistryError> {
    builder.register(
        "Ping",
        handler_fn(|_request| async { OperationOutcome::Success(json!("pong")) }),
    )
}

/// Builds the operations both variants answer: `Echo` and `ProcessInfo`.
///
/// # Errors
///
/// Returns [`RegistryError`] if a name is registered twice.
pub fn base_operations(variant: WorkerVariant) -> Result<OperationRegistry, RegistryError> {
    let mut builder = OperationRegistry::builder();
    builder.register(
        "Echo",
        handler_fn(|request| async move { OperationOutcome::Success(request.params) }),
    )?;
    builder.register("ProcessInfo", typed(ProcessInfo { variant }))?;
    Ok(builder.build())
}

/// Builds the registry for `variant`.
///
/// # Errors
///
/// Returns [`RegistryError`] if a name is registered twice.
pub fn registry_for(variant: WorkerVariant) -> Result<OperationRegistry, RegistryError> {
    let mut builder = OperationRegistry::builder();
    register_ping(&mut builder)?;
    match variant {
        WorkerVariant::Worker => {
            let base = base_operations(variant)?;
            for name in base.names() {
                if let Some(handler) = base.lookup(name) {
                    builder.register_shared(name, handler)?;
                }
            }
            builder.register("Delay", typed(Delay))?;
        }
        WorkerVariant::Monitor => {
            builder.register(
                "Heartbeat",
                typed(Heartbeat {
                    started: Instant::now(),
                }),
            )?;
            builder.fallback(base_operations(variant)?);
        }
    }
    Ok(builder.build())
}
