//! Maps process signals onto the host's shutdown trigger.

use std::io;

use axhost::ShutdownHandle;
use tokio::task::JoinHandle;
use tracing::info;

const SIGNAL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::signals");

/// Spawns a task that requests shutdown on the first SIGINT or SIGTERM.
///
/// Must be called from within the runtime.
#[cfg(unix)]
pub(crate) fn forward_shutdown_signals(shutdown: ShutdownHandle) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        info!(target: SIGNAL_TARGET, signal = name, "shutdown signal received");
        shutdown.request();
    }))
}

/// Spawns a task that requests shutdown on the first Ctrl-C.
#[cfg(not(unix))]
#[expect(
    clippy::unnecessary_wraps,
    reason = "signature matches the unix listener"
)]
pub(crate) fn forward_shutdown_signals(shutdown: ShutdownHandle) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target: SIGNAL_TARGET, signal = "ctrl_c", "shutdown signal received");
            shutdown.request();
        }
    }))
}
