//! Book-keeping for operations that are still executing.
//!
//! Every accepted request is entered into the [`OperationTracker`] before its
//! handler is spawned and removed when the returned [`OperationGuard`] drops,
//! whichever way the operation ends. The tracker exists for shutdown: it lets
//! the host wait, for a bounded time, on the work that was outstanding when
//! shutdown began. Timed-out work is abandoned, not cancelled.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Tracing target for tracker events.
pub(crate) const TRACKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::tracker");

/// Identifier minted for each accepted request.
///
/// Identifiers never leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Mints a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Snapshot entry describing one in-flight operation.
#[derive(Debug, Clone)]
pub struct InFlightOperation {
    /// Tracker key.
    pub id: OperationId,
    /// Operation name.
    pub name: String,
    /// When the operation was entered into the tracker.
    pub started_at: Instant,
}

/// Result of a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every operation in the snapshot finished in time.
    Completed {
        /// Number of operations waited on.
        operations: usize,
    },
    /// The timeout elapsed first.
    TimedOut {
        /// Number of operations in the snapshot.
        operations: usize,
        /// Number still running when the timeout fired.
        abandoned: usize,
    },
}

#[derive(Debug)]
struct Entry {
    name: String,
    started_at: Instant,
    done: watch::Receiver<bool>,
}

type Entries = HashMap<OperationId, Entry>;

/// Thread-safe registry of in-flight operations.
///
/// Cloning yields another handle to the same tracker.
#[derive(Debug, Clone, Default)]
pub struct OperationTracker {
    entries: Arc<Mutex<Entries>>,
}

impl OperationTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a new operation and returns the guard that ends it.
    #[must_use = "dropping the guard immediately ends the operation"]
    pub fn begin(&self, name: impl Into<String>) -> OperationGuard {
        let id = OperationId::new();
        let (done_tx, done_rx) = watch::channel(false);
        let operation = name.into();
        debug!(
            target: TRACKER_TARGET,
            operation_id = %id,
            operation = %operation,
            "operation started"
        );
        self.lock().insert(
            id,
            Entry {
                name: operation,
                started_at: Instant::now(),
                done: done_rx,
            },
        );
        OperationGuard {
            id,
            tracker: self.clone(),
            done: done_tx,
        }
    }

    /// Removes `id` from the tracker.
    ///
    /// Ending an operation that a drain already swept is a no-op.
    pub fn end(&self, id: OperationId) {
        if let Some(entry) = self.lock().remove(&id) {
            debug!(
                target: TRACKER_TARGET,
                operation_id = %id,
                operation = %entry.name,
                elapsed = ?entry.started_at.elapsed(),
                "operation finished"
            );
        }
    }

    /// Lists the operations currently in flight, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<InFlightOperation> {
        let mut operations: Vec<InFlightOperation> = self
            .lock()
            .iter()
            .map(|(id, entry)| InFlightOperation {
                id: *id,
                name: entry.name.clone(),
                started_at: entry.started_at,
            })
            .collect();
        operations.sort_by_key(|operation| operation.started_at);
        operations
    }

    /// Returns the number of operations in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Waits up to `timeout` for the operations in flight at call time.
    ///
    /// Operations that begin after the call are not waited on. Whatever the
    /// outcome, the tracker is empty afterwards; work still running is left
    /// to finish on its own. Draining an empty tracker returns immediately.
    pub async fn drain_with_timeout(&self, timeout: Duration) -> DrainOutcome {
        let pending: Vec<watch::Receiver<bool>> = self
            .lock()
            .values()
            .map(|entry| entry.done.clone())
            .collect();
        let operations = pending.len();
        if operations == 0 {
            debug!(target: TRACKER_TARGET, "drain found no in-flight operations");
            return DrainOutcome::Completed { operations };
        }

        info!(
            target: TRACKER_TARGET,
            operations,
            timeout = ?timeout,
            "waiting for in-flight operations"
        );
        let waits = pending.into_iter().map(|mut done| async move {
            // A dropped sender means the guard is gone, which also ends the wait.
            let _finished = done.wait_for(|finished| *finished).await;
        });
        let outcome = match tokio::time::timeout(timeout, join_all(waits)).await {
            Ok(_) => {
                info!(
                    target: TRACKER_TARGET,
                    operations,
                    "in-flight operations completed"
                );
                DrainOutcome::Completed { operations }
            }
            Err(_) => {
                let abandoned = self.len();
                warn!(
                    target: TRACKER_TARGET,
                    operations,
                    abandoned,
                    timeout = ?timeout,
                    "drain timed out; abandoning in-flight operations"
                );
                DrainOutcome::TimedOut {
                    operations,
                    abandoned,
                }
            }
        };
        self.clear();
        outcome
    }

    /// Forgets every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // Entries hold no invariants a panicking holder could break.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ends its operation when dropped.
///
/// Holding the guard for the lifetime of a handler task guarantees removal on
/// success, failure, and unwinding alike.
#[derive(Debug)]
pub struct OperationGuard {
    id: OperationId,
    tracker: OperationTracker,
    done: watch::Sender<bool>,
}

impl OperationGuard {
    /// Returns the identifier of the tracked operation.
    #[must_use]
    pub const fn id(&self) -> OperationId {
        self.id
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.tracker.end(self.id);
        self.done.send_replace(true);
    }
}
