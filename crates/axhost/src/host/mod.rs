//! The process host: read, dispatch, and respond until shutdown.
//!
//! [`ProcessHost::run`] owns both protocol streams. A reader task forwards
//! whole frames; the host decodes each one, rejects it or spawns its handler
//! as a tracked task, and queues the response slot for the writer task, which
//! writes responses in request order. `max_in_flight` bounds how many handlers
//! run at once; with a bound of one the host answers requests strictly one
//! after another.
//!
//! The host leaves `Running` when the input channel ends, when the input
//! channel faults, when the output channel fails, or when shutdown is
//! requested through a [`ShutdownHandle`]. In every case it then drains
//! in-flight operations for at most the configured timeout before stopping.
//! While draining after an out-of-band request, frames that still arrive are
//! answered with a `shutdown` error without being dispatched.

mod errors;
mod pipeline;
mod shutdown;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axhost_config::Config;
use axhost_protocol::{FrameError, FrameLimit, FrameRead, ResponseEnvelope};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use self::errors::HostError;
pub use self::shutdown::ShutdownHandle;
pub use self::state::{HostState, ShutdownCause};
use self::pipeline::{FrameResult, PendingResponse, ResponseWriter};
use crate::dispatch::{DispatchError, Dispatcher};
use crate::health::{HostReporter, StructuredHostReporter};
use crate::registry::OperationRegistry;
use crate::tracker::{DrainOutcome, OperationTracker};

/// Tracing target for host events.
pub(crate) const HOST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::host");

/// Response slots queued ahead of the writer before the reader waits.
const RESPONSE_QUEUE_DEPTH: usize = 64;

/// Policy values the host runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostSettings {
    /// Upper bound on the shutdown drain.
    pub drain_timeout: Duration,
    /// Largest accepted frame payload, in both directions.
    pub frame_limit: FrameLimit,
    /// Maximum number of handlers executing at once.
    pub max_in_flight: usize,
}

impl HostSettings {
    /// Resolves settings from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let max_in_flight = usize::try_from(config.max_in_flight())
            .unwrap_or(Semaphore::MAX_PERMITS)
            .clamp(1, Semaphore::MAX_PERMITS);
        Self {
            drain_timeout: config.drain_timeout(),
            frame_limit: FrameLimit::new(config.max_frame_bytes()),
            max_in_flight,
        }
    }
}

impl Default for HostSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// How handling one frame ended.
enum Dispatched {
    /// The response slot is queued for the writer.
    Queued,
    /// The writer has gone away.
    Closed,
    /// Shutdown was requested first; the frame is still owed this answer.
    Interrupted(ResponseEnvelope),
}

/// Summary returned when the host stops cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
    /// What ended the run.
    pub cause: ShutdownCause,
    /// How the drain went.
    pub drain: DrainOutcome,
}

/// Serves one controller over a pair of byte streams.
pub struct ProcessHost {
    dispatcher: Dispatcher,
    registry: Arc<OperationRegistry>,
    reporter: Arc<dyn HostReporter>,
    settings: HostSettings,
    tracker: OperationTracker,
    shutdown: ShutdownHandle,
    state: HostState,
}

impl ProcessHost {
    /// Creates a host serving `registry` with the given settings.
    #[must_use]
    pub fn new(registry: Arc<OperationRegistry>, settings: HostSettings) -> Self {
        let reporter: Arc<dyn HostReporter> = Arc::new(StructuredHostReporter::new());
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&registry), Arc::clone(&reporter)),
            registry,
            reporter,
            settings: Self::sanitise(settings),
            tracker: OperationTracker::new(),
            shutdown: ShutdownHandle::new(),
            state: HostState::Running,
        }
    }

    /// Replaces the lifecycle reporter.
    #[must_use]
    pub fn with_reporter<R>(mut self, reporter: R) -> Self
    where
        R: HostReporter + 'static,
    {
        self.reporter = Arc::new(reporter);
        self.dispatcher = Dispatcher::new(Arc::clone(&self.registry), Arc::clone(&self.reporter));
        self
    }

    /// Shares an existing shutdown trigger with this host.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Returns a handle that requests shutdown of this host.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Returns a handle to the in-flight operation tracker.
    #[must_use]
    pub fn tracker(&self) -> OperationTracker {
        self.tracker.clone()
    }

    /// Returns the settings in force.
    #[must_use]
    pub const fn settings(&self) -> &HostSettings {
        &self.settings
    }

    /// Serves requests from `input` and writes responses to `output` until
    /// shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Transport`] when the input channel is corrupt or
    /// fails, and [`HostError::Write`] or [`HostError::WriterPanicked`] when
    /// responses cannot be written. In-flight work is drained first in every
    /// case.
    pub async fn run<R, W>(mut self, input: R, output: W) -> Result<StopReport, HostError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let limit = self.settings.frame_limit;
        self.reporter.host_started(&self.settings);
        let (reader, mut frames) = pipeline::spawn_reader(input, limit);
        let (responses, pending) = mpsc::channel(RESPONSE_QUEUE_DEPTH);
        let abandon = CancellationToken::new();
        let writer = ResponseWriter {
            limit,
            dispatcher: self.dispatcher.clone(),
            abandon: abandon.clone(),
        }
        .spawn(output, pending);
        let permits = Arc::new(Semaphore::new(self.settings.max_in_flight));
        let mut transport_fault = None;
        let mut owed = None;

        let cause = self
            .serve(
                &mut frames,
                &responses,
                &permits,
                &mut transport_fault,
                &mut owed,
            )
            .await;
        self.state.begin_drain(cause);
        self.reporter.shutdown_requested(cause);
        self.reporter.draining(self.tracker.len());

        let drain = if cause == ShutdownCause::Requested {
            self.drain_rejecting(&mut frames, &responses, owed, &mut transport_fault)
                .await
        } else {
            self.tracker
                .drain_with_timeout(self.settings.drain_timeout)
                .await
        };
        reader.abort();
        drop(frames);
        drop(responses);

        match drain {
            DrainOutcome::Completed { .. } => self.reporter.drain_completed(drain),
            DrainOutcome::TimedOut { .. } => {
                self.reporter.drain_timed_out(drain);
                // Abandoned operations never produce a frame.
                abandon.cancel();
            }
        }
        let written = join_writer(writer).await;

        self.state.stop();
        self.reporter.stopped(cause);
        if let Some(fault) = transport_fault {
            return Err(HostError::Transport(fault));
        }
        written?;
        Ok(StopReport { cause, drain })
    }

    /// Runs the `Running` state until something ends it.
    ///
    /// A response still owed when shutdown interrupts a dispatch is left in
    /// `owed` for the drain to deliver.
    async fn serve(
        &self,
        frames: &mut mpsc::Receiver<FrameResult>,
        responses: &mpsc::Sender<PendingResponse>,
        permits: &Arc<Semaphore>,
        transport_fault: &mut Option<FrameError>,
        owed: &mut Option<ResponseEnvelope>,
    ) -> ShutdownCause {
        loop {
            let next = tokio::select! {
                biased;
                () = self.shutdown.requested() => return ShutdownCause::Requested,
                () = responses.closed() => return ShutdownCause::OutputFault,
                received = frames.recv() => received,
            };
            match next {
                Some(Ok(FrameRead::Frame(payload))) => {
                    match self.dispatch(&payload, responses, permits).await {
                        Dispatched::Queued => {}
                        Dispatched::Closed => return ShutdownCause::OutputFault,
                        Dispatched::Interrupted(envelope) => {
                            *owed = Some(envelope);
                            return ShutdownCause::Requested;
                        }
                    }
                }
                Some(Ok(FrameRead::EndOfChannel)) | None => return ShutdownCause::EndOfChannel,
                Some(Err(fault)) => {
                    self.reporter.transport_fault(&fault);
                    *transport_fault = Some(fault);
                    return ShutdownCause::TransportFault;
                }
            }
        }
    }

    /// Handles one frame.
    ///
    /// Waiting for a handler permit or for room in the response queue gives
    /// way to a shutdown request.
    async fn dispatch(
        &self,
        payload: &[u8],
        responses: &mpsc::Sender<PendingResponse>,
        permits: &Arc<Semaphore>,
    ) -> Dispatched {
        let accepted = match self.dispatcher.accept(payload) {
            Ok(accepted) => accepted,
            Err(error) => {
                let rejection = self.dispatcher.reject(&error);
                return self.queue_ready(responses, rejection).await;
            }
        };
        let refusal = || {
            let error = DispatchError::shutting_down(Some(accepted.operation().to_owned()));
            self.dispatcher.reject(&error)
        };

        let acquired = tokio::select! {
            biased;
            () = self.shutdown.requested() => None,
            permit = Arc::clone(permits).acquire_owned() => permit.ok(),
        };
        let Some(permit) = acquired else {
            return Dispatched::Interrupted(refusal());
        };
        let reserved = tokio::select! {
            biased;
            () = self.shutdown.requested() => None,
            reserved = responses.reserve() => Some(reserved),
        };
        let slot = match reserved {
            None => return Dispatched::Interrupted(refusal()),
            Some(Err(_)) => return Dispatched::Closed,
            Some(Ok(slot)) => slot,
        };

        let operation = accepted.operation().to_owned();
        let guard = self.tracker.begin(operation.as_str());
        let dispatcher = self.dispatcher.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            dispatcher.execute(accepted).await
        });
        debug!(target: HOST_TARGET, operation = %operation, "operation dispatched");
        slot.send(PendingResponse::Running {
            operation,
            task,
            permit,
        });
        Dispatched::Queued
    }

    /// Queues an answer that needs no handler, unless shutdown comes first.
    async fn queue_ready(
        &self,
        responses: &mpsc::Sender<PendingResponse>,
        envelope: ResponseEnvelope,
    ) -> Dispatched {
        tokio::select! {
            biased;
            () = self.shutdown.requested() => Dispatched::Interrupted(envelope),
            reserved = responses.reserve() => match reserved {
                Ok(slot) => {
                    slot.send(PendingResponse::Ready(envelope));
                    Dispatched::Queued
                }
                Err(_) => Dispatched::Closed,
            },
        }
    }

    /// Drains after an out-of-band request, refusing frames that still arrive.
    ///
    /// Queueing a refusal never outlasts the drain bound: once the drain ends
    /// the refusal in hand is dropped.
    async fn drain_rejecting(
        &self,
        frames: &mut mpsc::Receiver<FrameResult>,
        responses: &mpsc::Sender<PendingResponse>,
        mut owed: Option<ResponseEnvelope>,
        transport_fault: &mut Option<FrameError>,
    ) -> DrainOutcome {
        let drain = self.tracker.drain_with_timeout(self.settings.drain_timeout);
        tokio::pin!(drain);
        let mut reading = true;
        loop {
            if let Some(envelope) = owed.take() {
                tokio::select! {
                    biased;
                    outcome = &mut drain => return outcome,
                    sent = responses.send(PendingResponse::Ready(envelope)) => {
                        reading = reading && sent.is_ok();
                    }
                }
                continue;
            }
            tokio::select! {
                biased;
                outcome = &mut drain => return outcome,
                received = frames.recv(), if reading => match received {
                    Some(Ok(FrameRead::Frame(payload))) => {
                        owed = Some(self.dispatcher.reject_for_shutdown(&payload));
                    }
                    Some(Ok(FrameRead::EndOfChannel)) | None => reading = false,
                    Some(Err(fault)) => {
                        self.reporter.transport_fault(&fault);
                        *transport_fault = Some(fault);
                        reading = false;
                    }
                },
            }
        }
    }

    fn sanitise(settings: HostSettings) -> HostSettings {
        HostSettings {
            max_in_flight: settings.max_in_flight.clamp(1, Semaphore::MAX_PERMITS),
            ..settings
        }
    }
}

async fn join_writer(writer: JoinHandle<Result<(), HostError>>) -> Result<(), HostError> {
    match writer.await {
        Ok(result) => result,
        Err(join_error) => Err(HostError::WriterPanicked {
            message: join_error.to_string(),
        }),
    }
}
