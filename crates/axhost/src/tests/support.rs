//! Shared harness for host tests: reporters, registries, and frame I/O.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axhost_protocol::{
    FrameError, FrameLimit, FrameRead, ResponseEnvelope, ResponseError, read_frame, write_frame,
};
use async_trait::async_trait;
use mockall::mock;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};

use crate::dispatch::DispatchError;
use crate::health::HostReporter;
use crate::host::{HostSettings, ShutdownCause};
use crate::registry::{
    HandlerFailure, OperationHandler, OperationOutcome, OperationRegistry, OperationRequest,
    handler_fn,
};
use crate::tracker::DrainOutcome;

mock! {
    pub Reporter {}
    impl HostReporter for Reporter {
        fn host_started(&self, settings: &HostSettings);
        fn shutdown_requested(&self, cause: ShutdownCause);
        fn draining(&self, in_flight: usize);
        fn drain_completed(&self, outcome: DrainOutcome);
        fn drain_timed_out(&self, outcome: DrainOutcome);
        fn stopped(&self, cause: ShutdownCause);
        fn transport_fault(&self, error: &FrameError);
        fn request_rejected(&self, error: &DispatchError);
        fn operation_failed(&self, operation: &str, error: &ResponseError);
    }
}

/// Reporter that accepts every event without checking it.
pub(crate) fn quiet_reporter() -> MockReporter {
    let mut reporter = MockReporter::new();
    reporter.expect_host_started().return_const(());
    reporter.expect_shutdown_requested().return_const(());
    reporter.expect_draining().return_const(());
    reporter.expect_drain_completed().return_const(());
    reporter.expect_drain_timed_out().return_const(());
    reporter.expect_stopped().return_const(());
    reporter.expect_transport_fault().return_const(());
    reporter.expect_request_rejected().return_const(());
    reporter.expect_operation_failed().return_const(());
    reporter
}

/// Lifecycle events captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HostEvent {
    Started,
    ShutdownRequested(ShutdownCause),
    Draining(usize),
    DrainCompleted(DrainOutcome),
    DrainTimedOut(DrainOutcome),
    Stopped(ShutdownCause),
    TransportFault,
    RequestRejected(String),
    OperationFailed(String),
}

/// Records lifecycle events for assertions.
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    events: Mutex<Vec<HostEvent>>,
}

impl RecordingReporter {
    pub(crate) fn events(&self) -> Vec<HostEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, event: HostEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl HostReporter for RecordingReporter {
    fn host_started(&self, _settings: &HostSettings) {
        self.record(HostEvent::Started);
    }

    fn shutdown_requested(&self, cause: ShutdownCause) {
        self.record(HostEvent::ShutdownRequested(cause));
    }

    fn draining(&self, in_flight: usize) {
        self.record(HostEvent::Draining(in_flight));
    }

    fn drain_completed(&self, outcome: DrainOutcome) {
        self.record(HostEvent::DrainCompleted(outcome));
    }

    fn drain_timed_out(&self, outcome: DrainOutcome) {
        self.record(HostEvent::DrainTimedOut(outcome));
    }

    fn stopped(&self, cause: ShutdownCause) {
        self.record(HostEvent::Stopped(cause));
    }

    fn transport_fault(&self, _error: &FrameError) {
        self.record(HostEvent::TransportFault);
    }

    fn request_rejected(&self, error: &DispatchError) {
        self.record(HostEvent::RequestRejected(error.category().to_string()));
    }

    fn operation_failed(&self, operation: &str, _error: &ResponseError) {
        self.record(HostEvent::OperationFailed(operation.to_owned()));
    }
}

/// Counts handler invocations across a test registry.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub(crate) fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Registry used by host tests.
///
/// - `Ping` answers `"pong"`.
/// - `Echo` returns its parameters.
/// - `Sleep` waits `millis` milliseconds and returns `{"slept": millis}`.
/// - `Fail` reports a plain failure.
/// - `Explode` panics.
pub(crate) fn test_registry(calls: &CallCounter) -> Arc<OperationRegistry> {
    let mut builder = OperationRegistry::builder();
    let ping_calls = calls.clone();
    builder
        .register(
            "Ping",
            handler_fn(move |_request| {
                ping_calls.bump();
                async { OperationOutcome::Success(json!("pong")) }
            }),
        )
        .expect("register Ping");
    let echo_calls = calls.clone();
    builder
        .register(
            "Echo",
            handler_fn(move |request| {
                echo_calls.bump();
                async move { OperationOutcome::Success(request.params) }
            }),
        )
        .expect("register Echo");
    let sleep_calls = calls.clone();
    builder
        .register(
            "Sleep",
            handler_fn(move |request| {
                sleep_calls.bump();
                async move {
                    let Some(millis) = request.params.get("millis").and_then(Value::as_u64) else {
                        return OperationOutcome::Failure(HandlerFailure::InvalidParameters(
                            "millis is required".to_owned(),
                        ));
                    };
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    OperationOutcome::Success(json!({ "slept": millis }))
                }
            }),
        )
        .expect("register Sleep");
    let fail_calls = calls.clone();
    builder
        .register(
            "Fail",
            handler_fn(move |_request| {
                fail_calls.bump();
                async { OperationOutcome::failure("deliberate failure") }
            }),
        )
        .expect("register Fail");
    builder
        .register("Explode", Explode(calls.clone()))
        .expect("register Explode");
    Arc::new(builder.build())
}

/// Handler that always panics.
struct Explode(CallCounter);

#[async_trait]
impl OperationHandler for Explode {
    async fn execute(&self, _request: OperationRequest) -> OperationOutcome {
        self.0.bump();
        panic!("handler exploded");
    }
}

/// Settings with a custom drain timeout and concurrency bound.
pub(crate) fn settings(drain_timeout: Duration, max_in_flight: usize) -> HostSettings {
    HostSettings {
        drain_timeout,
        frame_limit: FrameLimit::PROTOCOL,
        max_in_flight,
    }
}

/// Controller-side ends of a host's streams.
pub(crate) struct Controller {
    pub(crate) requests: DuplexStream,
    pub(crate) responses: DuplexStream,
}

/// Host-side ends of a host's streams.
pub(crate) struct HostStreams {
    pub(crate) input: DuplexStream,
    pub(crate) output: DuplexStream,
}

/// Creates connected stream pairs for a host and its controller.
pub(crate) fn channel() -> (Controller, HostStreams) {
    let (requests, input) = tokio::io::duplex(64 * 1024);
    let (output, responses) = tokio::io::duplex(64 * 1024);
    (
        Controller {
            requests,
            responses,
        },
        HostStreams { input, output },
    )
}

/// Writes `request` as one frame.
pub(crate) async fn send<W>(writer: &mut W, request: &Value)
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(request).expect("encode request");
    write_frame(writer, &payload, FrameLimit::PROTOCOL)
        .await
        .expect("write request frame");
}

/// Reads one response frame.
pub(crate) async fn receive<R>(reader: &mut R) -> ResponseEnvelope
where
    R: AsyncRead + Unpin,
{
    match read_frame(reader, FrameLimit::PROTOCOL)
        .await
        .expect("read response frame")
    {
        FrameRead::Frame(payload) => {
            ResponseEnvelope::from_slice(&payload).expect("decode response")
        }
        FrameRead::EndOfChannel => panic!("response channel closed early"),
    }
}

/// Reads response frames until the host closes its output.
pub(crate) async fn receive_all<R>(reader: &mut R) -> Vec<ResponseEnvelope>
where
    R: AsyncRead + Unpin,
{
    let mut responses = Vec::new();
    while let FrameRead::Frame(payload) = read_frame(reader, FrameLimit::PROTOCOL)
        .await
        .expect("read response frame")
    {
        responses.push(ResponseEnvelope::from_slice(&payload).expect("decode response"));
    }
    responses
}

/// Returns the error category of a failed response.
pub(crate) fn category_of(response: &ResponseEnvelope) -> Option<String> {
    response
        .error()
        .and_then(ResponseError::descriptor)
        .map(|descriptor| descriptor.category.to_string())
}
