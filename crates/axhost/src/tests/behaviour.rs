//! Behavioural tests for the host lifecycle.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use axhost_protocol::{ResponseEnvelope, ResponseError};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};
use tokio::runtime::{Builder, Runtime};
use tokio::time::Instant;

use super::support::{
    CallCounter, HostEvent, RecordingReporter, category_of, channel, receive_all, send, settings,
    test_registry,
};
use crate::host::{HostError, ProcessHost, ShutdownCause, StopReport};
use crate::tracker::{DrainOutcome, OperationTracker};

struct HostWorld {
    runtime: Runtime,
    calls: CallCounter,
    reporter: Arc<RecordingReporter>,
    drain_timeout: Duration,
    shutdown_after_first: bool,
    requests: Vec<Value>,
    tracker: Option<OperationTracker>,
    outcome: Option<Result<StopReport, HostError>>,
    responses: Vec<ResponseEnvelope>,
    elapsed: Duration,
}

impl HostWorld {
    fn new() -> Self {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .expect("build test runtime");
        Self {
            runtime,
            calls: CallCounter::default(),
            reporter: Arc::new(RecordingReporter::default()),
            drain_timeout: Duration::from_secs(30),
            shutdown_after_first: false,
            requests: Vec::new(),
            tracker: None,
            outcome: None,
            responses: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Runs a host over the queued requests, closing the input afterwards.
    ///
    /// When asked to, shutdown is requested as soon as the first request is
    /// running, before the rest are sent.
    fn run(&mut self) {
        let host = ProcessHost::new(test_registry(&self.calls), settings(self.drain_timeout, 4))
            .with_reporter(Arc::clone(&self.reporter));
        let tracker = host.tracker();
        let shutdown = host.shutdown_handle();
        let shutdown_after_first = self.shutdown_after_first;
        self.tracker = Some(tracker.clone());
        let requests = std::mem::take(&mut self.requests);
        let (outcome, responses, elapsed) = self.runtime.block_on(async move {
            let (mut controller, streams) = channel();
            let started = Instant::now();
            let running = tokio::spawn(host.run(streams.input, streams.output));
            for (index, request) in requests.iter().enumerate() {
                send(&mut controller.requests, request).await;
                if index == 0 && shutdown_after_first {
                    while tracker.is_empty() {
                        tokio::time::sleep(Duration::from_millis(1)).await;
                    }
                    shutdown.request();
                }
            }
            drop(controller.requests);
            let responses = receive_all(&mut controller.responses).await;
            let outcome = running.await.expect("host task");
            (outcome, responses, started.elapsed())
        });
        self.outcome = Some(outcome);
        self.responses = responses;
        self.elapsed = elapsed;
    }

    fn report(&self) -> StopReport {
        match self.outcome.as_ref() {
            Some(Ok(report)) => *report,
            Some(Err(error)) => panic!("host failed: {error}"),
            None => panic!("host has not run"),
        }
    }

    fn first_response(&self) -> &ResponseEnvelope {
        self.responses.first().expect("at least one response")
    }
}

#[fixture]
fn world() -> RefCell<HostWorld> {
    RefCell::new(HostWorld::new())
}

#[given("a host serving the test operations")]
fn given_host(world: &RefCell<HostWorld>) {
    assert!(world.borrow().outcome.is_none());
}

#[given("a drain timeout of {seconds} seconds")]
fn given_drain_timeout(world: &RefCell<HostWorld>, seconds: u64) {
    world.borrow_mut().drain_timeout = Duration::from_secs(seconds);
}

#[given("shutdown is requested once the first operation is running")]
fn given_shutdown_after_first(world: &RefCell<HostWorld>) {
    world.borrow_mut().shutdown_after_first = true;
}

#[when("the controller sends a {operation} request")]
fn when_sends(world: &RefCell<HostWorld>, operation: String) {
    world
        .borrow_mut()
        .requests
        .push(json!({ "operation": operation }));
}

#[when("the controller sends a Sleep request lasting {millis} milliseconds")]
fn when_sends_sleep(world: &RefCell<HostWorld>, millis: u64) {
    world
        .borrow_mut()
        .requests
        .push(json!({ "operation": "Sleep", "millis": millis }));
}

#[when("the controller sends a request without an operation")]
fn when_sends_without_operation(world: &RefCell<HostWorld>) {
    world.borrow_mut().requests.push(json!({ "text": "hi" }));
}

#[when("the controller closes the input channel")]
fn when_closes(world: &RefCell<HostWorld>) {
    world.borrow_mut().run();
}

#[then("the first response succeeds with the text {text}")]
fn then_succeeds(world: &RefCell<HostWorld>, text: String) {
    let world = world.borrow();
    let response = world.first_response();
    assert!(response.is_success(), "unexpected failure: {response:?}");
    assert_eq!(response.data(), Some(&Value::String(text)));
    assert_eq!(response.error(), None);
}

#[then("the first response fails with category {category}")]
fn then_fails(world: &RefCell<HostWorld>, category: String) {
    let world = world.borrow();
    let response = world.first_response();
    assert!(!response.is_success());
    assert_eq!(response.data(), None);
    assert_eq!(category_of(response), Some(category));
}

#[then("the first response error mentions {text}")]
fn then_error_mentions(world: &RefCell<HostWorld>, text: String) {
    let world = world.borrow();
    let message = world
        .first_response()
        .error()
        .and_then(ResponseError::descriptor)
        .map(|descriptor| descriptor.message.clone())
        .unwrap_or_default();
    assert!(message.contains(&text), "'{message}' does not mention '{text}'");
}

#[then("the last response fails with category {category}")]
fn then_last_fails(world: &RefCell<HostWorld>, category: String) {
    let world = world.borrow();
    let response = world.responses.last().expect("at least one response");
    assert!(!response.is_success());
    assert_eq!(category_of(response), Some(category));
}

#[then("{count} responses are written")]
fn then_response_count(world: &RefCell<HostWorld>, count: usize) {
    assert_eq!(world.borrow().responses.len(), count);
}

#[then("only {count} handler ran")]
fn then_handler_count(world: &RefCell<HostWorld>, count: usize) {
    assert_eq!(world.borrow().calls.get(), count);
}

#[then("no handler ran")]
fn then_no_handler(world: &RefCell<HostWorld>) {
    assert_eq!(world.borrow().calls.get(), 0);
}

#[then("no response is written")]
fn then_no_response(world: &RefCell<HostWorld>) {
    let world = world.borrow();
    assert!(
        world.responses.is_empty(),
        "unexpected responses: {:?}",
        world.responses
    );
}

#[then("the host stopped because of {cause}")]
fn then_stopped_because(world: &RefCell<HostWorld>, cause: String) {
    assert_eq!(world.borrow().report().cause.as_str(), cause);
}

#[then("the drain completed")]
fn then_drain_completed(world: &RefCell<HostWorld>) {
    let report = world.borrow().report();
    assert!(matches!(report.drain, DrainOutcome::Completed { .. }));
}

#[then("the drain timed out abandoning {count} operations")]
fn then_drain_timed_out(world: &RefCell<HostWorld>, count: usize) {
    let report = world.borrow().report();
    assert!(
        matches!(report.drain, DrainOutcome::TimedOut { abandoned, .. } if abandoned == count),
        "unexpected drain outcome: {:?}",
        report.drain
    );
    assert!(
        world
            .borrow()
            .reporter
            .events()
            .iter()
            .any(|event| matches!(event, HostEvent::DrainTimedOut(_))),
        "timeout was not reported"
    );
}

#[then("the tracker is empty")]
fn then_tracker_empty(world: &RefCell<HostWorld>) {
    let world = world.borrow();
    let tracker = world.tracker.as_ref().expect("host has run");
    assert!(tracker.is_empty());
}

#[then("the host walked from running through draining to stopped")]
fn then_walked_lifecycle(world: &RefCell<HostWorld>) {
    let events = world.borrow().reporter.events();
    let position = |wanted: fn(&HostEvent) -> bool| events.iter().position(wanted);
    let started = position(|event| matches!(event, HostEvent::Started));
    let draining = position(|event| matches!(event, HostEvent::Draining(_)));
    let stopped = position(|event| {
        matches!(event, HostEvent::Stopped(ShutdownCause::EndOfChannel))
    });
    assert!(
        started < draining && draining < stopped && started.is_some(),
        "unexpected event order: {events:?}"
    );
}

#[then("the host stopped within {seconds} seconds")]
fn then_stopped_within(world: &RefCell<HostWorld>, seconds: u64) {
    let elapsed = world.borrow().elapsed;
    assert!(
        elapsed <= Duration::from_secs(seconds),
        "host took {elapsed:?}"
    );
}

#[scenario(path = "tests/features/host_lifecycle.feature")]
fn host_lifecycle(world: RefCell<HostWorld>) {
    let _ = world;
}
