//! Unit tests for the operation registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rstest::{fixture, rstest};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::*;

fn pong() -> impl OperationHandler {
    handler_fn(|_request| async { OperationOutcome::Success(json!("pong")) })
}

#[fixture]
fn builder() -> OperationRegistryBuilder {
    OperationRegistry::builder()
}

#[rstest]
fn registers_and_looks_up_handlers(mut builder: OperationRegistryBuilder) {
    builder.register("Ping", pong()).expect("register Ping");
    builder.register("Echo", pong()).expect("register Echo");
    let registry = builder.build();

    assert_eq!(registry.len(), 2);
    assert!(registry.lookup("Ping").is_some());
    assert_eq!(registry.names(), vec!["Echo", "Ping"]);
}

#[rstest]
fn lookup_is_case_sensitive(mut builder: OperationRegistryBuilder) {
    builder.register("Ping", pong()).expect("register Ping");
    let registry = builder.build();

    assert!(registry.lookup("ping").is_none());
    assert!(registry.lookup("PING").is_none());
}

#[rstest]
fn rejects_duplicate_registration(mut builder: OperationRegistryBuilder) {
    builder.register("Ping", pong()).expect("first registration");
    let error = builder
        .register("Ping", pong())
        .expect_err("duplicate must be rejected");
    assert_eq!(
        error,
        RegistryError::Duplicate {
            name: "Ping".to_owned()
        }
    );
}

#[rstest]
#[case("")]
#[case("  ")]
fn rejects_blank_names(mut builder: OperationRegistryBuilder, #[case] name: &str) {
    let error = builder
        .register(name, pong())
        .expect_err("blank name must be rejected");
    assert_eq!(error, RegistryError::EmptyName);
}

#[test]
fn empty_registry_has_no_fallback() {
    let registry = OperationRegistry::default();
    assert!(registry.is_empty());
    assert!(registry.fallback().is_none());
}

#[derive(Debug, Deserialize)]
struct AddParams {
    left: i64,
    right: i64,
}

#[derive(Debug, Serialize)]
struct AddOutput {
    sum: i64,
}

struct Add;

#[async_trait]
impl TypedOperation for Add {
    type Params = AddParams;
    type Output = AddOutput;

    async fn run(&self, params: AddParams) -> Result<AddOutput, HandlerFailure> {
        params
            .left
            .checked_add(params.right)
            .map(|sum| AddOutput { sum })
            .ok_or_else(|| HandlerFailure::Structured(json!({"code": "overflow"})))
    }
}

#[tokio::test]
async fn typed_operation_decodes_params_and_encodes_output() {
    let outcome = typed(Add)
        .execute(OperationRequest::new("Add", json!({"left": 2, "right": 3})))
        .await;
    assert_eq!(outcome, OperationOutcome::Success(json!({"sum": 5})));
}

#[tokio::test]
async fn typed_operation_reports_invalid_params() {
    let outcome = typed(Add)
        .execute(OperationRequest::new("Add", json!({"left": "two"})))
        .await;
    assert!(matches!(
        outcome,
        OperationOutcome::Failure(HandlerFailure::InvalidParameters(_))
    ));
}

#[tokio::test]
async fn typed_operation_passes_structured_failures_through() {
    let outcome = typed(Add)
        .execute(OperationRequest::new(
            "Add",
            json!({"left": i64::MAX, "right": 1}),
        ))
        .await;
    assert_eq!(
        outcome,
        OperationOutcome::structured_failure(json!({"code": "overflow"}))
    );
}

#[tokio::test]
async fn registry_fallback_only_claims_its_own_operations() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut inner = OperationRegistry::builder();
    inner
        .register(
            "Echo",
            handler_fn(move |request| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { OperationOutcome::Success(request.params) }
            }),
        )
        .expect("register Echo");
    let fallback = inner.build();

    let claimed = fallback
        .try_handle(OperationRequest::new("Echo", json!({"text": "hi"})))
        .await;
    let unclaimed = fallback
        .try_handle(OperationRequest::new("Unknown", json!({})))
        .await;

    assert_eq!(claimed, Some(OperationOutcome::Success(json!({"text": "hi"}))));
    assert_eq!(unclaimed, None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[rstest]
fn installed_fallback_is_exposed(mut builder: OperationRegistryBuilder) {
    builder.fallback(OperationRegistry::default());
    let registry = builder.build();
    assert!(registry.fallback().is_some());
    assert!(format!("{registry:?}").contains("fallback: true"));
}

#[test]
fn unserialisable_output_becomes_failure() {
    let mut map = std::collections::HashMap::new();
    map.insert(vec![1_u8], 1_u8);
    let outcome = OperationOutcome::from_serialize(&map);
    assert!(!outcome.is_success());
}
