// Integration tests for the write path
// These tests cover optimistic updates, rollback and write dispatch.
// Unit tests for the merge functions are in src/entities.rs

use futures::StreamExt;
use inflight::prelude::*;
use serde_json::{Value, json};
use tokio::time::{Duration, timeout};

// Helper: coordinator over a store seeded with `{message: "orig"}`
fn seeded(transport: MockTransport) -> Coordinator {
    let seed: Entities = [("message".to_string(), json!("orig"))].into();
    Coordinator::with_store(
        Store::with_state(StoreState::with_entities(seed)),
        transport,
        CoordinatorConfig::default(),
    )
}

fn rename(to: &'static str) -> QueryConfig {
    QueryConfig::new("/messages/1")
        .payload(json!({ "message": to }))
        .optimistic_updater("message", move |_| json!(to))
}

async fn settle(pending: PendingQuery) -> QueryOutcome {
    timeout(Duration::from_secs(2), pending)
        .await
        .expect("write should settle within timeout")
}

#[tokio::test]
async fn test_optimistic_value_applies_before_response() {
    let transport = MockTransport::with_delay(Duration::from_millis(50), |_| {
        Ok(TransportResponse::json(200, json!({})))
    });
    let coordinator = seeded(transport);

    let pending = coordinator
        .mutate_async(&rename("temp"))
        .expect("write should dispatch");
    assert_eq!(coordinator.store().entity("message"), Some(json!("temp")));

    settle(pending).await;
}

#[tokio::test]
async fn test_failed_write_restores_initial_value() {
    let transport = MockTransport::always(500, json!({ "error": "boom" }));
    let coordinator = seeded(transport);

    let outcome = settle(
        coordinator
            .mutate_async(&rename("temp"))
            .expect("write should dispatch"),
    )
    .await;

    assert!(outcome.is_failure());
    let expected: Entities = [("message".to_string(), json!("orig"))].into();
    assert_eq!(coordinator.store().entities(), expected);
}

#[tokio::test]
async fn test_failed_write_removes_entity_that_did_not_exist() {
    let transport = MockTransport::always(400, json!({}));
    let coordinator = Coordinator::new(transport);

    let config = QueryConfig::new("/drafts").optimistic_updater("draft", |_| json!({ "id": "tmp" }));
    let pending = coordinator.mutate_async(&config).expect("write should dispatch");
    settle(pending).await;

    assert_eq!(coordinator.store().entity("draft"), None);
    assert!(coordinator.store().entities().is_empty());
}

#[tokio::test]
async fn test_custom_rollback_wins_over_verbatim_revert() {
    let transport = MockTransport::always(500, json!({}));
    let coordinator = seeded(transport);

    let config = rename("temp").rollback("message", |initial, current| {
        let initial = initial.and_then(Value::as_str).unwrap_or_default();
        let current = current.and_then(Value::as_str).unwrap_or_default();
        Some(json!(format!("{initial} (was {current})")))
    });

    settle(coordinator.mutate_async(&config).expect("write should dispatch")).await;
    assert_eq!(
        coordinator.store().entity("message"),
        Some(json!("orig (was temp)"))
    );
}

#[tokio::test]
async fn test_failure_transition_carries_rollback_patch() {
    let transport = MockTransport::always(503, json!({}));
    let coordinator = Coordinator::with_store(
        Store::with_state(StoreState::with_entities(
            [("message".to_string(), json!("orig"))].into(),
        )),
        transport,
        CoordinatorConfig::default().with_backoff(BackoffConfig::new(
            1,
            Duration::from_millis(1),
            Duration::from_millis(1),
        )),
    );
    let mut transitions = coordinator.store().watch();

    settle(
        coordinator
            .mutate_async(&rename("temp"))
            .expect("write should dispatch"),
    )
    .await;

    let (kind, optimistic_entities) =
        match transitions.next().await.expect("start should be emitted") {
            Transition::Start {
                kind,
                optimistic_entities,
                ..
            } => (kind, optimistic_entities),
            other => panic!("expected start, got {other:?}"),
        };
    assert!(kind.is_mutation());
    assert_eq!(
        optimistic_entities,
        Some([("message".to_string(), json!("temp"))].into())
    );

    let (status, rolled_back) =
        match transitions.next().await.expect("failure should be emitted") {
            Transition::Failure {
                status,
                rolled_back,
                ..
            } => (status, rolled_back),
            other => panic!("expected failure, got {other:?}"),
        };
    assert_eq!(status, 503);
    assert_eq!(
        rolled_back,
        Some([("message".to_string(), Some(json!("orig")))].into())
    );
}

#[tokio::test]
async fn test_successful_write_keeps_optimistic_value_and_applies_updaters() {
    let transport = MockTransport::always(200, json!({ "message": "saved", "version": 2 }));
    let coordinator = seeded(transport.clone());

    let config = rename("temp")
        .updater("message", |_, next| next.cloned().unwrap_or_default())
        .updater("version", |_, next| next.cloned().unwrap_or_default());
    let outcome = settle(coordinator.mutate_async(&config).expect("write should dispatch")).await;

    assert!(outcome.is_success());
    assert_eq!(coordinator.store().entity("message"), Some(json!("saved")));
    assert_eq!(coordinator.store().entity("version"), Some(json!(2)));
    assert_eq!(transport.requests()[0].method, Method::Post);
}

#[tokio::test]
async fn test_writes_always_issue() {
    let transport = MockTransport::always(200, json!({}));
    let coordinator = Coordinator::new(transport.clone());
    let config = QueryConfig::new("/like").payload(json!({ "post": 7 }));

    settle(coordinator.mutate_async(&config).expect("write should dispatch")).await;
    settle(coordinator.mutate_async(&config).expect("write should dispatch")).await;

    assert_eq!(transport.call_count(), 2);
    let query = coordinator
        .store()
        .query(&config.query_key())
        .expect("query state should exist");
    assert!(query.is_mutation);
    assert_eq!(query.query_count, 2);
}

#[tokio::test]
async fn test_write_method_can_be_overridden() {
    let transport = MockTransport::always(204, json!(null));
    let coordinator = Coordinator::new(transport.clone());

    let config = QueryConfig::new("/messages/1").method(Method::Delete);
    settle(coordinator.mutate_async(&config).expect("write should dispatch")).await;

    assert_eq!(transport.requests()[0].method, Method::Delete);
}

#[tokio::test]
async fn test_write_without_target_fails_fast() {
    let transport = MockTransport::always(200, json!({}));
    let coordinator = Coordinator::new(transport.clone());

    let result = coordinator.mutate_async(&QueryConfig::default().optimistic_updater("x", |_| json!(1)));
    assert!(matches!(result, Err(Error::MissingTarget)));
    assert_eq!(coordinator.store().entity("x"), None);
    assert_eq!(transport.call_count(), 0);
}
