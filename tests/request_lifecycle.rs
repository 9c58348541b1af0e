// Integration tests for the read path
// These tests drive a Coordinator end to end through MockTransport.
// Unit tests for dedup decisions are in src/coordinator.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use inflight::prelude::*;
use inflight::state::selectors;
use serde_json::{Value, json};
use tokio::time::{Duration, timeout};

// Helper: small backoff so retry tests stay fast
fn fast_config(max_attempts: u32) -> CoordinatorConfig {
    CoordinatorConfig::default().with_backoff(BackoffConfig::new(
        max_attempts,
        Duration::from_millis(1),
        Duration::from_millis(5),
    ))
}

// Helper: answers with `{"message": payload.value}` after a short delay
fn echo_transport() -> MockTransport {
    MockTransport::with_delay(Duration::from_millis(10), |request| {
        let value = request
            .payload
            .as_ref()
            .and_then(|payload| payload.get("value"))
            .cloned()
            .unwrap_or(Value::Null);
        Ok(TransportResponse::json(200, json!({ "message": value })))
    })
}

fn echo_config() -> QueryConfig {
    QueryConfig::new("/echo")
        .payload(json!({ "value": "Ryan" }))
        .updater("message", |_, next| next.cloned().unwrap_or_default())
}

async fn settle(dispatched: Dispatched) -> QueryOutcome {
    timeout(Duration::from_secs(2), dispatched.settled())
        .await
        .expect("call should settle within timeout")
        .expect("call should have been issued")
}

#[tokio::test]
async fn test_echo_end_to_end() {
    let coordinator = Coordinator::new(echo_transport());
    let config = echo_config();

    let outcome = settle(coordinator.request_async(&config).expect("should dispatch")).await;
    assert!(outcome.is_success());

    let state = coordinator.store().snapshot();
    assert_eq!(state.entity("message"), Some(&json!("Ryan")));

    let view = query_selector(&state, &config);
    assert!(!view.is_pending);
    assert!(view.is_finished);
    assert_eq!(view.status, Some(200));
    assert_eq!(view.query_count, 1);
    assert!(view.last_updated.is_some());
}

#[tokio::test]
async fn test_response_carries_entities_and_transform() {
    let coordinator = Coordinator::new(echo_transport());

    let outcome = settle(coordinator.request_async(&echo_config()).expect("should dispatch")).await;
    let response = outcome.into_response().expect("call should finish");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, Some(json!({ "message": "Ryan" })));
    assert_eq!(response.transformed["message"], json!("Ryan"));
    assert_eq!(response.entities["message"], json!("Ryan"));
    assert!(response.duration >= Duration::from_millis(10));
}

#[tokio::test]
async fn test_duplicate_read_issues_one_call() {
    let transport = echo_transport();
    let coordinator = Coordinator::new(transport.clone());
    let config = echo_config();

    let first = coordinator.request_async(&config).expect("should dispatch");
    let second = coordinator.request_async(&config).expect("should dispatch");
    assert!(first.is_issued());
    assert!(second.is_skipped());

    settle(first).await;
    assert!(coordinator.request_async(&config).expect("should dispatch").is_skipped());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_payload_field_order_does_not_split_keys() {
    let transport = MockTransport::always(200, json!({}));
    let coordinator = Coordinator::new(transport.clone());

    let a = QueryConfig::new("/search").payload(json!({ "q": "rust", "page": 1 }));
    let b = QueryConfig::new("/search").payload(json!({ "page": 1, "q": "rust" }));

    let first = coordinator.request_async(&a).expect("should dispatch");
    assert!(coordinator.request_async(&b).expect("should dispatch").is_skipped());
    settle(first).await;
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_force_bypasses_dedup() {
    let transport = echo_transport();
    let coordinator = Coordinator::new(transport.clone());
    let config = echo_config();

    settle(coordinator.request_async(&config).expect("should dispatch")).await;

    let forced = coordinator
        .request_async(&config.clone().force(true))
        .expect("should dispatch");
    assert!(forced.is_issued());
    settle(forced).await;

    assert_eq!(transport.call_count(), 2);
    assert_eq!(
        selectors::query_count(&coordinator.store().snapshot(), &config),
        2
    );
}

#[tokio::test]
async fn test_retry_reissues_after_server_error() {
    let transport = MockTransport::sequence(vec![
        Ok(TransportResponse::json(500, json!({ "error": "boom" }))),
        Ok(TransportResponse::json(200, json!({ "message": "ok" }))),
    ]);
    let coordinator = Coordinator::new(transport.clone());
    let config = QueryConfig::new("/flaky");

    let outcome = settle(coordinator.request_async(&config).expect("should dispatch")).await;
    assert_eq!(outcome.status(), Some(500));
    // 500 is not retryable by default, so only one call was made
    assert_eq!(transport.call_count(), 1);

    // Without retry the failed key is still deduped
    assert!(coordinator.request_async(&config).expect("should dispatch").is_skipped());

    let retried = coordinator
        .request_async(&config.clone().retry(true))
        .expect("should dispatch");
    assert!(retried.is_issued());
    assert!(settle(retried).await.is_success());
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_retry_does_not_reissue_while_pending() {
    let transport = MockTransport::with_delay(Duration::from_millis(50), |_| {
        Ok(TransportResponse::json(500, json!({})))
    });
    let coordinator = Coordinator::new(transport.clone());
    let config = QueryConfig::new("/slow").retry(true);

    let first = coordinator.request_async(&config).expect("should dispatch");
    assert!(coordinator.request_async(&config).expect("should dispatch").is_skipped());

    settle(first).await;
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_retry_does_not_reissue_after_success() {
    let transport = MockTransport::always(200, json!({}));
    let coordinator = Coordinator::new(transport.clone());
    let config = QueryConfig::new("/ok").retry(true);

    settle(coordinator.request_async(&config).expect("should dispatch")).await;
    assert!(coordinator.request_async(&config).expect("should dispatch").is_skipped());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_retryable_status_exhausts_budget() {
    let transport = MockTransport::always(503, json!({ "error": "unavailable" }));
    let coordinator = Coordinator::with_config(transport.clone(), fast_config(3));
    let config = QueryConfig::new("/down");

    let outcome = settle(coordinator.request_async(&config).expect("should dispatch")).await;

    assert!(outcome.is_failure());
    assert_eq!(outcome.status(), Some(503));
    assert_eq!(transport.call_count(), 3);

    let state = coordinator.store().snapshot();
    let view = query_selector(&state, &config);
    assert_eq!(view.status, Some(503));
    // Retries are not separate starts
    assert_eq!(view.query_count, 1);
    assert_eq!(
        error_selector(&state, &config).response_body,
        Some(json!({ "error": "unavailable" }))
    );
}

#[tokio::test]
async fn test_transient_failure_recovers_within_budget() {
    let transport = MockTransport::sequence(vec![
        Err(TransportError::Network("connection reset".to_string())),
        Ok(TransportResponse::json(429, json!({}))),
        Ok(TransportResponse::json(200, json!({ "n": 3 }))),
    ]);
    let coordinator = Coordinator::with_config(transport.clone(), fast_config(5));

    let outcome = settle(
        coordinator
            .request_async(&QueryConfig::new("/recover"))
            .expect("should dispatch"),
    )
    .await;

    assert!(outcome.is_success());
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn test_network_error_without_budget_reports_status_zero() {
    let transport = MockTransport::new(|_| Err(TransportError::Network("refused".to_string())));
    let coordinator = Coordinator::with_config(transport.clone(), fast_config(1));
    let config = QueryConfig::new("/offline");

    let outcome = settle(coordinator.request_async(&config).expect("should dispatch")).await;
    assert_eq!(outcome.status(), Some(0));
    assert_eq!(transport.call_count(), 1);

    let error = error_selector(&coordinator.store().snapshot(), &config);
    assert_eq!(error.response_text.as_deref(), Some("Network error: refused"));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let transport = MockTransport::always(404, json!({ "error": "missing" }));
    let coordinator = Coordinator::with_config(transport.clone(), fast_config(5));

    let outcome = settle(
        coordinator
            .request_async(&QueryConfig::new("/missing"))
            .expect("should dispatch"),
    )
    .await;

    assert_eq!(outcome.status(), Some(404));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_custom_retryable_statuses() {
    let transport = MockTransport::always(500, json!({}));
    let config = fast_config(2).with_retryable_status_codes([500]);
    let coordinator = Coordinator::with_config(transport.clone(), config);

    settle(
        coordinator
            .request_async(&QueryConfig::new("/custom"))
            .expect("should dispatch"),
    )
    .await;
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_missing_target_fails_fast() {
    let transport = MockTransport::always(200, json!({}));
    let coordinator = Coordinator::new(transport.clone());

    let result = coordinator.request_async(&QueryConfig::default());
    assert!(matches!(result, Err(Error::MissingTarget)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_pre_dispatch_runs_before_terminal_transition() {
    let transport = MockTransport::always(200, json!({ "message": "hi" }));
    let coordinator = Coordinator::new(transport);
    let store = coordinator.store().clone();
    let seen_pending = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&seen_pending);
    let config = QueryConfig::new("/hook").pre_dispatch(move || {
        let key = QueryConfig::new("/hook").query_key();
        if store.query(&key).is_some_and(|query| query.is_pending) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    settle(coordinator.request_async(&config).expect("should dispatch")).await;
    assert_eq!(seen_pending.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transform_shapes_entities() {
    let transport = MockTransport::always(200, json!({ "data": { "items": [1, 2, 3] } }));
    let coordinator = Coordinator::new(transport);

    let config = QueryConfig::new("/items")
        .transform(|body, _| {
            let items = body
                .and_then(|body| body.pointer("/data/items"))
                .cloned()
                .unwrap_or_default();
            [("items".to_string(), items)].into()
        })
        .updater("items", |_, next| next.cloned().unwrap_or_default());

    settle(coordinator.request_async(&config).expect("should dispatch")).await;
    assert_eq!(coordinator.store().entity("items"), Some(json!([1, 2, 3])));
}

#[tokio::test]
async fn test_updater_sees_previous_entity() {
    let transport = MockTransport::always(200, json!({ "count": 2 }));
    let coordinator = Coordinator::with_store(
        Store::with_state(StoreState::with_entities(
            [("count".to_string(), json!(40))].into(),
        )),
        transport,
        CoordinatorConfig::default(),
    );

    let config = QueryConfig::new("/add").updater("count", |prev, next| {
        let prev = prev.and_then(Value::as_i64).unwrap_or(0);
        let next = next.and_then(Value::as_i64).unwrap_or(0);
        json!(prev + next)
    });

    settle(coordinator.request_async(&config).expect("should dispatch")).await;
    assert_eq!(coordinator.store().entity("count"), Some(json!(42)));
}

#[tokio::test]
async fn test_request_all_dispatches_each_config() {
    let transport = MockTransport::always(200, json!({}));
    let coordinator = Coordinator::new(transport.clone());

    let configs = [
        QueryConfig::new("/a"),
        QueryConfig::new("/b"),
        QueryConfig::new("/a"),
    ];
    let dispatched = coordinator.request_all(&configs).expect("should dispatch");

    assert!(dispatched[0].is_issued());
    assert!(dispatched[1].is_issued());
    assert!(dispatched[2].is_skipped());

    for dispatched in dispatched {
        dispatched.settled().await;
    }
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_request_carries_options() {
    let transport = MockTransport::always(200, json!({}));
    let coordinator = Coordinator::new(transport.clone());

    let config = QueryConfig::new("/secure")
        .header("authorization", "Bearer token")
        .credentials(Credentials::Include);
    settle(coordinator.request_async(&config).expect("should dispatch")).await;

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Get);
    assert_eq!(
        requests[0].headers.get("authorization").map(String::as_str),
        Some("Bearer token")
    );
    assert_eq!(requests[0].credentials, Credentials::Include);
}
