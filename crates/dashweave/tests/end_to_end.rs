//! End-to-end workflow scenarios: composition, instrumentation, and recovery
//! working together through the public API.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use dashweave::{
    flow, instrument, CircuitBreaker, CircuitBreakerConfig, CircuitState, Fallback, Identity,
    Lambda, Parallel, Retry, RetryClassifier, RetryPolicy, Sequential, Timeout, WorkflowContext,
    WorkflowPrimitive,
};
use dashweave_testing::{
    assert_called, assert_retries_exhausted, test_observability, MockPrimitive, MockStep,
};
use serde_json::json;

// =============================================================================
// Sequential pipeline with instrumentation
// =============================================================================

#[tokio::test]
async fn test_sequential_two_step_pipeline_with_spans() {
    let obs = test_observability().await;

    let inc = instrument(Lambda::new("inc", |x: i64| async move { Ok(x + 1) }));
    let double = instrument(Lambda::new("double", |x: i64| async move { Ok(x * 2) }));
    let pipeline = instrument(flow(inc) >> double);

    let ctx = WorkflowContext::with_correlation_id("pipeline-corr").unwrap();
    assert_eq!(pipeline.execute(5, &ctx).await.unwrap(), 12);

    let trace = obs.trace_for("pipeline-corr").await.unwrap();
    assert_eq!(trace.spans.len(), 3);

    // Exactly two child spans under one root
    let root = trace.root().unwrap();
    assert_eq!(root.primitive_name, "inc >> double");
    let children = trace.children_of(&root.span_id);
    assert_eq!(children.len(), 2);
    let child_names: Vec<&str> = children.iter().map(|s| s.primitive_name.as_str()).collect();
    assert!(child_names.contains(&"inc"));
    assert!(child_names.contains(&"double"));

    // Correlation propagation: every span carries the execution's id
    for span in &trace.spans {
        assert_eq!(span.correlation_id, "pipeline-corr");
    }
}

#[tokio::test]
async fn test_empty_sequence_is_identity() {
    let empty: Sequential<String> = Sequential::new("empty");
    let identity: Identity<String> = Identity::new();
    let ctx = WorkflowContext::new();

    for input in ["", "x", "a longer input value"] {
        let via_empty = empty.execute(input.to_string(), &ctx).await.unwrap();
        let via_identity = identity.execute(input.to_string(), &ctx).await.unwrap();
        assert_eq!(via_empty, via_identity);
    }
}

// =============================================================================
// Parallel fan-out
// =============================================================================

#[tokio::test]
async fn test_parallel_fan_out_wait_all() {
    tokio::time::pause();

    let fan = Parallel::builder("letters")
        .branch(MockPrimitive::returning("a", "A".to_string()).with_delay(Duration::from_millis(30)))
        .branch(MockPrimitive::returning("b", "B".to_string()).with_delay(Duration::from_millis(10)))
        .branch(MockPrimitive::returning("c", "C".to_string()).with_delay(Duration::from_millis(20)));

    let ctx = WorkflowContext::new();
    let started = tokio::time::Instant::now();
    let out = fan.execute((), &ctx).await.unwrap();

    // Declaration order, not completion order
    assert_eq!(out, vec!["A", "B", "C"]);
    // Branches ran concurrently: total time tracks the slowest branch, not
    // the sum
    assert!(started.elapsed() <= Duration::from_millis(40));
}

// =============================================================================
// Retry with recovery
// =============================================================================

#[tokio::test]
async fn test_retry_recovers_after_transient_failures() {
    let obs = test_observability().await;

    let flaky: MockPrimitive<(), String> = MockPrimitive::with_sequence(
        "flaky",
        vec![
            MockStep::err("ConnectionError", "connection refused"),
            MockStep::err("ConnectionError", "connection refused"),
            MockStep::ok("ok".to_string()),
        ],
    );
    let retry = instrument(
        Retry::new(
            flaky.clone(),
            RetryPolicy::new()
                .with_max_retries(3)
                .with_initial_delay(Duration::from_millis(10)),
        )
        .with_classifier(RetryClassifier::kinds(["ConnectionError"])),
    );

    let ctx = WorkflowContext::with_correlation_id("retry-corr").unwrap();
    assert_eq!(retry.execute((), &ctx).await.unwrap(), "ok");
    assert_called(&flaky, 3);

    // One attempt event per invocation of the target
    let trace = obs.trace_for("retry-corr").await.unwrap();
    let attempts: Vec<_> = trace
        .events()
        .into_iter()
        .filter(|e| e.name == "retry.attempt")
        .collect();
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts[0].attribute("outcome"), Some("failure"));
    assert_eq!(attempts[2].attribute("outcome"), Some("success"));
}

#[tokio::test]
async fn test_retry_transparent_when_target_healthy() {
    let healthy: MockPrimitive<i64, i64> = MockPrimitive::from_handler("healthy", |x| Ok(x * 3));
    let wrapped = Retry::new(healthy.clone(), RetryPolicy::new());

    let ctx = WorkflowContext::new();
    assert_eq!(wrapped.execute(7, &ctx).await.unwrap(), 21);
    assert_called(&healthy, 1);
}

#[tokio::test]
async fn test_retry_exhaustion_is_bounded() {
    let down: MockPrimitive<(), ()> =
        MockPrimitive::failing("down", "ConnectionError", "connection refused");
    let retry = Retry::new(
        down.clone(),
        RetryPolicy::new()
            .with_max_retries(3)
            .with_initial_delay(Duration::from_millis(1)),
    )
    .with_classifier(RetryClassifier::kinds(["ConnectionError"]));

    let ctx = WorkflowContext::new();
    let result = retry.execute((), &ctx).await;
    assert_retries_exhausted(&result, 4);
    // max_retries + 1 target invocations, never more
    assert_called(&down, 4);
}

// =============================================================================
// Fallback chain
// =============================================================================

#[tokio::test]
async fn test_fallback_chain_records_winner() {
    let obs = test_observability().await;

    let primary: MockPrimitive<(), serde_json::Value> =
        MockPrimitive::failing("primary", "RuntimeError", "primary down");
    let fallback1: MockPrimitive<(), serde_json::Value> =
        MockPrimitive::failing("fallback1", "RuntimeError", "fallback1 down");
    let fallback2: MockPrimitive<(), serde_json::Value> =
        MockPrimitive::returning("fallback2", json!({"source": "fallback2"}));

    let chain = instrument(
        Fallback::new(primary.clone())
            .fallback(fallback1.clone())
            .fallback(fallback2.clone()),
    );

    let ctx = WorkflowContext::with_correlation_id("fallback-corr").unwrap();
    let out = chain.execute((), &ctx).await.unwrap();
    assert_eq!(out, json!({"source": "fallback2"}));
    assert_called(&primary, 1);
    assert_called(&fallback1, 1);
    assert_called(&fallback2, 1);

    let trace = obs.trace_for("fallback-corr").await.unwrap();
    let winner = trace
        .events()
        .into_iter()
        .find(|e| e.name == "fallback.succeeded")
        .unwrap();
    assert_eq!(winner.attribute("succeeded_branch"), Some("fallback2"));
}

#[tokio::test]
async fn test_fallback_transparent_when_primary_healthy() {
    let primary: MockPrimitive<(), i64> = MockPrimitive::returning("primary", 11);
    let backup: MockPrimitive<(), i64> = MockPrimitive::returning("backup", 99);
    let chain = Fallback::new(primary.clone()).fallback(backup.clone());

    let ctx = WorkflowContext::new();
    assert_eq!(chain.execute((), &ctx).await.unwrap(), 11);
    assert_called(&backup, 0);
}

// =============================================================================
// Circuit breaker transitions
// =============================================================================

#[tokio::test]
async fn test_circuit_breaker_full_lifecycle() {
    let target: MockPrimitive<(), &'static str> = MockPrimitive::with_sequence(
        "upstream",
        vec![
            MockStep::err("RuntimeError", "down"),
            MockStep::err("RuntimeError", "down"),
            MockStep::err("RuntimeError", "down"),
            MockStep::ok("recovered"),
            MockStep::ok("recovered"),
            MockStep::ok("recovered"),
        ],
    );
    let breaker = CircuitBreaker::new(
        target.clone(),
        CircuitBreakerConfig::new()
            .with_failure_threshold(3)
            .with_window_size(10)
            .with_open_duration(Duration::from_millis(50))
            .with_half_open_probe_count(2),
    );

    let ctx = WorkflowContext::new();

    // Three failures open the breaker
    for _ in 0..3 {
        assert!(breaker.execute((), &ctx).await.is_err());
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    // While open: fail fast, the target is never invoked
    let err = breaker.execute((), &ctx).await.unwrap_err();
    assert_eq!(err.kind(), dashweave::ErrorKind::CircuitOpen);
    assert_called(&target, 3);

    // After the open window, two successful probes close it again
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert_eq!(breaker.execute((), &ctx).await.unwrap(), "recovered");
    assert_eq!(breaker.execute((), &ctx).await.unwrap(), "recovered");
    assert_eq!(breaker.state(), CircuitState::Closed);

    // Closed: calls reach the target again
    assert_eq!(breaker.execute((), &ctx).await.unwrap(), "recovered");
    assert_called(&target, 6);
}

// =============================================================================
// Timeout boundedness
// =============================================================================

#[tokio::test]
async fn test_timeout_bounds_wall_clock() {
    tokio::time::pause();

    let hang: MockPrimitive<(), ()> =
        MockPrimitive::returning("hang", ()).with_delay(Duration::from_secs(3600));
    let bounded = Timeout::new(hang, Duration::from_secs(2));

    let ctx = WorkflowContext::new();
    let started = tokio::time::Instant::now();
    let err = bounded.execute((), &ctx).await.unwrap_err();
    assert_eq!(err.kind(), dashweave::ErrorKind::Timeout);
    assert!(started.elapsed() <= Duration::from_secs(2) + Duration::from_millis(100));
}

// =============================================================================
// Cancellation visibility
// =============================================================================

#[tokio::test]
async fn test_timeout_cancellation_recorded_on_trace() {
    let obs = test_observability().await;

    let hang = instrument(
        MockPrimitive::returning("hang", ()).with_delay(Duration::from_secs(3600)),
    );
    let bounded = instrument(Timeout::new(hang, Duration::from_millis(20)));

    let ctx = WorkflowContext::with_correlation_id("cancel-corr").unwrap();
    assert!(bounded.execute((), &ctx).await.is_err());

    let trace = obs.trace_for("cancel-corr").await.unwrap();
    let inner = trace.spans_named("hang");
    assert_eq!(inner.len(), 1);
    assert_eq!(inner[0].status, dashweave_observability::SpanStatus::Cancelled);
    // The timeout wrapper itself failed with the timeout kind
    let outer = trace.spans_named("timeout(hang)");
    assert_eq!(outer[0].error_kind.as_deref(), Some("TimeoutError"));
}

// =============================================================================
// Mixed composition
// =============================================================================

#[tokio::test]
async fn test_recovery_inside_composition_tree() {
    let flaky: MockPrimitive<i64, i64> = MockPrimitive::with_sequence(
        "flaky",
        vec![MockStep::err("ConnectionError", "blip"), MockStep::ok(10)],
    );
    let retried = Retry::new(
        flaky,
        RetryPolicy::new()
            .with_max_retries(2)
            .with_initial_delay(Duration::from_millis(1)),
    )
    .with_classifier(RetryClassifier::kinds(["ConnectionError"]));

    let pipeline = flow(retried) >> Lambda::new("double", |x: i64| async move { Ok(x * 2) });
    let ctx = WorkflowContext::new();
    assert_eq!(pipeline.execute(0, &ctx).await.unwrap(), 20);
}
