//! Assertion helpers for workflow tests

use dashweave::{Error, ErrorKind};
use dashweave_observability::{ExecutionTrace, SpanStatus};

use crate::mock_primitive::MockPrimitive;

/// Assert a mock was invoked exactly `expected` times
///
/// # Panics
///
/// Panics with the mock's name and both counts on mismatch.
pub fn assert_called<I, O>(mock: &MockPrimitive<I, O>, expected: usize) {
    let actual = mock.call_count();
    assert!(
        actual == expected,
        "expected {:?} to be called {expected} times, was called {actual} times",
        mock
    );
}

/// Assert at least one captured input satisfies the predicate
///
/// # Panics
///
/// Panics when no input matches.
pub fn assert_input_matches<I, O, F>(mock: &MockPrimitive<I, O>, predicate: F)
where
    I: Clone,
    F: Fn(&I) -> bool,
{
    assert!(
        mock.was_called_with(predicate),
        "no captured input of {:?} matched the predicate",
        mock
    );
}

/// Assert some trace contains a span for the named primitive
///
/// # Panics
///
/// Panics listing the present span names when the primitive is absent.
pub fn assert_span_recorded(traces: &[ExecutionTrace], primitive_name: &str) {
    let found = traces
        .iter()
        .any(|t| t.spans.iter().any(|s| s.primitive_name == primitive_name));
    assert!(
        found,
        "no span named '{primitive_name}' in traces; present: {:?}",
        traces
            .iter()
            .flat_map(|t| t.spans.iter().map(|s| s.primitive_name.clone()))
            .collect::<Vec<_>>()
    );
}

/// Assert some trace contains a failed span with the given error kind
///
/// # Panics
///
/// Panics when no failed span carries the kind.
pub fn assert_failure_recorded(traces: &[ExecutionTrace], error_kind: &str) {
    let found = traces.iter().any(|t| {
        t.spans.iter().any(|s| {
            s.status == SpanStatus::Failure && s.error_kind.as_deref() == Some(error_kind)
        })
    });
    assert!(found, "no failed span with error kind '{error_kind}'");
}

/// Assert a workflow result is a retry exhaustion carrying `attempts` tries
///
/// # Panics
///
/// Panics when the result is not [`ErrorKind::RetriesExhausted`] or the
/// attempt count differs.
pub fn assert_retries_exhausted<T: std::fmt::Debug>(
    result: &dashweave::Result<T>,
    attempts: u32,
) {
    match result {
        Err(Error::RetriesExhausted {
            attempts: actual, ..
        }) => {
            assert!(
                *actual == attempts,
                "retries exhausted after {actual} attempts, expected {attempts}"
            );
        }
        Err(other) => panic!(
            "expected RetriesExhausted, got {:?} ({})",
            other.kind(),
            other
        ),
        Ok(value) => panic!("expected RetriesExhausted, got Ok({value:?})"),
    }
}

/// Assert an error is of the given kind
///
/// # Panics
///
/// Panics when the result is `Ok` or a different kind.
pub fn assert_error_kind<T: std::fmt::Debug>(result: &dashweave::Result<T>, kind: ErrorKind) {
    match result {
        Err(e) => assert!(
            e.kind() == kind,
            "expected {:?}, got {:?} ({e})",
            kind,
            e.kind()
        ),
        Ok(value) => panic!("expected {kind:?}, got Ok({value:?})"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use dashweave::{Retry, RetryClassifier, RetryPolicy, WorkflowContext, WorkflowPrimitive};
    use std::time::Duration;

    #[tokio::test]
    async fn test_assert_called_passes() {
        let mock: MockPrimitive<i64, i64> = MockPrimitive::returning("m", 1);
        let ctx = WorkflowContext::new();
        mock.execute(1, &ctx).await.unwrap();
        mock.execute(2, &ctx).await.unwrap();
        assert_called(&mock, 2);
    }

    #[tokio::test]
    #[should_panic(expected = "called 3 times")]
    async fn test_assert_called_fails_with_counts() {
        let mock: MockPrimitive<i64, i64> = MockPrimitive::returning("m", 1);
        let ctx = WorkflowContext::new();
        for i in 0..3 {
            mock.execute(i, &ctx).await.unwrap();
        }
        assert_called(&mock, 2);
    }

    #[tokio::test]
    async fn test_assert_retries_exhausted() {
        let mock: MockPrimitive<i64, i64> =
            MockPrimitive::failing("down", "ConnectionError", "refused");
        let retry = Retry::new(
            mock,
            RetryPolicy::new()
                .with_max_retries(2)
                .with_initial_delay(Duration::from_millis(1)),
        )
        .with_classifier(RetryClassifier::kinds(["ConnectionError"]));

        let ctx = WorkflowContext::new();
        let result = retry.execute(1, &ctx).await;
        assert_retries_exhausted(&result, 3);
    }

    #[tokio::test]
    async fn test_assert_error_kind() {
        let mock: MockPrimitive<i64, i64> = MockPrimitive::failing("down", "RuntimeError", "no");
        let ctx = WorkflowContext::new();
        let result = mock.execute(1, &ctx).await;
        assert_error_kind(&result, dashweave::ErrorKind::Target);
    }
}
