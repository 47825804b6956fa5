//! Property tests for the context, retry policy, sampling, and cardinality
//! invariants.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::time::Duration;

use dashweave::{RetryPolicy, WorkflowContext};
use dashweave_observability::{CardinalityLimiter, CompositeSampler, ObservabilityConfig};
use proptest::prelude::*;

fn metadata_strategy() -> impl Strategy<Value = HashMap<String, serde_json::Value>> {
    proptest::collection::hash_map(
        "[a-z]{1,8}",
        "[a-zA-Z0-9 ]{0,12}".prop_map(serde_json::Value::from),
        0..6,
    )
}

proptest! {
    // Extending a context with an empty map is observationally identity
    #[test]
    fn prop_extend_empty_is_identity(metadata in metadata_strategy()) {
        let mut ctx = WorkflowContext::with_correlation_id("prop-corr").unwrap();
        for (k, v) in &metadata {
            ctx = ctx.with_metadata(k.clone(), v.clone());
        }
        let extended = ctx.extend(HashMap::new());
        prop_assert_eq!(&extended, &ctx);
    }

    // Extension never changes identity and always unions metadata
    #[test]
    fn prop_extend_preserves_identity_and_unions(
        base in metadata_strategy(),
        additions in metadata_strategy(),
    ) {
        let mut ctx = WorkflowContext::with_correlation_id("prop-corr").unwrap();
        for (k, v) in &base {
            ctx = ctx.with_metadata(k.clone(), v.clone());
        }
        let extended = ctx.extend(additions.clone());

        prop_assert_eq!(extended.correlation_id(), ctx.correlation_id());
        for (k, v) in &additions {
            prop_assert_eq!(extended.metadata_value(k), Some(v));
        }
        for (k, v) in ctx.metadata() {
            if !additions.contains_key(k) {
                prop_assert_eq!(extended.metadata_value(k), Some(v));
            }
        }
    }

    // Every delay the policy produces respects the configured ceiling
    #[test]
    fn prop_retry_delay_bounded(
        initial_ms in 1u64..1_000,
        factor in 1.0f64..5.0,
        max_ms in 1u64..60_000,
        jitter in 0.0f64..1.0,
        attempt in 0u32..20,
    ) {
        let policy = RetryPolicy::new()
            .with_initial_delay(Duration::from_millis(initial_ms))
            .with_backoff_factor(factor)
            .with_max_delay(Duration::from_millis(max_ms))
            .with_jitter(jitter);
        let delay = policy.delay_for(attempt);
        let ceiling = Duration::from_millis(max_ms).as_secs_f64() * (1.0 + jitter) + 1e-6;
        prop_assert!(delay.as_secs_f64() <= ceiling);
    }

    // The head decision for a correlation id is drawn once and reproducible
    #[test]
    fn prop_head_decision_deterministic(correlation_id in "[a-zA-Z0-9-]{1,32}", rate in 0.0f64..=1.0) {
        let config = ObservabilityConfig::new().with_sampling_rate(rate);
        let sampler = CompositeSampler::new(&config);
        let first = sampler.head_decision(&correlation_id, &config);
        for _ in 0..5 {
            let again = sampler.head_decision(&correlation_id, &config);
            prop_assert_eq!(&again.decision, &first.decision);
        }
    }

    // The tracked distinct values of a label dimension never exceed the limit
    #[test]
    fn prop_cardinality_bounded(
        values in proptest::collection::vec("[a-z0-9]{1,10}", 1..200),
        limit in 1usize..20,
        hash_overflow in proptest::bool::ANY,
    ) {
        let limiter = CardinalityLimiter::new();
        for value in &values {
            limiter.resolve("calls_total", "primitive", value, limit, hash_overflow);
        }
        prop_assert!(limiter.distinct_values("calls_total", "primitive") <= limit);
    }
}
