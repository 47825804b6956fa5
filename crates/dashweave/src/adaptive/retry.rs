// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Adaptive retry: learns retry parameters for a wrapped target
//!
//! The reference [`AdaptiveHooks`] implementation. Strategy parameters are
//! the retry knobs (`max_retries`, `initial_delay_ms`, `backoff_factor`,
//! `max_delay_ms`); the proposal hook suggests a gentler backoff when the
//! current strategy's rolling failure rate stays high.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::adaptive::strategy::LearningStrategy;
use crate::adaptive::{Adaptive, AdaptiveConfig, AdaptiveHooks};
use crate::context::WorkflowContext;
use crate::error::Result;
use crate::primitive::WorkflowPrimitive;
use crate::recovery::{run_attempts, RetryClassifier, RetryPolicy};

/// Failure rate above which a gentler backoff is proposed
const PROPOSAL_FAILURE_RATE: f64 = 0.25;
/// Backoff increment per proposal
const BACKOFF_STEP: f64 = 0.5;
/// Ceiling on proposed backoff factors
const BACKOFF_CEILING: f64 = 4.0;

/// An adaptive primitive that retries `P` under learned parameters
pub type AdaptiveRetry<P> = Adaptive<AdaptiveRetryHooks<P>>;

/// Hooks running a target primitive through a strategy-parameterized retry
pub struct AdaptiveRetryHooks<P> {
    target: P,
    classifier: RetryClassifier,
}

impl<P: WorkflowPrimitive> AdaptiveRetryHooks<P> {
    /// Wrap a target with the default retry classifier
    #[must_use]
    pub fn new(target: P) -> Self {
        Self {
            target,
            classifier: RetryClassifier::default(),
        }
    }

    /// Set which failures are retried
    #[must_use]
    pub fn with_classifier(mut self, classifier: RetryClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    fn policy_from(strategy: &LearningStrategy) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(strategy.param_u64("max_retries").unwrap_or(3) as u32)
            .with_initial_delay(Duration::from_millis(
                strategy.param_u64("initial_delay_ms").unwrap_or(100),
            ))
            .with_backoff_factor(strategy.param_f64("backoff_factor").unwrap_or(2.0))
            .with_max_delay(Duration::from_millis(
                strategy.param_u64("max_delay_ms").unwrap_or(30_000),
            ))
    }
}

#[async_trait]
impl<P> AdaptiveHooks for AdaptiveRetryHooks<P>
where
    P: WorkflowPrimitive,
    P::Input: Clone + Sync,
{
    type Input = P::Input;
    type Output = P::Output;

    async fn execute_with_strategy(
        &self,
        input: Self::Input,
        context: &WorkflowContext,
        strategy: &LearningStrategy,
    ) -> Result<Self::Output> {
        let policy = Self::policy_from(strategy);
        run_attempts(
            &self.target,
            &format!("adaptive_retry({})", self.target.name()),
            &policy,
            &self.classifier,
            input,
            context,
        )
        .await
    }

    fn consider_new_strategy(
        &self,
        current: &LearningStrategy,
        _baseline: &LearningStrategy,
    ) -> Option<LearningStrategy> {
        if current.metrics.rolling_failure_rate() <= PROPOSAL_FAILURE_RATE {
            return None;
        }
        let factor = current.param_f64("backoff_factor").unwrap_or(2.0);
        if factor >= BACKOFF_CEILING {
            return None;
        }
        let proposed = (factor + BACKOFF_STEP).min(BACKOFF_CEILING);

        let mut parameters = current.parameters.clone();
        parameters.insert("backoff_factor".to_string(), json!(proposed));
        Some(
            LearningStrategy::new(format!("backoff-{proposed:.1}"), parameters).with_description(
                format!("Raise backoff factor from {factor:.1} to {proposed:.1}"),
            ),
        )
    }
}

/// Build an adaptive retry around a target primitive
///
/// `baseline_parameters` are the always-safe retry knobs; learning behavior
/// follows `config`.
pub fn adaptive_retry<P>(
    name: impl Into<String>,
    target: P,
    baseline_parameters: HashMap<String, serde_json::Value>,
    config: AdaptiveConfig,
) -> AdaptiveRetry<P>
where
    P: WorkflowPrimitive,
    P::Input: Clone + Sync,
{
    Adaptive::new(name, AdaptiveRetryHooks::new(target), baseline_parameters, config)
}
