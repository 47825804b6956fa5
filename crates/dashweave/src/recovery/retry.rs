// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Retry with exponential backoff and jitter

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashweave_observability::TraceCollector;

use crate::context::WorkflowContext;
use crate::error::{Error, ErrorKind, Result};
use crate::instrument::PARENT_SPAN_KEY;
use crate::primitive::WorkflowPrimitive;

/// Backoff schedule for a retry wrapper
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total invocations = `max_retries` + 1)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied per retry
    pub backoff_factor: f64,
    /// Ceiling on any single delay
    pub max_delay: Duration,
    /// Random fraction added to each delay (0.1 = up to +10%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Create the default policy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry count
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the per-retry multiplier
    #[must_use]
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor.max(1.0);
        self
    }

    /// Set the delay ceiling
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the jitter fraction
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// The delay to sleep after the given (zero-based) failed attempt
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        let jittered = capped * (1.0 + self.jitter * rand::random::<f64>());
        Duration::from_secs_f64(jittered.min(self.max_delay.as_secs_f64() * (1.0 + self.jitter)))
    }
}

type RetryPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Decides whether a failure is worth retrying
#[derive(Clone)]
pub enum RetryClassifier {
    /// Retry when the error's kind label is in the set
    ///
    /// Matches both taxonomy labels (`TimeoutError`) and the user kinds
    /// carried by target errors (`ConnectionError`).
    Kinds(HashSet<String>),
    /// Retry when the predicate returns true
    Predicate(RetryPredicate),
}

impl RetryClassifier {
    /// Retry on the given kind labels
    pub fn kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Kinds(kinds.into_iter().map(Into::into).collect())
    }

    /// Retry when the predicate returns true
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Whether this failure should be retried
    #[must_use]
    pub fn is_retryable(&self, error: &Error) -> bool {
        match self {
            Self::Kinds(kinds) => {
                kinds.contains(error.kind_label()) || kinds.contains(error.kind().as_str())
            }
            Self::Predicate(f) => f(error),
        }
    }
}

impl Default for RetryClassifier {
    /// Retry target failures and timeouts; everything else is terminal
    fn default() -> Self {
        Self::predicate(|e| matches!(e.kind(), ErrorKind::Target | ErrorKind::Timeout))
    }
}

impl std::fmt::Debug for RetryClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kinds(kinds) => f.debug_tuple("Kinds").field(kinds).finish(),
            Self::Predicate(_) => f.debug_tuple("Predicate").finish(),
        }
    }
}

fn emit_attempt_event(context: &WorkflowContext, attempt: u32, outcome: &str, kind: Option<&str>) {
    tracing::debug!(
        correlation_id = %context.correlation_id(),
        attempt,
        outcome,
        error_kind = kind.unwrap_or(""),
        "retry attempt"
    );
    if let Some(span_id) = context.metadata_str(PARENT_SPAN_KEY) {
        let mut attributes = vec![
            ("attempt".to_string(), (attempt + 1).to_string()),
            ("outcome".to_string(), outcome.to_string()),
        ];
        if let Some(kind) = kind {
            attributes.push(("error_kind".to_string(), kind.to_string()));
        }
        TraceCollector::global().add_span_event(
            context.correlation_id(),
            span_id,
            "retry.attempt",
            attributes,
        );
    }
}

/// The shared attempt loop behind [`Retry`] and the adaptive retry hook
pub(crate) async fn run_attempts<P>(
    inner: &P,
    wrapper_name: &str,
    policy: &RetryPolicy,
    classifier: &RetryClassifier,
    input: P::Input,
    context: &WorkflowContext,
) -> Result<P::Output>
where
    P: WorkflowPrimitive,
    P::Input: Clone,
{
    let mut attempt: u32 = 0;
    loop {
        match inner.execute(input.clone(), context).await {
            Ok(output) => {
                emit_attempt_event(context, attempt, "success", None);
                return Ok(output);
            }
            Err(e) => {
                let retryable = classifier.is_retryable(&e);
                emit_attempt_event(context, attempt, "failure", Some(e.kind_label()));
                if !retryable {
                    return Err(e);
                }
                if attempt >= policy.max_retries {
                    return Err(Error::RetriesExhausted {
                        primitive: wrapper_name.to_string(),
                        attempts: attempt + 1,
                        source: Box::new(e),
                    });
                }
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}

/// Retries a target primitive on retryable failures with backoff
///
/// Each attempt is recorded as a span event. Cancellation (the future being
/// dropped) aborts without further retries; non-retryable errors surface
/// immediately; exhaustion surfaces [`Error::RetriesExhausted`] carrying the
/// last failure.
pub struct Retry<P> {
    inner: P,
    policy: RetryPolicy,
    classifier: RetryClassifier,
}

impl<P: WorkflowPrimitive> Retry<P> {
    /// Wrap a primitive with the given backoff policy
    #[must_use]
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            classifier: RetryClassifier::default(),
        }
    }

    /// Set which failures are retried
    #[must_use]
    pub fn with_classifier(mut self, classifier: RetryClassifier) -> Self {
        self.classifier = classifier;
        self
    }
}

#[async_trait]
impl<P> WorkflowPrimitive for Retry<P>
where
    P: WorkflowPrimitive,
    P::Input: Clone + Sync,
{
    type Input = P::Input;
    type Output = P::Output;

    async fn execute(
        &self,
        input: Self::Input,
        context: &WorkflowContext,
    ) -> Result<Self::Output> {
        run_attempts(
            &self.inner,
            &self.name(),
            &self.policy,
            &self.classifier,
            input,
            context,
        )
        .await
    }

    fn name(&self) -> String {
        format!("retry({})", self.inner.name())
    }
}
