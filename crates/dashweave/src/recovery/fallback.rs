// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Ordered fallback chain

use std::sync::Arc;

use async_trait::async_trait;
use dashweave_observability::TraceCollector;

use crate::context::WorkflowContext;
use crate::error::{Error, Result};
use crate::instrument::PARENT_SPAN_KEY;
use crate::primitive::WorkflowPrimitive;

type Branch<I, O> = Arc<dyn WorkflowPrimitive<Input = I, Output = O>>;

/// Executes a primary primitive, then each fallback in turn until one succeeds
///
/// The branch that succeeded is recorded on the trace. If every branch fails,
/// [`Error::AllFallbacksFailed`] aggregates the per-branch errors in
/// execution order.
pub struct Fallback<P: WorkflowPrimitive> {
    primary: P,
    fallbacks: Vec<Branch<P::Input, P::Output>>,
}

impl<P: WorkflowPrimitive> Fallback<P> {
    /// Wrap a primary primitive with no fallbacks yet
    #[must_use]
    pub fn new(primary: P) -> Self {
        Self {
            primary,
            fallbacks: Vec::new(),
        }
    }

    /// Append a fallback branch
    #[must_use]
    pub fn fallback<F>(mut self, fallback: F) -> Self
    where
        F: WorkflowPrimitive<Input = P::Input, Output = P::Output> + 'static,
    {
        self.fallbacks.push(Arc::new(fallback));
        self
    }

    fn record_winner(&self, context: &WorkflowContext, branch: &str) {
        tracing::debug!(
            correlation_id = %context.correlation_id(),
            succeeded_branch = branch,
            "fallback succeeded"
        );
        if let Some(span_id) = context.metadata_str(PARENT_SPAN_KEY) {
            TraceCollector::global().add_span_event(
                context.correlation_id(),
                span_id,
                "fallback.succeeded",
                vec![("succeeded_branch".to_string(), branch.to_string())],
            );
        }
    }
}

#[async_trait]
impl<P> WorkflowPrimitive for Fallback<P>
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
        let mut errors = Vec::with_capacity(1 + self.fallbacks.len());

        match self.primary.execute(input.clone(), context).await {
            Ok(output) => {
                self.record_winner(context, &self.primary.name());
                return Ok(output);
            }
            Err(e) => {
                tracing::debug!(
                    correlation_id = %context.correlation_id(),
                    branch = %self.primary.name(),
                    error_kind = %e.kind_label(),
                    "fallback branch failed"
                );
                errors.push(e);
            }
        }

        for fallback in &self.fallbacks {
            match fallback.execute(input.clone(), context).await {
                Ok(output) => {
                    self.record_winner(context, &fallback.name());
                    return Ok(output);
                }
                Err(e) => {
                    tracing::debug!(
                        correlation_id = %context.correlation_id(),
                        branch = %fallback.name(),
                        error_kind = %e.kind_label(),
                        "fallback branch failed"
                    );
                    errors.push(e);
                }
            }
        }

        Err(Error::AllFallbacksFailed {
            primitive: self.name(),
            count: errors.len(),
            errors,
        })
    }

    fn name(&self) -> String {
        format!("fallback({})", self.primary.name())
    }
}
