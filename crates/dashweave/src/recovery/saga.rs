// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Compensation (saga) workflow
//!
//! Actions run in order, threading a uniformly-typed state. When an action
//! fails, the compensators of every completed action run in reverse order,
//! each receiving the state its action produced. Compensator failures are
//! logged and reported but never mask the original failure.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::WorkflowContext;
use crate::error::{CompensationOutcome, Error, Result};
use crate::primitive::WorkflowPrimitive;

type Step<T> = Arc<dyn WorkflowPrimitive<Input = T, Output = T>>;

/// Ordered (action, compensator) pairs with reverse-order compensation
pub struct Saga<T> {
    name: String,
    steps: Vec<(Step<T>, Step<T>)>,
}

impl<T: Clone + Send + Sync + 'static> Saga<T> {
    /// Create an empty saga
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append an action and its compensator
    #[must_use]
    pub fn step<A, C>(mut self, action: A, compensator: C) -> Self
    where
        A: WorkflowPrimitive<Input = T, Output = T> + 'static,
        C: WorkflowPrimitive<Input = T, Output = T> + 'static,
    {
        self.steps.push((Arc::new(action), Arc::new(compensator)));
        self
    }

    async fn compensate(
        &self,
        completed_states: &[T],
        context: &WorkflowContext,
    ) -> Vec<CompensationOutcome> {
        let mut report = Vec::with_capacity(completed_states.len());
        for step_index in (0..completed_states.len()).rev() {
            let (_, compensator) = &self.steps[step_index];
            let state = completed_states[step_index].clone();
            match compensator.execute(state, context).await {
                Ok(_) => {
                    tracing::debug!(
                        correlation_id = %context.correlation_id(),
                        saga = %self.name,
                        step = step_index,
                        compensator = %compensator.name(),
                        "compensator succeeded"
                    );
                    report.push(CompensationOutcome {
                        step: step_index,
                        compensator: compensator.name(),
                        succeeded: true,
                        message: None,
                    });
                }
                Err(e) => {
                    tracing::error!(
                        correlation_id = %context.correlation_id(),
                        saga = %self.name,
                        step = step_index,
                        compensator = %compensator.name(),
                        error = %e,
                        "compensator failed"
                    );
                    report.push(CompensationOutcome {
                        step: step_index,
                        compensator: compensator.name(),
                        succeeded: false,
                        message: Some(e.to_string()),
                    });
                }
            }
        }
        report
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> WorkflowPrimitive for Saga<T> {
    type Input = T;
    type Output = T;

    async fn execute(&self, input: T, context: &WorkflowContext) -> Result<T> {
        let mut completed_states: Vec<T> = Vec::with_capacity(self.steps.len());
        let mut current = input;

        for (index, (action, _)) in self.steps.iter().enumerate() {
            match action.execute(current.clone(), context).await {
                Ok(next) => {
                    completed_states.push(next.clone());
                    current = next;
                }
                Err(e) => {
                    tracing::warn!(
                        correlation_id = %context.correlation_id(),
                        saga = %self.name,
                        failed_step = index,
                        error_kind = %e.kind_label(),
                        "saga action failed, compensating"
                    );
                    let report = self.compensate(&completed_states, context).await;
                    return Err(Error::SagaFailed {
                        primitive: self.name.clone(),
                        failed_step: index,
                        source: Box::new(e),
                        report,
                    });
                }
            }
        }
        Ok(current)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
