// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Cooperative deadline around a target primitive

use std::time::Duration;

use async_trait::async_trait;

use crate::context::WorkflowContext;
use crate::error::{Error, Result};
use crate::primitive::WorkflowPrimitive;

/// Cancels the target cooperatively if it does not complete in time
///
/// The target's future is dropped at the deadline, which is the scheduler's
/// cancellation signal: in-flight child spans are recorded as cancelled and
/// the caller observes [`Error::Timeout`]. There is no forceful interruption.
pub struct Timeout<P> {
    inner: P,
    timeout: Duration,
}

impl<P: WorkflowPrimitive> Timeout<P> {
    /// Wrap a primitive with a deadline
    #[must_use]
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<P: WorkflowPrimitive> WorkflowPrimitive for Timeout<P> {
    type Input = P::Input;
    type Output = P::Output;

    async fn execute(
        &self,
        input: Self::Input,
        context: &WorkflowContext,
    ) -> Result<Self::Output> {
        match tokio::time::timeout(self.timeout, self.inner.execute(input, context)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                tracing::warn!(
                    correlation_id = %context.correlation_id(),
                    primitive = %self.inner.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "primitive timed out"
                );
                Err(Error::Timeout {
                    primitive: self.inner.name(),
                    timeout: self.timeout,
                })
            }
        }
    }

    fn name(&self) -> String {
        format!("timeout({})", self.inner.name())
    }
}
