// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Concurrency isolation around a noisy target
//!
//! The bulkhead is the designated backpressure primitive: it admits at most
//! `max_concurrent` concurrent executions of the target. Overflow either
//! queues on the semaphore (yielding to the scheduler) or rejects with
//! [`Error::BulkheadRejected`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::context::WorkflowContext;
use crate::error::{Error, Result};
use crate::primitive::WorkflowPrimitive;

/// What happens to callers past the concurrency cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait for a slot
    #[default]
    Queue,
    /// Fail immediately with [`Error::BulkheadRejected`]
    Reject,
}

/// Caps concurrent executions of the wrapped primitive
///
/// State (the permit pool) is per-wrapper-instance and process-local.
pub struct Bulkhead<P> {
    inner: P,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    policy: OverflowPolicy,
}

impl<P: WorkflowPrimitive> Bulkhead<P> {
    /// Wrap a primitive with a queueing bulkhead
    #[must_use]
    pub fn new(inner: P, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            policy: OverflowPolicy::Queue,
        }
    }

    /// Set the overflow policy
    #[must_use]
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Slots currently free
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[async_trait]
impl<P: WorkflowPrimitive> WorkflowPrimitive for Bulkhead<P> {
    type Input = P::Input;
    type Output = P::Output;

    async fn execute(
        &self,
        input: Self::Input,
        context: &WorkflowContext,
    ) -> Result<Self::Output> {
        let _permit = match self.policy {
            OverflowPolicy::Queue => {
                self.semaphore
                    .acquire()
                    .await
                    .map_err(|_| Error::Cancelled {
                        primitive: self.inner.name(),
                    })?
            }
            OverflowPolicy::Reject => match self.semaphore.try_acquire() {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::debug!(
                        correlation_id = %context.correlation_id(),
                        primitive = %self.inner.name(),
                        max_concurrent = self.max_concurrent,
                        "bulkhead rejected call"
                    );
                    return Err(Error::BulkheadRejected {
                        primitive: self.inner.name(),
                        max_concurrent: self.max_concurrent,
                    });
                }
            },
        };
        self.inner.execute(input, context).await
    }

    fn name(&self) -> String {
        format!("bulkhead({})", self.inner.name())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compose::Lambda;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn slow_counting(peak: Arc<AtomicUsize>, current: Arc<AtomicUsize>) -> Lambda<i64, i64> {
        Lambda::new("slow", move |x: i64| {
            let peak = Arc::clone(&peak);
            let current = Arc::clone(&current);
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok(x)
            }
        })
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let peak = Arc::new(AtomicUsize::new(0));
        let current = Arc::new(AtomicUsize::new(0));
        let bulkhead = Arc::new(Bulkhead::new(
            slow_counting(Arc::clone(&peak), Arc::clone(&current)),
            2,
        ));

        let ctx = WorkflowContext::new();
        let calls = (0..6).map(|i| {
            let bulkhead = Arc::clone(&bulkhead);
            let ctx = ctx.clone();
            async move { bulkhead.execute(i, &ctx).await }
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(Result::is_ok));
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_reject_policy_fails_overflow() {
        let peak = Arc::new(AtomicUsize::new(0));
        let current = Arc::new(AtomicUsize::new(0));
        let bulkhead = Arc::new(
            Bulkhead::new(slow_counting(peak, current), 1)
                .with_overflow_policy(OverflowPolicy::Reject),
        );

        let ctx = WorkflowContext::new();
        let first = {
            let bulkhead = Arc::clone(&bulkhead);
            let ctx = ctx.clone();
            tokio::spawn(async move { bulkhead.execute(1, &ctx).await })
        };
        // Let the first call take the only slot
        tokio::time::sleep(Duration::from_millis(5)).await;

        let err = bulkhead.execute(2, &ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BulkheadRejected);

        assert!(first.await.unwrap().is_ok());
        assert_eq!(bulkhead.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_queue_policy_waits_for_slot() {
        let peak = Arc::new(AtomicUsize::new(0));
        let current = Arc::new(AtomicUsize::new(0));
        let bulkhead = Arc::new(Bulkhead::new(slow_counting(peak, current), 1));

        let ctx = WorkflowContext::new();
        let calls = (0..3).map(|i| {
            let bulkhead = Arc::clone(&bulkhead);
            let ctx = ctx.clone();
            async move { bulkhead.execute(i, &ctx).await }
        });
        let results = futures::future::join_all(calls).await;
        assert!(results.iter().all(Result::is_ok));
    }
}
