// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Adapter wrapping a plain async callable as a primitive

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::context::WorkflowContext;
use crate::error::Result;
use crate::primitive::WorkflowPrimitive;

type LambdaFn<I, O> =
    Arc<dyn Fn(I, WorkflowContext) -> BoxFuture<'static, Result<O>> + Send + Sync>;

/// A plain async callable lifted into the primitive contract
///
/// Useful for mid-pipeline transformations; participates in composition,
/// instrumentation, and recovery like any other primitive.
///
/// ```rust,ignore
/// let inc = Lambda::new("inc", |x: i64| async move { Ok(x + 1) });
/// ```
pub struct Lambda<I, O> {
    name: String,
    description: Option<String>,
    f: LambdaFn<I, O>,
}

impl<I: Send + 'static, O: Send + 'static> Lambda<I, O> {
    /// Wrap an async callable over the input alone
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            f: Arc::new(move |input, _context| f(input).boxed()),
        }
    }

    /// Wrap an async callable that also receives the workflow context
    pub fn with_context<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(I, WorkflowContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            f: Arc::new(move |input, context| f(input, context).boxed()),
        }
    }

    /// Attach a description
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[async_trait]
impl<I: Send + 'static, O: Send + 'static> WorkflowPrimitive for Lambda<I, O> {
    type Input = I;
    type Output = O;

    async fn execute(&self, input: I, context: &WorkflowContext) -> Result<O> {
        (self.f)(input, context.clone()).await
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> Option<String> {
        self.description.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lambda_transforms_input() {
        let double = Lambda::new("double", |x: i64| async move { Ok(x * 2) });
        let ctx = WorkflowContext::new();
        assert_eq!(double.execute(21, &ctx).await.unwrap(), 42);
        assert_eq!(double.name(), "double");
    }

    #[tokio::test]
    async fn test_lambda_with_context_reads_metadata() {
        let scoped = Lambda::with_context("scoped", |x: i64, ctx: WorkflowContext| async move {
            let factor = ctx
                .metadata_value("factor")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(1);
            Ok(x * factor)
        });
        let ctx = WorkflowContext::new().with_metadata("factor", 10);
        assert_eq!(scoped.execute(4, &ctx).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_lambda_propagates_errors() {
        let failing: Lambda<i64, i64> = Lambda::new("failing", |_x: i64| async move {
            Err(crate::error::Error::target(
                "failing",
                "RuntimeError",
                anyhow::anyhow!("boom"),
            ))
        });
        let ctx = WorkflowContext::new();
        let err = failing.execute(1, &ctx).await.unwrap_err();
        assert_eq!(err.kind_label(), "RuntimeError");
    }

    #[test]
    fn test_lambda_description() {
        let p = Lambda::new("x", |v: i64| async move { Ok(v) }).describe("passes through");
        assert_eq!(p.description().as_deref(), Some("passes through"));
    }
}
