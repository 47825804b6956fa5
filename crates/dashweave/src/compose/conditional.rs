// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Two-way branching on a predicate over (input, context)

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::WorkflowContext;
use crate::error::{Error, Result};
use crate::primitive::WorkflowPrimitive;

type Branch<I, O> = Arc<dyn WorkflowPrimitive<Input = I, Output = O>>;
type Predicate<I> =
    Arc<dyn Fn(&I, &WorkflowContext) -> anyhow::Result<bool> + Send + Sync>;

/// Runs one of two branches depending on a predicate
///
/// Both branches share the same output type. A predicate error surfaces as
/// [`Error::Predicate`].
pub struct Conditional<I, O> {
    name: String,
    predicate: Predicate<I>,
    then_branch: Branch<I, O>,
    else_branch: Branch<I, O>,
}

impl<I, O> Conditional<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Branch on a fallible predicate
    pub fn new<F, T, E>(name: impl Into<String>, predicate: F, then_branch: T, else_branch: E) -> Self
    where
        F: Fn(&I, &WorkflowContext) -> anyhow::Result<bool> + Send + Sync + 'static,
        T: WorkflowPrimitive<Input = I, Output = O> + 'static,
        E: WorkflowPrimitive<Input = I, Output = O> + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
            then_branch: Arc::new(then_branch),
            else_branch: Arc::new(else_branch),
        }
    }

    /// Branch on an infallible predicate
    pub fn when<F, T, E>(name: impl Into<String>, predicate: F, then_branch: T, else_branch: E) -> Self
    where
        F: Fn(&I, &WorkflowContext) -> bool + Send + Sync + 'static,
        T: WorkflowPrimitive<Input = I, Output = O> + 'static,
        E: WorkflowPrimitive<Input = I, Output = O> + 'static,
    {
        Self::new(
            name,
            move |input, context| Ok(predicate(input, context)),
            then_branch,
            else_branch,
        )
    }
}

#[async_trait]
impl<I, O> WorkflowPrimitive for Conditional<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    async fn execute(&self, input: I, context: &WorkflowContext) -> Result<O> {
        let taken = (self.predicate)(&input, context).map_err(|e| Error::Predicate {
            primitive: self.name.clone(),
            message: e.to_string(),
        })?;
        if taken {
            self.then_branch.execute(input, context).await
        } else {
            self.else_branch.execute(input, context).await
        }
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compose::Lambda;
    use crate::error::ErrorKind;

    fn tag(name: &str, label: &str) -> Lambda<i64, String> {
        let label = label.to_string();
        Lambda::new(name, move |x: i64| {
            let label = label.clone();
            async move { Ok(format!("{label}:{x}")) }
        })
    }

    #[tokio::test]
    async fn test_predicate_selects_then_branch() {
        let cond = Conditional::when(
            "sign",
            |x: &i64, _ctx| *x >= 0,
            tag("pos", "positive"),
            tag("neg", "negative"),
        );
        let ctx = WorkflowContext::new();
        assert_eq!(cond.execute(5, &ctx).await.unwrap(), "positive:5");
        assert_eq!(cond.execute(-5, &ctx).await.unwrap(), "negative:-5");
    }

    #[tokio::test]
    async fn test_predicate_reads_context() {
        let cond = Conditional::when(
            "env-gate",
            |_x: &i64, ctx: &WorkflowContext| ctx.metadata_str("environment") == Some("production"),
            tag("strict", "strict"),
            tag("lenient", "lenient"),
        );
        let prod = WorkflowContext::new().with_metadata("environment", "production");
        assert_eq!(cond.execute(1, &prod).await.unwrap(), "strict:1");
        let dev = WorkflowContext::new();
        assert_eq!(cond.execute(1, &dev).await.unwrap(), "lenient:1");
    }

    #[tokio::test]
    async fn test_predicate_error_surfaces_as_predicate_kind() {
        let cond: Conditional<i64, String> = Conditional::new(
            "broken",
            |_x: &i64, _ctx| anyhow::bail!("predicate exploded"),
            tag("a", "a"),
            tag("b", "b"),
        );
        let ctx = WorkflowContext::new();
        let err = cond.execute(1, &ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Predicate);
        assert!(err.to_string().contains("predicate exploded"));
    }
}
