// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Sequential composition
//!
//! [`Then`] chains two primitives with full static typing; [`Sequential`]
//! runs a declaration-ordered list of uniformly-typed steps. Both thread the
//! context unchanged, complete each step (including its instrumentation)
//! before starting the next, and short-circuit on the first failure with
//! that step's error kind.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::WorkflowContext;
use crate::error::Result;
use crate::primitive::WorkflowPrimitive;

/// Binary typed sequential composition: the output of `A` feeds `B`
pub struct Then<A, B> {
    first: A,
    second: B,
}

impl<A, B> Then<A, B>
where
    A: WorkflowPrimitive,
    B: WorkflowPrimitive<Input = A::Output>,
{
    /// Compose two primitives left-to-right
    #[must_use]
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

#[async_trait]
impl<A, B> WorkflowPrimitive for Then<A, B>
where
    A: WorkflowPrimitive,
    B: WorkflowPrimitive<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    async fn execute(
        &self,
        input: Self::Input,
        context: &WorkflowContext,
    ) -> Result<Self::Output> {
        let mid = self.first.execute(input, context).await?;
        self.second.execute(mid, context).await
    }

    fn name(&self) -> String {
        format!("{} >> {}", self.first.name(), self.second.name())
    }
}

type Step<T> = Arc<dyn WorkflowPrimitive<Input = T, Output = T>>;

/// Declaration-ordered sequence of uniformly-typed steps
///
/// The empty sequence is the identity primitive.
pub struct Sequential<T> {
    name: String,
    steps: Vec<Step<T>>,
}

impl<T: Send + 'static> Sequential<T> {
    /// Create an empty sequence
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    #[must_use]
    pub fn step<P>(mut self, primitive: P) -> Self
    where
        P: WorkflowPrimitive<Input = T, Output = T> + 'static,
    {
        self.steps.push(Arc::new(primitive));
        self
    }

    /// Append an already-shared step
    #[must_use]
    pub fn step_shared(mut self, primitive: Step<T>) -> Self {
        self.steps.push(primitive);
        self
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when the sequence has no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[async_trait]
impl<T: Send + 'static> WorkflowPrimitive for Sequential<T> {
    type Input = T;
    type Output = T;

    async fn execute(&self, input: T, context: &WorkflowContext) -> Result<T> {
        let mut value = input;
        for step in &self.steps {
            value = step.execute(value, context).await?;
        }
        Ok(value)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
