// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The uniform async invocation surface every workflow unit presents
//!
//! A [`WorkflowPrimitive`] is an atomic or composite unit of async work with
//! one entry point: `execute(input, context)`. Composition produces new
//! primitives from old ones without changing that shape, so instrumentation
//! and recovery wrappers apply uniformly at every level of a tree.
//!
//! Sequential data flow is statically typed: `a.then(b)` is well-formed only
//! when `a`'s output type is `b`'s input type. The [`Flow`] wrapper adds the
//! operator spelling (`>>` for sequential, `&` for a parallel pair):
//!
//! ```rust,ignore
//! let pipeline = flow(fetch) >> parse >> summarize;
//! let race = flow(primary_model) & backup_model;
//! ```

use std::marker::PhantomData;
use std::ops::{BitAnd, Shr};
use std::sync::Arc;

use async_trait::async_trait;

use crate::compose::{Parallel, Then};
use crate::context::WorkflowContext;
use crate::error::Result;

/// An atomic or composite unit of async workflow work
///
/// Implementations are constructed once at composition time and may be
/// reused across many executions; apart from instrumentation counters they
/// must be stateless with respect to invocation. Primitives holding internal
/// state (circuit breakers, adaptive strategy tables) document that state as
/// part of their contract.
#[async_trait]
pub trait WorkflowPrimitive: Send + Sync {
    /// The input shape
    type Input: Send + 'static;
    /// The output shape
    type Output: Send + 'static;

    /// Execute the unit of work
    ///
    /// The context is threaded unchanged through composites; re-invoking with
    /// the same inputs is allowed and produces a fresh trace.
    async fn execute(&self, input: Self::Input, context: &WorkflowContext)
        -> Result<Self::Output>;

    /// Human-readable name, used in spans, metrics, and errors
    fn name(&self) -> String;

    /// Optional description
    fn description(&self) -> Option<String> {
        None
    }

    /// True when this primitive is already wrapped by the instrumentation
    /// layer; wrapping an instrumented primitive again adds no second span
    fn is_instrumented(&self) -> bool {
        false
    }
}

#[async_trait]
impl<P: WorkflowPrimitive + ?Sized> WorkflowPrimitive for Arc<P> {
    type Input = P::Input;
    type Output = P::Output;

    async fn execute(
        &self,
        input: Self::Input,
        context: &WorkflowContext,
    ) -> Result<Self::Output> {
        (**self).execute(input, context).await
    }

    fn name(&self) -> String {
        (**self).name()
    }

    fn description(&self) -> Option<String> {
        (**self).description()
    }

    fn is_instrumented(&self) -> bool {
        (**self).is_instrumented()
    }
}

/// Combinator methods available on every sized primitive
pub trait WorkflowPrimitiveExt: WorkflowPrimitive + Sized {
    /// Sequential composition: run `self`, feed its output to `next`
    fn then<B>(self, next: B) -> Then<Self, B>
    where
        B: WorkflowPrimitive<Input = Self::Output>,
    {
        Then::new(self, next)
    }
}

impl<P: WorkflowPrimitive + Sized> WorkflowPrimitiveExt for P {}

/// The identity primitive: returns its input unchanged
///
/// The empty sequential composition is observationally equivalent to this.
pub struct Identity<T> {
    _marker: PhantomData<fn(T) -> T>,
}

impl<T> Identity<T> {
    /// Create an identity primitive
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Identity<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + 'static> WorkflowPrimitive for Identity<T> {
    type Input = T;
    type Output = T;

    async fn execute(&self, input: T, _context: &WorkflowContext) -> Result<T> {
        Ok(input)
    }

    fn name(&self) -> String {
        "identity".to_string()
    }
}

/// Operator wrapper enabling `>>` (sequential) and `&` (parallel pair)
pub struct Flow<P>(P);

/// Wrap a primitive for operator composition
pub fn flow<P: WorkflowPrimitive>(primitive: P) -> Flow<P> {
    Flow(primitive)
}

impl<P> Flow<P> {
    /// Unwrap the composed primitive
    pub fn into_inner(self) -> P {
        self.0
    }
}

#[async_trait]
impl<P: WorkflowPrimitive> WorkflowPrimitive for Flow<P> {
    type Input = P::Input;
    type Output = P::Output;

    async fn execute(
        &self,
        input: Self::Input,
        context: &WorkflowContext,
    ) -> Result<Self::Output> {
        self.0.execute(input, context).await
    }

    fn name(&self) -> String {
        self.0.name()
    }

    fn description(&self) -> Option<String> {
        self.0.description()
    }

    fn is_instrumented(&self) -> bool {
        self.0.is_instrumented()
    }
}

impl<A, B> Shr<B> for Flow<A>
where
    A: WorkflowPrimitive,
    B: WorkflowPrimitive<Input = A::Output>,
{
    type Output = Flow<Then<A, B>>;

    fn shr(self, rhs: B) -> Self::Output {
        Flow(Then::new(self.0, rhs))
    }
}

impl<A, B> BitAnd<B> for Flow<A>
where
    A: WorkflowPrimitive + 'static,
    A::Input: Clone + Send + Sync + 'static,
    B: WorkflowPrimitive<Input = A::Input, Output = A::Output> + 'static,
{
    type Output = Flow<Parallel<A::Input, A::Output>>;

    fn bitand(self, rhs: B) -> Self::Output {
        Flow(Parallel::new(vec![
            Arc::new(self.0) as Arc<dyn WorkflowPrimitive<Input = A::Input, Output = A::Output>>,
            Arc::new(rhs),
        ]))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compose::Lambda;

    #[tokio::test]
    async fn test_identity_returns_input() {
        let id = Identity::<i64>::new();
        let ctx = WorkflowContext::new();
        assert_eq!(id.execute(7, &ctx).await.unwrap(), 7);
        assert_eq!(id.name(), "identity");
    }

    #[tokio::test]
    async fn test_then_combinator() {
        let inc = Lambda::new("inc", |x: i64| async move { Ok(x + 1) });
        let double = Lambda::new("double", |x: i64| async move { Ok(x * 2) });
        let pipeline = inc.then(double);

        let ctx = WorkflowContext::new();
        assert_eq!(pipeline.execute(5, &ctx).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_shr_operator() {
        let inc = Lambda::new("inc", |x: i64| async move { Ok(x + 1) });
        let double = Lambda::new("double", |x: i64| async move { Ok(x * 2) });
        let to_string = Lambda::new("to_string", |x: i64| async move { Ok(x.to_string()) });
        let pipeline = flow(inc) >> double >> to_string;

        let ctx = WorkflowContext::new();
        assert_eq!(pipeline.execute(5, &ctx).await.unwrap(), "12");
    }

    #[tokio::test]
    async fn test_bitand_operator_fans_out() {
        let upper = Lambda::new("upper", |s: String| async move { Ok(s.to_uppercase()) });
        let lower = Lambda::new("lower", |s: String| async move { Ok(s.to_lowercase()) });
        let both = flow(upper) & lower;

        let ctx = WorkflowContext::new();
        let out = both.execute("MiXeD".to_string(), &ctx).await.unwrap();
        assert_eq!(out, vec!["MIXED".to_string(), "mixed".to_string()]);
    }

    #[tokio::test]
    async fn test_arc_primitive_delegates() {
        let inc = Arc::new(Lambda::new("inc", |x: i64| async move { Ok(x + 1) }));
        let ctx = WorkflowContext::new();
        assert_eq!(inc.execute(1, &ctx).await.unwrap(), 2);
        assert_eq!(inc.name(), "inc");
    }
}
