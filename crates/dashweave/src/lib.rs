// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! # DashWeave
//!
//! Composable async workflow primitives: typed composition combinators,
//! transparent instrumentation, recovery wrappers, and adaptive strategy
//! learning over a single uniform contract -
//! `primitive.execute(input, context)`.
//!
//! ## Composition
//!
//! ```rust,no_run
//! use dashweave::{flow, Lambda, WorkflowContext, WorkflowPrimitive};
//!
//! # #[tokio::main]
//! # async fn main() -> dashweave::Result<()> {
//! let inc = Lambda::new("inc", |x: i64| async move { Ok(x + 1) });
//! let double = Lambda::new("double", |x: i64| async move { Ok(x * 2) });
//!
//! let pipeline = flow(inc) >> double;
//! let context = WorkflowContext::new();
//! assert_eq!(pipeline.execute(5, &context).await?, 12);
//! # Ok(())
//! # }
//! ```
//!
//! ## Recovery
//!
//! Wrap any primitive with [`Retry`], [`Fallback`], [`Timeout`],
//! [`CircuitBreaker`], [`Saga`], or [`Bulkhead`]; when the target succeeds on
//! the first attempt the wrappers are transparent.
//!
//! ## Instrumentation
//!
//! [`instrument`] wraps a primitive with a span, start/end log records, and
//! cardinality-limited metrics. Sampling, export, and health reporting live
//! in the `dashweave-observability` crate; the correlation id on the
//! [`WorkflowContext`] ties every span, metric sample, and log record of an
//! execution together.
//!
//! ## Adaptation
//!
//! [`Adaptive`] primitives select among learned parameter strategies per
//! context scope, validate candidates before adoption, and fall back to an
//! always-present baseline when a strategy degrades. [`AdaptiveRetry`] is
//! the shipped reference implementation.

pub mod adaptive;
pub mod compose;
pub mod context;
pub mod dynamic;
pub mod error;
pub mod instrument;
pub mod primitive;
pub mod recovery;

pub use adaptive::{
    adaptive_retry, Adaptive, AdaptiveConfig, AdaptiveHooks, AdaptiveRetry, AdaptiveRetryHooks,
    JsonlStrategyStore, LearningMode, LearningStrategy, StrategyMetrics, StrategyStore,
    BASELINE_STRATEGY,
};
pub use compose::{
    Conditional, KeyedParallel, Lambda, Parallel, ParallelMode, Router, Sequential, Then,
};
pub use context::WorkflowContext;
pub use dynamic::ValueAdapter;
pub use error::{CompensationOutcome, Error, ErrorKind, Result};
pub use instrument::{instrument, Instrumented, PARENT_SPAN_KEY};
pub use primitive::{flow, Flow, Identity, WorkflowPrimitive, WorkflowPrimitiveExt};
pub use recovery::{
    Bulkhead, CircuitBreaker, CircuitBreakerConfig, CircuitState, Fallback, OverflowPolicy, Retry,
    RetryClassifier, RetryPolicy, Saga, Timeout,
};
