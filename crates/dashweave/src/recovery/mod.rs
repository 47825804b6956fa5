// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Recovery primitives
//!
//! Wrappers around a target primitive, each with its own failure semantics:
//! [`Retry`] (backoff and jitter), [`Fallback`] (ordered alternatives),
//! [`Timeout`] (cooperative deadline), [`CircuitBreaker`] (fail fast while a
//! target is unhealthy), [`Saga`] (compensating actions), and [`Bulkhead`]
//! (concurrency isolation). When the target succeeds on the first attempt,
//! every wrapper here is transparent: the output is the target's output.

mod bulkhead;
mod circuit_breaker;
mod fallback;
mod retry;
mod saga;
mod timeout;

pub use bulkhead::{Bulkhead, OverflowPolicy};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use fallback::Fallback;
pub use retry::{Retry, RetryClassifier, RetryPolicy};
pub use saga::Saga;
pub use timeout::Timeout;

pub(crate) use retry::run_attempts;
