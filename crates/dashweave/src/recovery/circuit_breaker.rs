// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Circuit breaker: fail fast while a target is unhealthy
//!
//! State is per-wrapper-instance and process-local; there is no cross-process
//! coordination. Mutations happen in short, non-await-holding critical
//! sections, so the breaker is safe on a multi-threaded scheduler.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::context::WorkflowContext;
use crate::error::{Error, Result};
use crate::primitive::WorkflowPrimitive;

/// Thresholds and timings for a circuit breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures within the rolling window that open the circuit
    pub failure_threshold: u32,
    /// Rolling window size, in calls
    pub window_size: usize,
    /// How long the circuit stays open before probing
    pub open_duration: Duration,
    /// Successful probes required to close from half-open
    pub half_open_probe_count: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window_size: 20,
            open_duration: Duration::from_secs(30),
            half_open_probe_count: 2,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create the default config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set the rolling window size
    #[must_use]
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size.max(1);
        self
    }

    /// Set the open duration
    #[must_use]
    pub fn with_open_duration(mut self, open_duration: Duration) -> Self {
        self.open_duration = open_duration;
        self
    }

    /// Set the half-open probe count
    #[must_use]
    pub fn with_half_open_probe_count(mut self, probes: u32) -> Self {
        self.half_open_probe_count = probes.max(1);
        self
    }
}

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures are counted
    Closed,
    /// Calls fail fast without invoking the target
    Open,
    /// A limited number of probes are admitted
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Closed,
    Open { until: Instant },
    HalfOpen { probes_started: u32, successes: u32 },
}

#[derive(Debug)]
struct BreakerState {
    state: State,
    // Rolling outcome window: true = failure
    outcomes: VecDeque<bool>,
}

/// Wraps a target and fails fast with [`Error::CircuitOpen`] while unhealthy
///
/// Closed → open when the failure threshold is crossed within the rolling
/// window; open → half-open after `open_duration`; half-open → closed after
/// `half_open_probe_count` consecutive successful probes, or back to open
/// (timer reset) on any probe failure.
pub struct CircuitBreaker<P> {
    inner: P,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl<P: WorkflowPrimitive> CircuitBreaker<P> {
    /// Wrap a primitive
    #[must_use]
    pub fn new(inner: P, config: CircuitBreakerConfig) -> Self {
        Self {
            inner,
            config,
            state: Mutex::new(BreakerState {
                state: State::Closed,
                outcomes: VecDeque::new(),
            }),
        }
    }

    /// The breaker's current state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let mut guard = self.state.lock();
        if let State::Open { until } = guard.state {
            if Instant::now() >= until {
                guard.state = State::HalfOpen {
                    probes_started: 0,
                    successes: 0,
                };
            }
        }
        match guard.state {
            State::Closed => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Admission check; returns an error when the call must fail fast
    fn admit(&self, context: &WorkflowContext) -> Result<()> {
        let mut guard = self.state.lock();
        match guard.state {
            State::Closed => Ok(()),
            State::Open { until } => {
                let now = Instant::now();
                if now < until {
                    drop(guard);
                    tracing::debug!(
                        correlation_id = %context.correlation_id(),
                        primitive = %self.inner.name(),
                        "circuit open, failing fast"
                    );
                    Err(Error::CircuitOpen {
                        primitive: self.inner.name(),
                        retry_after: until - now,
                    })
                } else {
                    // This call is the first half-open probe
                    guard.state = State::HalfOpen {
                        probes_started: 1,
                        successes: 0,
                    };
                    Ok(())
                }
            }
            State::HalfOpen {
                probes_started,
                successes,
            } => {
                if probes_started < self.config.half_open_probe_count {
                    guard.state = State::HalfOpen {
                        probes_started: probes_started + 1,
                        successes,
                    };
                    Ok(())
                } else {
                    drop(guard);
                    Err(Error::CircuitOpen {
                        primitive: self.inner.name(),
                        retry_after: Duration::ZERO,
                    })
                }
            }
        }
    }

    fn record(&self, failed: bool, context: &WorkflowContext) {
        let mut guard = self.state.lock();
        match guard.state {
            State::Closed => {
                guard.outcomes.push_back(failed);
                while guard.outcomes.len() > self.config.window_size {
                    guard.outcomes.pop_front();
                }
                let failures = guard.outcomes.iter().filter(|f| **f).count() as u32;
                if failures >= self.config.failure_threshold {
                    guard.state = State::Open {
                        until: Instant::now() + self.config.open_duration,
                    };
                    guard.outcomes.clear();
                    tracing::warn!(
                        correlation_id = %context.correlation_id(),
                        primitive = %self.inner.name(),
                        failures,
                        "circuit opened"
                    );
                }
            }
            State::HalfOpen {
                probes_started,
                successes,
            } => {
                if failed {
                    // Any probe failure re-opens and resets the timer
                    guard.state = State::Open {
                        until: Instant::now() + self.config.open_duration,
                    };
                    tracing::warn!(
                        correlation_id = %context.correlation_id(),
                        primitive = %self.inner.name(),
                        "probe failed, circuit re-opened"
                    );
                } else if successes + 1 >= self.config.half_open_probe_count {
                    guard.state = State::Closed;
                    guard.outcomes.clear();
                    tracing::info!(
                        correlation_id = %context.correlation_id(),
                        primitive = %self.inner.name(),
                        "circuit closed"
                    );
                } else {
                    guard.state = State::HalfOpen {
                        probes_started,
                        successes: successes + 1,
                    };
                }
            }
            State::Open { .. } => {}
        }
    }
}

#[async_trait]
impl<P: WorkflowPrimitive> WorkflowPrimitive for CircuitBreaker<P> {
    type Input = P::Input;
    type Output = P::Output;

    async fn execute(
        &self,
        input: Self::Input,
        context: &WorkflowContext,
    ) -> Result<Self::Output> {
        self.admit(context)?;
        let result = self.inner.execute(input, context).await;
        self.record(result.is_err(), context);
        result
    }

    fn name(&self) -> String {
        format!("circuit_breaker({})", self.inner.name())
    }
}
