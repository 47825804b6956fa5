// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Adaptive primitives: strategy selection, learning, and safe promotion
//!
//! An [`Adaptive`] primitive wraps a target behind a pair of hooks and holds
//! a small table of [`LearningStrategy`] records. Per invocation it selects
//! the strategy for the current context scope, executes under it, records
//! the outcome, lets the learning hook propose a new strategy, and falls
//! back to the baseline when the selected strategy's rolling failure rate
//! crosses the circuit-breaker threshold.
//!
//! The baseline strategy always exists and is never removed; a context scope
//! with no validated strategy runs the baseline. The strategy table is
//! per-instance, process-local mutable state.

mod retry;
mod store;
mod strategy;

pub use retry::{adaptive_retry, AdaptiveRetry, AdaptiveRetryHooks};
pub use store::{JsonlStrategyStore, StrategyStore};
pub use strategy::{LearningStrategy, StrategyMetrics, BASELINE_STRATEGY};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::WorkflowContext;
use crate::error::Result;
use crate::primitive::WorkflowPrimitive;

/// How aggressively an adaptive primitive adopts new strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LearningMode {
    /// Always run the baseline; no learning
    #[default]
    Disabled,
    /// Run the baseline; file proposed strategies without ever running them
    Observe,
    /// Run a proposed strategy through a validation window before adoption
    Validate,
    /// Adopt proposed strategies immediately; the baseline remains the
    /// circuit-breaker fallback
    Active,
}

/// Tunables for an adaptive primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Adoption policy
    pub mode: LearningMode,
    /// Context metadata keys that partition strategies into scopes
    pub scope_keys: Vec<String>,
    /// Outcomes a strategy must accumulate before proposals are considered
    pub min_observations_before_learning: u64,
    /// Invocations a validation window spans
    pub validation_window_size: usize,
    /// Success rate the validation window must meet
    pub validation_threshold: f64,
    /// Rolling failure rate at which a non-baseline strategy is benched
    pub circuit_breaker_threshold: f64,
    /// Outcomes required before the circuit breaker may trip
    pub circuit_breaker_min_observations: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            mode: LearningMode::Disabled,
            scope_keys: vec!["environment".to_string()],
            min_observations_before_learning: 10,
            validation_window_size: 10,
            validation_threshold: 0.8,
            circuit_breaker_threshold: 0.5,
            circuit_breaker_min_observations: 5,
        }
    }
}

impl AdaptiveConfig {
    /// Create the default config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the learning mode
    #[must_use]
    pub fn with_mode(mut self, mode: LearningMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the context keys that partition strategy scopes
    #[must_use]
    pub fn with_scope_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the minimum observations before proposals are considered
    #[must_use]
    pub fn with_min_observations(mut self, min: u64) -> Self {
        self.min_observations_before_learning = min;
        self
    }

    /// Set the validation window and threshold
    #[must_use]
    pub fn with_validation(mut self, window_size: usize, threshold: f64) -> Self {
        self.validation_window_size = window_size.max(1);
        self.validation_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the circuit-breaker failure-rate threshold
    #[must_use]
    pub fn with_circuit_breaker_threshold(mut self, threshold: f64) -> Self {
        self.circuit_breaker_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

/// Domain hooks an adaptive primitive delegates to
///
/// The base primitive owns selection, recording, validation, the circuit
/// breaker, and persistence; the hooks supply the work itself and the
/// proposal logic.
#[async_trait]
pub trait AdaptiveHooks: Send + Sync {
    /// The input shape
    type Input: Send + 'static;
    /// The output shape
    type Output: Send + 'static;

    /// Run the work under the given strategy's parameters
    async fn execute_with_strategy(
        &self,
        input: Self::Input,
        context: &WorkflowContext,
        strategy: &LearningStrategy,
    ) -> Result<Self::Output>;

    /// Inspect recent metrics and optionally propose a new strategy
    ///
    /// Called only once the currently-selected strategy has accumulated the
    /// configured minimum observations. A proposal whose name already exists
    /// in the table is ignored.
    fn consider_new_strategy(
        &self,
        current: &LearningStrategy,
        baseline: &LearningStrategy,
    ) -> Option<LearningStrategy>;
}

#[derive(Debug)]
struct AdaptiveState {
    strategies: HashMap<String, LearningStrategy>,
    active_by_scope: HashMap<String, String>,
    validating_by_scope: HashMap<String, String>,
}

/// Strategy-selecting wrapper with learning, validation, and baseline fallback
pub struct Adaptive<H: AdaptiveHooks> {
    name: String,
    hooks: H,
    config: AdaptiveConfig,
    state: Mutex<AdaptiveState>,
    store: Option<Arc<dyn StrategyStore>>,
}

impl<H: AdaptiveHooks> Adaptive<H> {
    /// Create an adaptive primitive with the given baseline parameters
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        hooks: H,
        baseline_parameters: HashMap<String, Value>,
        config: AdaptiveConfig,
    ) -> Self {
        let baseline = LearningStrategy::baseline(baseline_parameters);
        let mut strategies = HashMap::new();
        strategies.insert(baseline.name.clone(), baseline);
        Self {
            name: name.into(),
            hooks,
            config,
            state: Mutex::new(AdaptiveState {
                strategies,
                active_by_scope: HashMap::new(),
                validating_by_scope: HashMap::new(),
            }),
            store: None,
        }
    }

    /// Attach a best-effort persistence destination for adopted strategies
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn StrategyStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The scope key for a context, from the configured metadata keys
    #[must_use]
    pub fn scope_for(&self, context: &WorkflowContext) -> String {
        let parts: Vec<String> = self
            .config
            .scope_keys
            .iter()
            .filter_map(|key| {
                context
                    .metadata_str(key)
                    .map(|value| format!("{key}={value}"))
            })
            .collect();
        if parts.is_empty() {
            "default".to_string()
        } else {
            parts.join(",")
        }
    }

    /// The strategy the next invocation in this scope would run
    #[must_use]
    pub fn active_strategy_name(&self, scope: &str) -> String {
        let state = self.state.lock();
        self.select_name(&state, scope)
    }

    /// A strategy record by name
    #[must_use]
    pub fn strategy(&self, name: &str) -> Option<LearningStrategy> {
        self.state.lock().strategies.get(name).cloned()
    }

    /// All strategy records
    #[must_use]
    pub fn strategies(&self) -> Vec<LearningStrategy> {
        self.state.lock().strategies.values().cloned().collect()
    }

    fn select_name(&self, state: &AdaptiveState, scope: &str) -> String {
        match self.config.mode {
            LearningMode::Disabled | LearningMode::Observe => BASELINE_STRATEGY.to_string(),
            LearningMode::Validate => state
                .validating_by_scope
                .get(scope)
                .or_else(|| state.active_by_scope.get(scope))
                .cloned()
                .unwrap_or_else(|| BASELINE_STRATEGY.to_string()),
            LearningMode::Active => state
                .active_by_scope
                .get(scope)
                .cloned()
                .unwrap_or_else(|| BASELINE_STRATEGY.to_string()),
        }
    }

    fn select_strategy(&self, scope: &str) -> LearningStrategy {
        let state = self.state.lock();
        let name = self.select_name(&state, scope);
        state
            .strategies
            .get(&name)
            .or_else(|| state.strategies.get(BASELINE_STRATEGY))
            .cloned()
            .unwrap_or_else(|| LearningStrategy::baseline(HashMap::new()))
    }

    fn spawn_persist(&self, strategy: LearningStrategy) {
        let Some(store) = self.store.as_ref().map(Arc::clone) else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let primitive = self.name.clone();
        handle.spawn(async move {
            if let Err(e) = store.persist(&primitive, &strategy).await {
                tracing::warn!(
                    primitive = %primitive,
                    strategy = %strategy.name,
                    error = %e,
                    "strategy persistence failed"
                );
            }
        });
    }

    /// Record an outcome and run the learning and circuit-breaker steps
    fn after_execution(
        &self,
        scope: &str,
        strategy_name: &str,
        success: bool,
        latency_ms: u64,
        context: &WorkflowContext,
    ) {
        let mut adopted: Option<LearningStrategy> = None;
        {
            let mut state = self.state.lock();

            if let Some(strategy) = state.strategies.get_mut(strategy_name) {
                strategy.metrics.record(success, latency_ms, scope);
            }

            // Validation accounting for the scope's in-flight candidate
            if self.config.mode == LearningMode::Validate
                && state.validating_by_scope.get(scope).map(String::as_str) == Some(strategy_name)
            {
                let window_complete = if let Some(candidate) =
                    state.strategies.get_mut(strategy_name)
                {
                    candidate.record_validation(success);
                    candidate.validation_attempts >= candidate.validation_window_size
                } else {
                    false
                };
                if window_complete {
                    state.validating_by_scope.remove(scope);
                    let graduated = state
                        .strategies
                        .get(strategy_name)
                        .is_some_and(LearningStrategy::is_validated);
                    if graduated {
                        state
                            .active_by_scope
                            .insert(scope.to_string(), strategy_name.to_string());
                        tracing::info!(
                            correlation_id = %context.correlation_id(),
                            primitive = %self.name,
                            strategy = strategy_name,
                            scope,
                            "strategy validated and adopted"
                        );
                        adopted = state.strategies.get(strategy_name).cloned();
                    } else {
                        tracing::info!(
                            correlation_id = %context.correlation_id(),
                            primitive = %self.name,
                            strategy = strategy_name,
                            scope,
                            "strategy failed validation, demoted"
                        );
                    }
                }
            }

            // Circuit breaker: bench a misbehaving non-baseline strategy
            if strategy_name != BASELINE_STRATEGY {
                let tripped = state.strategies.get(strategy_name).is_some_and(|s| {
                    s.metrics.recent_outcomes.len() >= self.config.circuit_breaker_min_observations
                        && s.metrics.rolling_failure_rate() > self.config.circuit_breaker_threshold
                });
                if tripped {
                    state.active_by_scope.remove(scope);
                    state.validating_by_scope.remove(scope);
                    tracing::warn!(
                        correlation_id = %context.correlation_id(),
                        primitive = %self.name,
                        strategy = strategy_name,
                        scope,
                        "strategy circuit breaker tripped, reverting to baseline"
                    );
                }
            }

            // Learning step: let the hook propose a new strategy
            if self.config.mode != LearningMode::Disabled {
                let eligible = state
                    .strategies
                    .get(strategy_name)
                    .is_some_and(|s| {
                        s.metrics.observation_count() >= self.config.min_observations_before_learning
                    })
                    && (self.config.mode != LearningMode::Validate
                        || !state.validating_by_scope.contains_key(scope));
                if eligible {
                    let current = state.strategies.get(strategy_name).cloned();
                    let baseline = state.strategies.get(BASELINE_STRATEGY).cloned();
                    if let (Some(current), Some(baseline)) = (current, baseline) {
                        if let Some(candidate) =
                            self.hooks.consider_new_strategy(&current, &baseline)
                        {
                            if !state.strategies.contains_key(&candidate.name) {
                                let candidate_name = candidate.name.clone();
                                match self.config.mode {
                                    LearningMode::Observe => {
                                        tracing::debug!(
                                            primitive = %self.name,
                                            strategy = %candidate_name,
                                            "strategy filed for observation"
                                        );
                                        state.strategies.insert(candidate_name, candidate);
                                    }
                                    LearningMode::Validate => {
                                        let candidate = candidate.with_validation(
                                            self.config.validation_window_size,
                                            self.config.validation_threshold,
                                        );
                                        tracing::info!(
                                            primitive = %self.name,
                                            strategy = %candidate_name,
                                            scope,
                                            "strategy proposed, validation started"
                                        );
                                        state.strategies.insert(candidate_name.clone(), candidate);
                                        state
                                            .validating_by_scope
                                            .insert(scope.to_string(), candidate_name);
                                    }
                                    LearningMode::Active => {
                                        tracing::info!(
                                            primitive = %self.name,
                                            strategy = %candidate_name,
                                            scope,
                                            "strategy adopted"
                                        );
                                        state.strategies.insert(candidate_name.clone(), candidate);
                                        state
                                            .active_by_scope
                                            .insert(scope.to_string(), candidate_name.clone());
                                        adopted = state.strategies.get(&candidate_name).cloned();
                                    }
                                    LearningMode::Disabled => {}
                                }
                            }
                        }
                    }
                }
            }
        }

        if let Some(strategy) = adopted {
            self.spawn_persist(strategy);
        }
    }
}

#[async_trait]
impl<H: AdaptiveHooks> WorkflowPrimitive for Adaptive<H> {
    type Input = H::Input;
    type Output = H::Output;

    async fn execute(
        &self,
        input: Self::Input,
        context: &WorkflowContext,
    ) -> Result<Self::Output> {
        let scope = self.scope_for(context);
        let strategy = self.select_strategy(&scope);

        let started = Instant::now();
        let result = self
            .hooks
            .execute_with_strategy(input, context, &strategy)
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        self.after_execution(&scope, &strategy.name, result.is_ok(), latency_ms, context);
        result
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
