// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Strategy records for the adaptive layer
//!
//! A [`LearningStrategy`] is a named parameter set for a target primitive,
//! with rolling performance metrics and a validation state. This record
//! shape is also what the optional persistence side-effect writes.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the always-present, always-safe strategy
pub const BASELINE_STRATEGY: &str = "baseline";

/// Outcomes retained for rolling-window calculations
const ROLLING_WINDOW: usize = 50;

/// Rolling performance metrics for one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StrategyMetrics {
    /// Successful invocations under this strategy
    pub success_count: u64,
    /// Failed invocations under this strategy
    pub failure_count: u64,
    /// Sum of observed latencies, for the average
    pub total_latency_ms: u64,
    /// Distinct context scopes this strategy has served
    pub contexts_seen: HashSet<String>,
    /// Recent outcomes, newest last (true = success)
    pub recent_outcomes: VecDeque<bool>,
}

impl StrategyMetrics {
    /// Record one invocation outcome
    pub fn record(&mut self, success: bool, latency_ms: u64, scope: &str) {
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.total_latency_ms += latency_ms;
        self.contexts_seen.insert(scope.to_string());
        self.recent_outcomes.push_back(success);
        while self.recent_outcomes.len() > ROLLING_WINDOW {
            self.recent_outcomes.pop_front();
        }
    }

    /// Total invocations observed
    #[must_use]
    pub fn observation_count(&self) -> u64 {
        self.success_count + self.failure_count
    }

    /// Lifetime success rate, 1.0 when nothing was observed
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.observation_count();
        if total == 0 {
            1.0
        } else {
            self.success_count as f64 / total as f64
        }
    }

    /// Failure rate over the rolling window, 0.0 when nothing was observed
    #[must_use]
    pub fn rolling_failure_rate(&self) -> f64 {
        if self.recent_outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.recent_outcomes.iter().filter(|s| !**s).count();
        failures as f64 / self.recent_outcomes.len() as f64
    }

    /// Mean latency across all observations
    #[must_use]
    pub fn average_latency_ms(&self) -> f64 {
        let total = self.observation_count();
        if total == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / total as f64
        }
    }

    /// Number of distinct context scopes seen
    #[must_use]
    pub fn distinct_contexts(&self) -> usize {
        self.contexts_seen.len()
    }
}

/// A named parameter set with attached metrics and validation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStrategy {
    /// Unique name within the owning adaptive primitive
    pub name: String,
    /// What this strategy changes and why
    pub description: String,
    /// Parameters, interpreted by the owning primitive's hook
    pub parameters: HashMap<String, Value>,
    /// Rolling performance metrics
    pub metrics: StrategyMetrics,
    /// Invocations a validation pass must observe
    pub validation_window_size: usize,
    /// Invocations observed during validation
    pub validation_attempts: usize,
    /// Successes observed during validation
    pub validation_successes: usize,
    /// Success-rate bar the validation window must clear
    pub validation_threshold: f64,
}

impl LearningStrategy {
    /// Create a strategy with the given parameters
    #[must_use]
    pub fn new(name: impl Into<String>, parameters: HashMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameters,
            metrics: StrategyMetrics::default(),
            validation_window_size: 0,
            validation_attempts: 0,
            validation_successes: 0,
            validation_threshold: 0.0,
        }
    }

    /// Create the baseline strategy
    ///
    /// The baseline needs no validation: its window is empty and it is
    /// validated by construction.
    #[must_use]
    pub fn baseline(parameters: HashMap<String, Value>) -> Self {
        let mut strategy = Self::new(BASELINE_STRATEGY, parameters);
        strategy.description = "Always-safe fallback parameters".to_string();
        strategy
    }

    /// Attach a description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Arm a validation window
    #[must_use]
    pub fn with_validation(mut self, window_size: usize, threshold: f64) -> Self {
        self.validation_window_size = window_size;
        self.validation_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Whether this is the baseline strategy
    #[must_use]
    pub fn is_baseline(&self) -> bool {
        self.name == BASELINE_STRATEGY
    }

    /// Record a validation-window observation
    pub fn record_validation(&mut self, success: bool) {
        self.validation_attempts += 1;
        if success {
            self.validation_successes += 1;
        }
    }

    /// True once the full validation window met its success threshold
    ///
    /// A strategy with no validation window (the baseline, or one adopted in
    /// ACTIVE mode) is trivially validated.
    #[must_use]
    pub fn is_validated(&self) -> bool {
        if self.validation_window_size == 0 {
            return true;
        }
        self.validation_attempts >= self.validation_window_size
            && self.validation_successes as f64
                >= self.validation_threshold * self.validation_window_size as f64
    }

    /// A numeric parameter, when present
    #[must_use]
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).and_then(Value::as_f64)
    }

    /// An integer parameter, when present
    #[must_use]
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.parameters.get(key).and_then(Value::as_u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> HashMap<String, Value> {
        HashMap::from([
            ("max_retries".to_string(), json!(3)),
            ("backoff_factor".to_string(), json!(2.0)),
        ])
    }

    #[test]
    fn test_baseline_is_validated_by_construction() {
        let baseline = LearningStrategy::baseline(params());
        assert!(baseline.is_baseline());
        assert!(baseline.is_validated());
    }

    #[test]
    fn test_validation_window_must_complete() {
        let mut s = LearningStrategy::new("candidate", params()).with_validation(4, 0.75);
        assert!(!s.is_validated());

        s.record_validation(true);
        s.record_validation(true);
        s.record_validation(true);
        // Three of four observations: the window is not yet full
        assert!(!s.is_validated());

        s.record_validation(false);
        // 3/4 = 0.75 meets the bar across the full window
        assert!(s.is_validated());
    }

    #[test]
    fn test_validation_below_threshold_fails() {
        let mut s = LearningStrategy::new("candidate", params()).with_validation(4, 0.75);
        s.record_validation(true);
        s.record_validation(false);
        s.record_validation(false);
        s.record_validation(true);
        assert!(!s.is_validated());
    }

    #[test]
    fn test_metrics_rolling_failure_rate() {
        let mut m = StrategyMetrics::default();
        for _ in 0..8 {
            m.record(true, 10, "default");
        }
        m.record(false, 10, "default");
        m.record(false, 10, "default");
        assert!((m.rolling_failure_rate() - 0.2).abs() < 1e-9);
        assert_eq!(m.observation_count(), 10);
        assert!((m.success_rate() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_tracks_contexts_and_latency() {
        let mut m = StrategyMetrics::default();
        m.record(true, 30, "env:dev");
        m.record(true, 10, "env:prod");
        m.record(true, 20, "env:dev");
        assert_eq!(m.distinct_contexts(), 2);
        assert!((m.average_latency_ms() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_param_accessors() {
        let s = LearningStrategy::new("s", params());
        assert_eq!(s.param_u64("max_retries"), Some(3));
        assert!((s.param_f64("backoff_factor").unwrap() - 2.0).abs() < f64::EPSILON);
        assert_eq!(s.param_f64("missing"), None);
    }

    #[test]
    fn test_strategy_serde_round_trip() {
        let mut s = LearningStrategy::new("candidate", params()).with_validation(10, 0.8);
        s.metrics.record(true, 12, "default");
        let json = serde_json::to_string(&s).unwrap();
        let back: LearningStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
