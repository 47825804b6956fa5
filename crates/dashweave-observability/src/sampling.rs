//! Head, tail, and adaptive trace sampling
//!
//! The head decision is made once per workflow execution, at trace start,
//! from a draw keyed deterministically by the correlation id. The tail pass
//! runs at trace end and can only promote a decision, never demote it. The
//! adaptive controller nudges the head rate toward a target telemetry
//! overhead, clamped and rate-limited.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::config::ObservabilityConfig;

/// The three possible sampling outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleVerdict {
    /// Export this trace
    Sample,
    /// Discard this trace without keeping spans
    Drop,
    /// Keep spans in memory for possible tail-based promotion
    RecordOnly,
}

/// The decision made for one trace, with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingDecision {
    /// Sample, drop, or record-only
    pub decision: SampleVerdict,
    /// Why: `base-rate`, `forced-error`, `forced-slow`, `adaptive-throttle`
    pub reason: String,
    /// The effective head rate when the decision was made
    pub rate_at_decision: f64,
}

impl SamplingDecision {
    /// Create a decision record
    #[must_use]
    pub fn new(decision: SampleVerdict, reason: impl Into<String>, rate: f64) -> Self {
        Self {
            decision,
            reason: reason.into(),
            rate_at_decision: rate,
        }
    }

    /// True when the trace should be exported
    #[must_use]
    pub fn is_sampled(&self) -> bool {
        self.decision == SampleVerdict::Sample
    }
}

/// Uniform draw in [0.0, 1.0) keyed by the correlation id
///
/// The same correlation id always produces the same draw, so a trace can
/// never receive two different head decisions.
#[must_use]
fn keyed_draw(correlation_id: &str) -> f64 {
    let mut hasher = DefaultHasher::new();
    correlation_id.hash(&mut hasher);
    // 53 bits of hash gives an exact f64 in [0, 1)
    let bits = hasher.finish() >> 11;
    bits as f64 / (1u64 << 53) as f64
}

/// One adjustment made by the adaptive controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateAdjustment {
    /// When the adjustment happened
    pub at: DateTime<Utc>,
    /// Rate before
    pub from_rate: f64,
    /// Rate after
    pub to_rate: f64,
    /// The overhead observation that triggered it
    pub observed_overhead: f64,
}

const MAX_RECORDED_ADJUSTMENTS: usize = 32;

/// Controller that adjusts the head rate toward a target telemetry overhead
///
/// Adjustments are asymmetric: overshoot shrinks the rate proportionally to
/// the overshoot (floored at halving per step), undershoot grows it gently by
/// a fraction of the remaining headroom. At most one adjustment happens per
/// configured interval, and the rate is always clamped to the configured
/// bounds.
#[derive(Debug)]
pub struct AdaptiveController {
    current_rate: RwLock<f64>,
    last_adjustment: Mutex<Option<Instant>>,
    recent: Mutex<Vec<RateAdjustment>>,
}

impl AdaptiveController {
    /// Create a controller starting at the given rate
    #[must_use]
    pub fn new(initial_rate: f64) -> Self {
        Self {
            current_rate: RwLock::new(initial_rate.clamp(0.0, 1.0)),
            last_adjustment: Mutex::new(None),
            recent: Mutex::new(Vec::new()),
        }
    }

    /// The controller's current rate
    #[must_use]
    pub fn current_rate(&self) -> f64 {
        *self.current_rate.read()
    }

    /// Recent adjustments, newest last
    #[must_use]
    pub fn recent_adjustments(&self) -> Vec<RateAdjustment> {
        self.recent.lock().clone()
    }

    /// Feed an overhead observation (fraction of process time spent on
    /// telemetry); adjusts the rate if the adjustment interval has elapsed.
    ///
    /// Returns the adjustment if one was made.
    pub fn observe_overhead(
        &self,
        observed: f64,
        config: &ObservabilityConfig,
    ) -> Option<RateAdjustment> {
        if !config.sampling.adaptive_enabled {
            return None;
        }

        {
            let mut last = self.last_adjustment.lock();
            let interval =
                std::time::Duration::from_secs(config.sampling.adjustment_interval_seconds);
            if let Some(at) = *last {
                if at.elapsed() < interval {
                    return None;
                }
            }
            *last = Some(Instant::now());
        }

        let target = config.sampling.adaptive_target_overhead.max(f64::EPSILON);
        let from_rate = self.current_rate();
        let to_rate = if observed > target {
            // Proportional decrease, never more than halving in one step
            from_rate * (target / observed).max(0.5)
        } else if observed < target * 0.8 {
            // Gentle increase: a tenth of the remaining headroom
            from_rate + (config.sampling.adaptive_max_rate - from_rate) * 0.1
        } else {
            from_rate
        };
        let to_rate = to_rate.clamp(
            config.sampling.adaptive_min_rate,
            config.sampling.adaptive_max_rate,
        );

        *self.current_rate.write() = to_rate;

        let adjustment = RateAdjustment {
            at: Utc::now(),
            from_rate,
            to_rate,
            observed_overhead: observed,
        };
        let mut recent = self.recent.lock();
        recent.push(adjustment.clone());
        if recent.len() > MAX_RECORDED_ADJUSTMENTS {
            recent.remove(0);
        }
        tracing::debug!(
            from_rate,
            to_rate,
            observed_overhead = observed,
            "adaptive sampling rate adjusted"
        );
        Some(adjustment)
    }
}

/// The default sampler: head draw at the (possibly adaptive) rate, with
/// record-only fallthrough when a tail override could still promote the trace
#[derive(Debug)]
pub struct CompositeSampler {
    controller: AdaptiveController,
}

impl CompositeSampler {
    /// Create a sampler whose adaptive controller starts at the config's rate
    #[must_use]
    pub fn new(config: &ObservabilityConfig) -> Self {
        Self {
            controller: AdaptiveController::new(config.sampling.default_rate),
        }
    }

    /// The adaptive controller, for overhead observations and health queries
    #[must_use]
    pub fn controller(&self) -> &AdaptiveController {
        &self.controller
    }

    /// The rate the next head decision will use
    #[must_use]
    pub fn effective_rate(&self, config: &ObservabilityConfig) -> f64 {
        if config.sampling.adaptive_enabled {
            self.controller.current_rate().clamp(
                config.sampling.adaptive_min_rate,
                config.sampling.adaptive_max_rate,
            )
        } else {
            config.sampling.default_rate
        }
    }

    /// Head decision for a new trace, drawn exactly once per correlation id
    #[must_use]
    pub fn head_decision(
        &self,
        correlation_id: &str,
        config: &ObservabilityConfig,
    ) -> SamplingDecision {
        let rate = self.effective_rate(config);
        if keyed_draw(correlation_id) < rate {
            return SamplingDecision::new(SampleVerdict::Sample, "base-rate", rate);
        }
        let reason = if config.sampling.adaptive_enabled {
            "adaptive-throttle"
        } else {
            "base-rate"
        };
        if config.sampling.always_sample_errors || config.sampling.always_sample_slow {
            SamplingDecision::new(SampleVerdict::RecordOnly, reason, rate)
        } else {
            SamplingDecision::new(SampleVerdict::Drop, reason, rate)
        }
    }
}

/// Tail pass: promote a non-sampled decision when the trace failed or its
/// slowest span crossed the slow threshold. Promotion only, never demotion.
#[must_use]
pub fn tail_promote(
    decision: &SamplingDecision,
    has_failure: bool,
    max_span_duration_ms: u64,
    config: &ObservabilityConfig,
) -> SamplingDecision {
    if decision.decision == SampleVerdict::Sample {
        return decision.clone();
    }
    if config.sampling.always_sample_errors && has_failure {
        return SamplingDecision::new(
            SampleVerdict::Sample,
            "forced-error",
            decision.rate_at_decision,
        );
    }
    if config.sampling.always_sample_slow && max_span_duration_ms > config.sampling.slow_threshold_ms
    {
        return SamplingDecision::new(
            SampleVerdict::Sample,
            "forced-slow",
            decision.rate_at_decision,
        );
    }
    decision.clone()
}
