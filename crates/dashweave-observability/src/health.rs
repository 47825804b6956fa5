//! Health and status reporting for the observability subsystem
//!
//! Degraded means "still functioning with loss of fidelity" (label overflow,
//! a backed-up export queue); unhealthy means "core invariants violated or
//! the exporter unreachable beyond the configured window".

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::TraceCollector;
use crate::config::{current_config, ObservabilityConfig};
use crate::metrics::MetricsRegistry;
use crate::sampling::RateAdjustment;

/// Overall subsystem status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Everything within bounds
    Healthy,
    /// Functioning with loss of fidelity
    Degraded,
    /// Invariants violated or exporter unreachable too long
    Unhealthy,
}

/// Live sampling state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingStatus {
    /// The rate the next head decision will use
    pub effective_rate: f64,
    /// Whether the adaptive controller is enabled
    pub adaptive_enabled: bool,
    /// Clamp bounds for the adaptive rate
    pub rate_bounds: (f64, f64),
    /// Recent adaptive adjustments, newest last
    pub recent_adjustments: Vec<RateAdjustment>,
}

/// Live metric-collection state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsStatus {
    /// Distinct label values tracked across all metrics
    pub total_distinct_label_values: usize,
    /// Values hash-bucketed past the cardinality limit
    pub bucketed_label_values: u64,
    /// Values dropped into the overflow bucket
    pub dropped_label_values: u64,
}

/// Live trace-collection state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracingStatus {
    /// Traces waiting in the export queue
    pub queue_depth: usize,
    /// In-flight (unfinished) traces
    pub active_traces: usize,
    /// Timestamp of the last successful export
    pub last_export_at: Option<DateTime<Utc>>,
    /// Traces exported since startup
    pub exported_traces: u64,
    /// Traces discarded by sampling since startup
    pub dropped_traces: u64,
    /// Seconds the exporter has been failing continuously, if it is
    pub exporter_failing_seconds: Option<u64>,
}

/// Point-in-time health view of the whole subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Overall status
    pub status: HealthState,
    /// Service name from the installed config
    pub service_name: String,
    /// Environment the installed config targets
    pub environment: String,
    /// Sampling state
    pub sampling: SamplingStatus,
    /// Metric state
    pub metrics: MetricsStatus,
    /// Trace state
    pub tracing: TracingStatus,
    /// When this snapshot was taken
    pub generated_at: DateTime<Utc>,
}

/// Snapshot the process-global collector, registry, and config
#[must_use]
pub fn health_snapshot() -> HealthSnapshot {
    health_snapshot_with(
        &TraceCollector::global(),
        &MetricsRegistry::global(),
        &current_config(),
    )
}

/// Snapshot explicit instances (used by tests and embedded setups)
#[must_use]
pub fn health_snapshot_with(
    collector: &Arc<TraceCollector>,
    registry: &Arc<MetricsRegistry>,
    config: &ObservabilityConfig,
) -> HealthSnapshot {
    let effective_rate = collector.sampler().effective_rate(config);
    let sampling = SamplingStatus {
        effective_rate,
        adaptive_enabled: config.sampling.adaptive_enabled,
        rate_bounds: (
            config.sampling.adaptive_min_rate,
            config.sampling.adaptive_max_rate,
        ),
        recent_adjustments: collector.sampler().controller().recent_adjustments(),
    };
    let metrics = MetricsStatus {
        total_distinct_label_values: registry.limiter().total_distinct_values(),
        bucketed_label_values: registry.limiter().bucketed_count(),
        dropped_label_values: registry.limiter().dropped_count(),
    };
    let exporter_failing = collector.export_failing_for();
    let tracing_status = TracingStatus {
        queue_depth: collector.queue_depth(),
        active_traces: collector.active_trace_count(),
        last_export_at: collector.last_export_at(),
        exported_traces: collector.exported_trace_count(),
        dropped_traces: collector.dropped_trace_count(),
        exporter_failing_seconds: exporter_failing.map(|d| d.as_secs()),
    };

    let status = overall_status(config, &sampling, &metrics, &tracing_status);

    HealthSnapshot {
        status,
        service_name: config.service_name.clone(),
        environment: config.environment.as_str().to_string(),
        sampling,
        metrics,
        tracing: tracing_status,
        generated_at: Utc::now(),
    }
}

fn overall_status(
    config: &ObservabilityConfig,
    sampling: &SamplingStatus,
    metrics: &MetricsStatus,
    tracing_status: &TracingStatus,
) -> HealthState {
    let failure_window = config.tracing.exporter_failure_window_seconds;
    if tracing_status
        .exporter_failing_seconds
        .is_some_and(|s| s >= failure_window)
    {
        return HealthState::Unhealthy;
    }
    if config.sampling.adaptive_enabled
        && !(sampling.rate_bounds.0..=sampling.rate_bounds.1).contains(&sampling.effective_rate)
    {
        return HealthState::Unhealthy;
    }

    let overflowing = metrics.bucketed_label_values > 0 || metrics.dropped_label_values > 0;
    let queue_backed_up = tracing_status.queue_depth > config.tracing.batch_size * 2;
    if overflowing || queue_backed_up || tracing_status.exporter_failing_seconds.is_some() {
        return HealthState::Degraded;
    }

    HealthState::Healthy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (Arc<TraceCollector>, Arc<MetricsRegistry>, ObservabilityConfig) {
        (
            Arc::new(TraceCollector::new()),
            Arc::new(MetricsRegistry::new()),
            ObservabilityConfig::new(),
        )
    }

    #[test]
    fn test_fresh_subsystem_is_healthy() {
        let (collector, registry, config) = fresh();
        let snapshot = health_snapshot_with(&collector, &registry, &config);
        assert_eq!(snapshot.status, HealthState::Healthy);
        assert_eq!(snapshot.tracing.queue_depth, 0);
    }

    #[test]
    fn test_cardinality_overflow_degrades() {
        let (collector, registry, config) = fresh();
        registry
            .limiter()
            .resolve("calls", "primitive", "a", 1, false);
        registry
            .limiter()
            .resolve("calls", "primitive", "b", 1, false);
        let snapshot = health_snapshot_with(&collector, &registry, &config);
        assert_eq!(snapshot.status, HealthState::Degraded);
        assert_eq!(snapshot.metrics.dropped_label_values, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let (collector, registry, config) = fresh();
        let snapshot = health_snapshot_with(&collector, &registry, &config);
        assert!(serde_json::to_string(&snapshot).is_ok());
    }

    #[test]
    fn test_effective_rate_reported() {
        let (collector, registry, config) = fresh();
        let snapshot = health_snapshot_with(&collector, &registry, &config);
        assert!((snapshot.sampling.effective_rate - config.sampling.default_rate).abs() < 1e-9);
    }
}
