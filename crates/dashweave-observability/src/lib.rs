//! `DashWeave` Observability
//!
//! Sampling, metric collection with bounded cardinality, trace collection,
//! and health reporting for `DashWeave` workflow executions.
//!
//! The subsystem is configured once per process with an environment-keyed
//! [`ObservabilityConfig`]; workflow instrumentation then feeds the global
//! [`TraceCollector`] and [`MetricsRegistry`], and telemetry leaves the
//! process only through the [`SpanExporter`] / [`MetricExporter`] boundary.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dashweave_observability::{
//!     install_config, ObservabilityConfig, StdoutExporter, TraceCollector,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     // Configure for the current deployment environment
//!     install_config(ObservabilityConfig::from_env().with_service_name("my-workflows"));
//!
//!     // Route sampled traces to stdout
//!     TraceCollector::global().set_span_exporter(Arc::new(StdoutExporter));
//!
//!     // Run workflows; traces export at batch boundaries
//! }
//! ```

pub mod cardinality;
pub mod collector;
pub mod config;
pub mod env;
pub mod error;
pub mod exporter;
pub mod health;
pub mod metrics;
pub mod sampling;
pub mod span;

#[cfg(feature = "health-server")]
pub mod health_server;

pub use cardinality::{CardinalityLimiter, LabelResolution, OVERFLOW_LABEL};
pub use collector::{SpanGuard, TraceCollector, DURATION_METRIC, INVOCATIONS_METRIC};
pub use config::{
    current_config, install_config, Environment, MetricsConfig, ObservabilityConfig,
    SamplingConfig, SpanLogLevel, StorageConfig, TracingConfig,
};
pub use error::{Error, Result};
pub use exporter::{
    spawn_metric_export_loop, FileSpanExporter, InMemoryExporter, MetricExporter, SpanExporter,
    StdoutExporter,
};
pub use health::{
    health_snapshot, health_snapshot_with, HealthSnapshot, HealthState, MetricsStatus,
    SamplingStatus, TracingStatus,
};
pub use metrics::{CounterSample, HistogramSample, MetricsRegistry, MetricsSnapshot};
pub use sampling::{
    tail_promote, AdaptiveController, CompositeSampler, RateAdjustment, SampleVerdict,
    SamplingDecision,
};
pub use span::{ExecutionTrace, SpanEvent, SpanRecord, SpanStatus};
