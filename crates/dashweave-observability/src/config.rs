//! Environment-keyed configuration for workflow observability
//!
//! A single [`ObservabilityConfig`] aggregates the sampling, metrics, tracing,
//! and storage settings. One config is installed process-wide with
//! [`install_config`]; every sampler, collector, and instrumented primitive
//! reads the current config through [`current_config`].

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::env;

/// Deployment environment, selecting recommended defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development: sample everything, export eagerly
    #[default]
    Development,
    /// Pre-production: half-rate head sampling with tail overrides
    Staging,
    /// Production: low head rate, adaptive controller enabled
    Production,
}

impl Environment {
    /// Resolve the environment from `DASHWEAVE_ENV`, defaulting to development
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(&env::env_string_or_default(env::DASHWEAVE_ENV, "development"))
    }

    /// Parse an environment name, defaulting to development for unknown values
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        }
    }

    /// Stable lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

/// Log level for the start/end records the instrumentation layer emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanLogLevel {
    /// No start/end records
    Off,
    /// `tracing::trace!`
    Trace,
    /// `tracing::debug!`
    #[default]
    Debug,
    /// `tracing::info!`
    Info,
}

/// Head/tail/adaptive sampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Base probability a trace is sampled at workflow entry (0.0 to 1.0)
    pub default_rate: f64,
    /// Promote any trace containing a failed span to SAMPLE at workflow exit
    pub always_sample_errors: bool,
    /// Promote any trace whose slowest span exceeds the threshold
    pub always_sample_slow: bool,
    /// Duration above which a span counts as slow, in milliseconds
    pub slow_threshold_ms: u64,
    /// Enable the adaptive head-rate controller
    pub adaptive_enabled: bool,
    /// Target fraction of process overhead attributable to telemetry
    pub adaptive_target_overhead: f64,
    /// Lower clamp bound for the adaptive rate
    pub adaptive_min_rate: f64,
    /// Upper clamp bound for the adaptive rate
    pub adaptive_max_rate: f64,
    /// Minimum seconds between adaptive rate adjustments
    pub adjustment_interval_seconds: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            default_rate: 1.0,
            always_sample_errors: true,
            always_sample_slow: true,
            slow_threshold_ms: 5_000,
            adaptive_enabled: false,
            adaptive_target_overhead: 0.05,
            adaptive_min_rate: 0.01,
            adaptive_max_rate: 1.0,
            adjustment_interval_seconds: 30,
        }
    }
}

/// Metric collection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Per-label cardinality limit (distinct values per label dimension)
    pub max_label_values: usize,
    /// Hash-bucket values past the limit instead of dropping them
    pub hash_high_cardinality: bool,
    /// Batch export cadence for metric snapshots, in seconds
    pub export_interval_seconds: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_label_values: 100,
            hash_high_cardinality: true,
            export_interval_seconds: 60,
        }
    }
}

/// Trace collection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Span export batch size
    pub batch_size: usize,
    /// Level of the start/end log records around each primitive execution
    pub span_log_level: SpanLogLevel,
    /// Truncation limit for input/output summaries, in characters
    pub summary_max_chars: usize,
    /// Seconds of continuous export failure before the tracing subsystem
    /// reports unhealthy
    pub exporter_failure_window_seconds: u64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            span_log_level: SpanLogLevel::Debug,
            summary_max_chars: 256,
            exporter_failure_window_seconds: 300,
        }
    }
}

/// Retention and compression guidance passed through to backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Recommended trace retention, in days
    pub trace_ttl_days: u32,
    /// Recommended metric retention, in days
    pub metric_ttl_days: u32,
    /// Recommend compressing exported payloads
    pub compression_enabled: bool,
    /// Compression level guidance (1-9)
    pub compression_level: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            trace_ttl_days: 7,
            metric_ttl_days: 30,
            compression_enabled: false,
            compression_level: 3,
        }
    }
}

/// Top-level observability configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Service name attached to exported telemetry
    pub service_name: String,
    /// Service version attached to exported telemetry
    pub service_version: Option<String>,
    /// Deployment environment this config was built for
    pub environment: Environment,
    /// Sampling settings
    pub sampling: SamplingConfig,
    /// Metric settings
    pub metrics: MetricsConfig,
    /// Trace settings
    pub tracing: TracingConfig,
    /// Storage guidance
    pub storage: StorageConfig,
}

impl ObservabilityConfig {
    /// Create a configuration with development defaults
    ///
    /// # Example
    ///
    /// ```rust
    /// use dashweave_observability::ObservabilityConfig;
    ///
    /// let config = ObservabilityConfig::new()
    ///     .with_service_name("my-workflow")
    ///     .with_sampling_rate(0.25);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            service_name: env::env_string_or_default(env::DASHWEAVE_SERVICE_NAME, "dashweave"),
            service_version: env::env_string(env::DASHWEAVE_SERVICE_VERSION),
            environment: Environment::Development,
            sampling: SamplingConfig::default(),
            metrics: MetricsConfig::default(),
            tracing: TracingConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    /// Recommended defaults for a deployment environment
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        let mut config = Self::new();
        config.environment = environment;
        match environment {
            Environment::Development => {
                config.sampling.default_rate = 1.0;
                config.sampling.adaptive_enabled = false;
                config.metrics.export_interval_seconds = 10;
                config.storage.trace_ttl_days = 1;
            }
            Environment::Staging => {
                config.sampling.default_rate = 0.5;
                config.sampling.adaptive_enabled = false;
                config.sampling.slow_threshold_ms = 2_000;
                config.storage.trace_ttl_days = 3;
            }
            Environment::Production => {
                config.sampling.default_rate = 0.1;
                config.sampling.adaptive_enabled = true;
                config.sampling.adaptive_max_rate = 0.5;
                config.sampling.slow_threshold_ms = 1_000;
                config.tracing.span_log_level = SpanLogLevel::Off;
                config.storage.trace_ttl_days = 7;
                config.storage.compression_enabled = true;
            }
        }
        config
    }

    /// Recommended defaults for the environment named by `DASHWEAVE_ENV`
    #[must_use]
    pub fn from_env() -> Self {
        Self::for_environment(Environment::from_env())
    }

    /// Set the service name
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set the service version
    #[must_use]
    pub fn with_service_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = Some(version.into());
        self
    }

    /// Set the head sampling rate, clamped to [0.0, 1.0]
    #[must_use]
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling.default_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Enable or disable the adaptive sampling controller
    #[must_use]
    pub fn with_adaptive_sampling(mut self, enabled: bool) -> Self {
        self.sampling.adaptive_enabled = enabled;
        self
    }

    /// Set the slow-span threshold used for tail promotion
    #[must_use]
    pub fn with_slow_threshold_ms(mut self, threshold_ms: u64) -> Self {
        self.sampling.slow_threshold_ms = threshold_ms;
        self
    }

    /// Set the per-label cardinality limit
    #[must_use]
    pub fn with_max_label_values(mut self, limit: usize) -> Self {
        self.metrics.max_label_values = limit.max(1);
        self
    }

    /// Set the span-export batch size
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.tracing.batch_size = batch_size.max(1);
        self
    }

    /// Set the level of the instrumentation start/end log records
    #[must_use]
    pub fn with_span_log_level(mut self, level: SpanLogLevel) -> Self {
        self.tracing.span_log_level = level;
        self
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Process-global config
// =============================================================================

static CONFIG: OnceLock<RwLock<Arc<ObservabilityConfig>>> = OnceLock::new();

fn config_cell() -> &'static RwLock<Arc<ObservabilityConfig>> {
    CONFIG.get_or_init(|| RwLock::new(Arc::new(ObservabilityConfig::from_env())))
}

/// Install a process-global observability configuration
///
/// Samplers and collectors pick the new config up on their next decision;
/// in-flight traces keep the decision they were started with.
pub fn install_config(config: ObservabilityConfig) {
    *config_cell().write() = Arc::new(config);
}

/// The currently-installed process-global configuration
#[must_use]
pub fn current_config() -> Arc<ObservabilityConfig> {
    Arc::clone(&config_cell().read())
}
