//! In-process metric collection with bounded label cardinality
//!
//! Counters and duration histograms keyed by (name, label set). Every label
//! value passes through the [`CardinalityLimiter`] before it becomes part of
//! a series key, so the registry can never accumulate unbounded series.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::cardinality::CardinalityLimiter;
use crate::config::current_config;

/// Histogram bucket upper bounds, in milliseconds
const DURATION_BUCKETS_MS: [f64; 12] = [
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0,
];

type SeriesKey = (String, Vec<(String, String)>);

#[derive(Debug, Clone)]
struct HistogramState {
    count: u64,
    sum: f64,
    bucket_counts: [u64; DURATION_BUCKETS_MS.len()],
}

impl HistogramState {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            bucket_counts: [0; DURATION_BUCKETS_MS.len()],
        }
    }

    fn observe(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        for (i, bound) in DURATION_BUCKETS_MS.iter().enumerate() {
            if value <= *bound {
                self.bucket_counts[i] += 1;
            }
        }
    }
}

/// One counter series in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterSample {
    /// Metric name
    pub name: String,
    /// Resolved label set
    pub labels: Vec<(String, String)>,
    /// Current value
    pub value: u64,
}

/// One histogram series in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSample {
    /// Metric name
    pub name: String,
    /// Resolved label set
    pub labels: Vec<(String, String)>,
    /// Observation count
    pub count: u64,
    /// Sum of observed values
    pub sum: f64,
    /// Cumulative counts per bucket bound
    pub buckets: Vec<(f64, u64)>,
}

/// Point-in-time view of every series in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// When the snapshot was taken
    pub generated_at: DateTime<Utc>,
    /// All counter series
    pub counters: Vec<CounterSample>,
    /// All histogram series
    pub histograms: Vec<HistogramSample>,
}

/// Registry of counters and histograms with cardinality-limited labels
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    limiter: CardinalityLimiter,
    counters: DashMap<SeriesKey, u64>,
    histograms: DashMap<SeriesKey, HistogramState>,
}

impl MetricsRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-global registry
    #[must_use]
    pub fn global() -> Arc<MetricsRegistry> {
        static GLOBAL: OnceLock<Arc<MetricsRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(MetricsRegistry::new())))
    }

    fn resolve_labels(&self, metric: &str, labels: &[(&str, &str)]) -> Vec<(String, String)> {
        let config = current_config();
        labels
            .iter()
            .map(|(k, v)| {
                let resolved = self.limiter.resolve(
                    metric,
                    k,
                    v,
                    config.metrics.max_label_values,
                    config.metrics.hash_high_cardinality,
                );
                ((*k).to_string(), resolved.value().to_string())
            })
            .collect()
    }

    /// Add to a counter series
    pub fn increment_counter(&self, name: &str, labels: &[(&str, &str)], delta: u64) {
        let key = (name.to_string(), self.resolve_labels(name, labels));
        *self.counters.entry(key).or_insert(0) += delta;
    }

    /// Record a duration observation, in milliseconds
    pub fn observe_duration_ms(&self, name: &str, labels: &[(&str, &str)], value_ms: f64) {
        let key = (name.to_string(), self.resolve_labels(name, labels));
        self.histograms
            .entry(key)
            .or_insert_with(HistogramState::new)
            .observe(value_ms);
    }

    /// Current value of a counter series, 0 if it does not exist
    #[must_use]
    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = (
            name.to_string(),
            labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        );
        self.counters.get(&key).map_or(0, |v| *v)
    }

    /// Number of live series for a metric name
    #[must_use]
    pub fn series_count(&self, name: &str) -> usize {
        self.counters.iter().filter(|e| e.key().0 == name).count()
            + self.histograms.iter().filter(|e| e.key().0 == name).count()
    }

    /// The cardinality limiter backing this registry
    #[must_use]
    pub fn limiter(&self) -> &CardinalityLimiter {
        &self.limiter
    }

    /// Take a point-in-time snapshot of all series
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut counters: Vec<CounterSample> = self
            .counters
            .iter()
            .map(|entry| CounterSample {
                name: entry.key().0.clone(),
                labels: entry.key().1.clone(),
                value: *entry.value(),
            })
            .collect();
        counters.sort_by(|a, b| (&a.name, &a.labels).cmp(&(&b.name, &b.labels)));

        let mut histograms: Vec<HistogramSample> = self
            .histograms
            .iter()
            .map(|entry| HistogramSample {
                name: entry.key().0.clone(),
                labels: entry.key().1.clone(),
                count: entry.value().count,
                sum: entry.value().sum,
                buckets: DURATION_BUCKETS_MS
                    .iter()
                    .copied()
                    .zip(entry.value().bucket_counts.iter().copied())
                    .collect(),
            })
            .collect();
        histograms.sort_by(|a, b| (&a.name, &a.labels).cmp(&(&b.name, &b.labels)));

        MetricsSnapshot {
            generated_at: Utc::now(),
            counters,
            histograms,
        }
    }

    /// Clear every series and the cardinality state
    pub fn reset(&self) {
        self.counters.clear();
        self.histograms.clear();
        self.limiter.reset();
    }
}
