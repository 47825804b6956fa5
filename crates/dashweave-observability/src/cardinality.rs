//! Cardinality control for metric labels
//!
//! Every label dimension is capped at a configured number of distinct values.
//! A value past the cap is either replaced by a stable hash bucket or folded
//! into a single overflow value, and either way the occurrence is counted and
//! surfaced through the health snapshot. Label sets never grow without bound.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Label value emitted when an overflowing value is dropped rather than hashed
pub const OVERFLOW_LABEL: &str = "__overflow__";

/// How an incoming label value was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelResolution {
    /// The value was under the limit and kept as-is
    Kept(String),
    /// The value was hash-bucketed into one of the existing slots
    Bucketed(String),
    /// The value was folded into the overflow bucket
    Overflowed,
}

impl LabelResolution {
    /// The label value to emit
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Kept(v) | Self::Bucketed(v) => v,
            Self::Overflowed => OVERFLOW_LABEL,
        }
    }
}

/// Tracks distinct values per (metric, label) dimension and resolves overflow
#[derive(Debug, Default)]
pub struct CardinalityLimiter {
    seen: DashMap<(String, String), HashSet<String>>,
    bucketed_total: AtomicU64,
    dropped_total: AtomicU64,
}

impl CardinalityLimiter {
    /// Create an empty limiter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a label value for a metric, respecting the limit
    ///
    /// `hash_high_cardinality` selects the overflow strategy: hash-bucket the
    /// value modulo the limit, or fold it into [`OVERFLOW_LABEL`].
    pub fn resolve(
        &self,
        metric: &str,
        label: &str,
        value: &str,
        max_label_values: usize,
        hash_high_cardinality: bool,
    ) -> LabelResolution {
        let key = (metric.to_string(), label.to_string());
        let mut seen = self.seen.entry(key).or_default();
        if seen.contains(value) {
            return LabelResolution::Kept(value.to_string());
        }
        if seen.len() < max_label_values {
            seen.insert(value.to_string());
            return LabelResolution::Kept(value.to_string());
        }
        if hash_high_cardinality {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            let bucket = format!("bucket_{}", hasher.finish() as usize % max_label_values);
            self.bucketed_total.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(metric, label, "label value hash-bucketed past cardinality limit");
            LabelResolution::Bucketed(bucket)
        } else {
            self.dropped_total.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(metric, label, "label value dropped past cardinality limit");
            LabelResolution::Overflowed
        }
    }

    /// Distinct kept values for one (metric, label) dimension
    #[must_use]
    pub fn distinct_values(&self, metric: &str, label: &str) -> usize {
        self.seen
            .get(&(metric.to_string(), label.to_string()))
            .map_or(0, |s| s.len())
    }

    /// Total distinct label tuples tracked across all metrics
    #[must_use]
    pub fn total_distinct_values(&self) -> usize {
        self.seen.iter().map(|entry| entry.value().len()).sum()
    }

    /// How many values were hash-bucketed so far
    #[must_use]
    pub fn bucketed_count(&self) -> u64 {
        self.bucketed_total.load(Ordering::Relaxed)
    }

    /// How many values were dropped into the overflow bucket so far
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    /// Forget all tracked values and counters
    pub fn reset(&self) {
        self.seen.clear();
        self.bucketed_total.store(0, Ordering::Relaxed);
        self.dropped_total.store(0, Ordering::Relaxed);
    }
}
