//! Per-execution trace collection
//!
//! The collector tracks every in-flight workflow execution by correlation id.
//! The first span seen for a correlation id draws the head sampling decision
//! (exactly once per trace); spans buffer in memory until the root span
//! closes, at which point the tail pass may promote the decision and the
//! trace is queued for batch export.
//!
//! Span lifecycles are guard-based: [`SpanGuard`] records a `cancelled` span
//! if it is dropped before either completion method is called, which is
//! exactly what happens when a future is dropped by a timeout or a sibling
//! failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::config::current_config;
use crate::error::Result;
use crate::exporter::SpanExporter;
use crate::metrics::MetricsRegistry;
use crate::sampling::{tail_promote, CompositeSampler, SampleVerdict, SamplingDecision};
use crate::span::{ExecutionTrace, SpanEvent, SpanRecord, SpanStatus};

/// Metric names emitted per primitive execution
pub const INVOCATIONS_METRIC: &str = "workflow_invocations_total";
/// Duration histogram name
pub const DURATION_METRIC: &str = "workflow_duration_ms";

#[derive(Debug)]
struct OpenSpan {
    parent_span_id: Option<String>,
    primitive_name: String,
    workflow_id: Option<String>,
    input_summary: String,
    started_at: DateTime<Utc>,
    start: Instant,
    events: Vec<SpanEvent>,
}

#[derive(Debug)]
struct ActiveTrace {
    decision: SamplingDecision,
    workflow_id: Option<String>,
    completed: Vec<SpanRecord>,
    open: HashMap<String, OpenSpan>,
}

/// Collects spans per correlation id and exports finished traces in batches
pub struct TraceCollector {
    sampler: CompositeSampler,
    active: DashMap<String, ActiveTrace>,
    pending: Mutex<Vec<ExecutionTrace>>,
    span_exporter: RwLock<Option<Arc<dyn SpanExporter>>>,
    last_export_at: Mutex<Option<DateTime<Utc>>>,
    export_failing_since: Mutex<Option<Instant>>,
    exported_traces: AtomicU64,
    dropped_traces: AtomicU64,
}

impl std::fmt::Debug for TraceCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceCollector")
            .field("active_traces", &self.active.len())
            .field("queue_depth", &self.pending.lock().len())
            .finish()
    }
}

impl TraceCollector {
    /// Create a collector whose sampler starts from the current config
    #[must_use]
    pub fn new() -> Self {
        Self {
            sampler: CompositeSampler::new(&current_config()),
            active: DashMap::new(),
            pending: Mutex::new(Vec::new()),
            span_exporter: RwLock::new(None),
            last_export_at: Mutex::new(None),
            export_failing_since: Mutex::new(None),
            exported_traces: AtomicU64::new(0),
            dropped_traces: AtomicU64::new(0),
        }
    }

    /// The process-global collector
    #[must_use]
    pub fn global() -> Arc<TraceCollector> {
        static GLOBAL: OnceLock<Arc<TraceCollector>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TraceCollector::new())))
    }

    /// Install the span exporter traces are flushed to
    pub fn set_span_exporter(&self, exporter: Arc<dyn SpanExporter>) {
        *self.span_exporter.write() = Some(exporter);
    }

    /// The sampler (and its adaptive controller)
    #[must_use]
    pub fn sampler(&self) -> &CompositeSampler {
        &self.sampler
    }

    /// Begin a span; draws the head decision if this correlation id is new
    ///
    /// The receiver is consumed; call as
    /// `Arc::clone(&collector).start_span(...)` to keep your handle.
    #[must_use]
    pub fn start_span(
        self: Arc<Self>,
        correlation_id: &str,
        workflow_id: Option<&str>,
        parent_span_id: Option<&str>,
        primitive_name: &str,
        input_summary: String,
    ) -> SpanGuard {
        let config = current_config();
        let span_id = uuid::Uuid::new_v4().to_string();

        let mut entry = self
            .active
            .entry(correlation_id.to_string())
            .or_insert_with(|| {
                let decision = self.sampler.head_decision(correlation_id, &config);
                tracing::trace!(
                    correlation_id,
                    decision = ?decision.decision,
                    reason = %decision.reason,
                    "head sampling decision"
                );
                ActiveTrace {
                    decision,
                    workflow_id: workflow_id.map(str::to_string),
                    completed: Vec::new(),
                    open: HashMap::new(),
                }
            });
        entry.open.insert(
            span_id.clone(),
            OpenSpan {
                parent_span_id: parent_span_id.map(str::to_string),
                primitive_name: primitive_name.to_string(),
                workflow_id: workflow_id.map(str::to_string),
                input_summary,
                started_at: Utc::now(),
                start: Instant::now(),
                events: Vec::new(),
            },
        );
        drop(entry);

        SpanGuard {
            collector: self,
            correlation_id: correlation_id.to_string(),
            span_id,
            completed: false,
        }
    }

    /// The sampling decision for an in-flight trace, if any
    #[must_use]
    pub fn decision_for(&self, correlation_id: &str) -> Option<SamplingDecision> {
        self.active.get(correlation_id).map(|t| t.decision.clone())
    }

    /// Attach an event to an open span (no-op if the span already closed)
    pub fn add_span_event(
        &self,
        correlation_id: &str,
        span_id: &str,
        name: &str,
        attributes: Vec<(String, String)>,
    ) {
        if let Some(mut trace) = self.active.get_mut(correlation_id) {
            if let Some(open) = trace.open.get_mut(span_id) {
                open.events.push(SpanEvent::new(name, attributes));
            }
        }
    }

    /// Close one span; returns true when a full export batch is now pending
    fn end_span(
        &self,
        correlation_id: &str,
        span_id: &str,
        status: SpanStatus,
        output_summary: String,
        error_kind: Option<String>,
    ) -> bool {
        let Some(mut trace) = self.active.get_mut(correlation_id) else {
            return false;
        };
        let Some(open) = trace.open.remove(span_id) else {
            return false;
        };

        let duration_ms = open.start.elapsed().as_millis() as u64;
        MetricsRegistry::global().increment_counter(
            INVOCATIONS_METRIC,
            &[
                ("primitive", &open.primitive_name),
                ("status", status.as_str()),
            ],
            1,
        );
        MetricsRegistry::global().observe_duration_ms(
            DURATION_METRIC,
            &[("primitive", &open.primitive_name)],
            duration_ms as f64,
        );

        let is_root = open.parent_span_id.is_none();
        if trace.decision.decision != SampleVerdict::Drop {
            trace.completed.push(SpanRecord {
                span_id: span_id.to_string(),
                parent_span_id: open.parent_span_id,
                primitive_name: open.primitive_name,
                correlation_id: correlation_id.to_string(),
                workflow_id: open.workflow_id,
                input_summary: open.input_summary,
                output_summary,
                duration_ms,
                status,
                error_kind,
                events: open.events,
                started_at: open.started_at,
            });
        }

        let trace_finished = trace.open.is_empty() && is_root;
        drop(trace);

        if trace_finished {
            self.finalize_trace(correlation_id)
        } else {
            false
        }
    }

    /// Returns true when a full export batch is now pending
    fn finalize_trace(&self, correlation_id: &str) -> bool {
        let Some((_, finished)) = self.active.remove(correlation_id) else {
            return false;
        };
        let config = current_config();

        let has_failure = finished
            .completed
            .iter()
            .any(|s| s.status == SpanStatus::Failure);
        let max_duration = finished
            .completed
            .iter()
            .map(|s| s.duration_ms)
            .max()
            .unwrap_or(0);
        let decision = tail_promote(&finished.decision, has_failure, max_duration, &config);

        if decision.decision != SampleVerdict::Sample {
            self.dropped_traces.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let trace = ExecutionTrace {
            correlation_id: correlation_id.to_string(),
            workflow_id: finished.workflow_id,
            decision,
            spans: finished.completed,
        };

        let mut pending = self.pending.lock();
        pending.push(trace);
        pending.len() >= config.tracing.batch_size
    }

    /// Export all pending traces now
    ///
    /// Returns the number of traces exported. Failures leave the batch queued
    /// for the next flush.
    pub async fn flush(&self) -> Result<usize> {
        let exporter = self.span_exporter.read().clone();
        let Some(exporter) = exporter else {
            return Ok(0);
        };
        let batch: Vec<ExecutionTrace> = {
            let mut pending = self.pending.lock();
            std::mem::take(&mut *pending)
        };
        if batch.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();
        match exporter.export_spans(&batch).await {
            Ok(()) => {
                let count = batch.len();
                self.exported_traces.fetch_add(count as u64, Ordering::Relaxed);
                let elapsed = started.elapsed();
                let previous = {
                    let mut last = self.last_export_at.lock();
                    last.replace(Utc::now())
                };
                *self.export_failing_since.lock() = None;

                // Estimate telemetry overhead from the export duty cycle and
                // feed the adaptive controller
                if let Some(previous) = previous {
                    let gap = (Utc::now() - previous).num_milliseconds().max(1) as f64;
                    let observed = (elapsed.as_millis() as f64 / gap).clamp(0.0, 1.0);
                    self.sampler
                        .controller()
                        .observe_overhead(observed, &current_config());
                }
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(exporter = exporter.name(), error = %e, "span export failed");
                let mut failing = self.export_failing_since.lock();
                failing.get_or_insert_with(Instant::now);
                drop(failing);
                let mut pending = self.pending.lock();
                let mut requeued = batch;
                requeued.extend(std::mem::take(&mut *pending));
                *pending = requeued;
                Err(e)
            }
        }
    }

    /// Traces waiting in the export queue
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.pending.lock().len()
    }

    /// In-flight (unfinished) traces
    #[must_use]
    pub fn active_trace_count(&self) -> usize {
        self.active.len()
    }

    /// Timestamp of the last successful export
    #[must_use]
    pub fn last_export_at(&self) -> Option<DateTime<Utc>> {
        *self.last_export_at.lock()
    }

    /// How long the exporter has been failing continuously, if it is
    #[must_use]
    pub fn export_failing_for(&self) -> Option<std::time::Duration> {
        self.export_failing_since.lock().map(|t| t.elapsed())
    }

    /// Total traces exported since startup
    #[must_use]
    pub fn exported_trace_count(&self) -> u64 {
        self.exported_traces.load(Ordering::Relaxed)
    }

    /// Total traces discarded by sampling since startup
    #[must_use]
    pub fn dropped_trace_count(&self) -> u64 {
        self.dropped_traces.load(Ordering::Relaxed)
    }
}

impl Default for TraceCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Open-span handle; completes the span on success/failure, or records a
/// cancelled span when dropped mid-flight
#[must_use = "dropping the guard records the span as cancelled"]
pub struct SpanGuard {
    collector: Arc<TraceCollector>,
    correlation_id: String,
    span_id: String,
    completed: bool,
}

impl SpanGuard {
    /// This span's id, for parent linkage and event attachment
    #[must_use]
    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    /// Attach an event to this span while it is open
    pub fn add_event(&self, name: &str, attributes: Vec<(String, String)>) {
        self.collector
            .add_span_event(&self.correlation_id, &self.span_id, name, attributes);
    }

    fn close(&mut self, status: SpanStatus, output_summary: String, error_kind: Option<String>) {
        self.completed = true;
        let batch_ready = self.collector.end_span(
            &self.correlation_id,
            &self.span_id,
            status,
            output_summary,
            error_kind,
        );
        // Closing can happen inside Drop, where awaiting is impossible;
        // flush a full batch on a task when a runtime is available.
        if batch_ready {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let collector = Arc::clone(&self.collector);
                handle.spawn(async move {
                    let _ = collector.flush().await;
                });
            }
        }
    }

    /// Close the span as successful
    pub fn complete_success(mut self, output_summary: String) {
        self.close(SpanStatus::Success, output_summary, None);
    }

    /// Close the span as failed, recording the error kind
    pub fn complete_failure(mut self, error_kind: &str) {
        self.close(
            SpanStatus::Failure,
            String::new(),
            Some(error_kind.to_string()),
        );
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.close(SpanStatus::Cancelled, String::new(), None);
        }
    }
}
