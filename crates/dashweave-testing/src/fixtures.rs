//! Test fixtures for observability-aware workflow tests
//!
//! Tests that exercise instrumentation share process-global state (the
//! installed config, the trace collector, the metrics registry). The
//! [`test_observability`] fixture serializes such tests behind a global lock
//! and gives each one a fresh in-memory exporter and a sampling-everything
//! config, so trace assertions are deterministic.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use dashweave_observability::{
    install_config, ExecutionTrace, InMemoryExporter, MetricsRegistry, ObservabilityConfig,
    SpanExporter, TraceCollector,
};

fn observability_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// A test-scoped observability setup
///
/// Holds the global test lock for its lifetime: tests using this fixture run
/// one at a time. Created by [`test_observability`].
pub struct TestObservability {
    collector: Arc<TraceCollector>,
    exporter: Arc<InMemoryExporter>,
    _guard: MutexGuard<'static, ()>,
}

/// Install a test-scoped observability configuration
///
/// Sampling rate 1.0, batch size 1, and a fresh in-memory exporter; the
/// metrics registry is reset. Timing-sensitive tests can additionally pause
/// time with `tokio::time::pause()`.
pub async fn test_observability() -> TestObservability {
    let guard = observability_lock()
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    install_config(
        ObservabilityConfig::new()
            .with_service_name("dashweave-test")
            .with_sampling_rate(1.0)
            .with_batch_size(1),
    );

    let collector = TraceCollector::global();
    let exporter = Arc::new(InMemoryExporter::new());
    collector.set_span_exporter(Arc::clone(&exporter) as Arc<dyn SpanExporter>);
    // Drain anything a previous test left queued, then start clean
    let _ = collector.flush().await;
    exporter.clear();
    MetricsRegistry::global().reset();

    TestObservability {
        collector,
        exporter,
        _guard: guard,
    }
}

impl TestObservability {
    /// The global collector, with this fixture's exporter installed
    #[must_use]
    pub fn collector(&self) -> &Arc<TraceCollector> {
        &self.collector
    }

    /// The in-memory exporter capturing this test's traces
    #[must_use]
    pub fn exporter(&self) -> &Arc<InMemoryExporter> {
        &self.exporter
    }

    /// Flush pending traces and return everything exported so far
    pub async fn drain(&self) -> Vec<ExecutionTrace> {
        let _ = self.collector.flush().await;
        self.exporter.traces()
    }

    /// Flush and return the trace for one correlation id
    pub async fn trace_for(&self, correlation_id: &str) -> Option<ExecutionTrace> {
        let _ = self.collector.flush().await;
        self.exporter.trace_for(correlation_id)
    }
}
