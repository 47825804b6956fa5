//! The exporter boundary
//!
//! Telemetry leaves the process only through these two traits. Batches of
//! completed, sampled traces go to a [`SpanExporter`]; metric snapshots go to
//! a [`MetricExporter`] at the configured cadence. The shipped
//! implementations write JSON to stdout, to a JSON-lines file, or to memory
//! (for tests); a backend-specific exporter implements the same contract.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::span::ExecutionTrace;

/// Receives completed, sampled traces in batches
#[async_trait]
pub trait SpanExporter: Send + Sync {
    /// Export one batch of traces
    async fn export_spans(&self, traces: &[ExecutionTrace]) -> Result<()>;

    /// Exporter name for logs and health reporting
    fn name(&self) -> &str {
        "span-exporter"
    }
}

/// Receives metric snapshots at the configured cadence
#[async_trait]
pub trait MetricExporter: Send + Sync {
    /// Export one snapshot
    async fn export_metrics(&self, snapshot: &MetricsSnapshot) -> Result<()>;

    /// Exporter name for logs and health reporting
    fn name(&self) -> &str {
        "metric-exporter"
    }
}

/// Writes each trace and snapshot as a JSON line on stdout, for debugging
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutExporter;

#[async_trait]
impl SpanExporter for StdoutExporter {
    async fn export_spans(&self, traces: &[ExecutionTrace]) -> Result<()> {
        let mut out = std::io::stdout().lock();
        for trace in traces {
            let line = serde_json::to_string(trace)
                .map_err(|e| Error::SpanExportError(e.to_string()))?;
            writeln!(out, "{line}").map_err(|e| Error::SpanExportError(e.to_string()))?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

#[async_trait]
impl MetricExporter for StdoutExporter {
    async fn export_metrics(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let line = serde_json::to_string(snapshot)
            .map_err(|e| Error::MetricExportError(e.to_string()))?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}").map_err(|e| Error::MetricExportError(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

/// Appends traces as JSON lines to a file
#[derive(Debug)]
pub struct FileSpanExporter {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl FileSpanExporter {
    /// Open (or create) the file at `path` for appending
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::SpanExportError(format!("open {}: {e}", path.display())))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// The file this exporter appends to
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl SpanExporter for FileSpanExporter {
    async fn export_spans(&self, traces: &[ExecutionTrace]) -> Result<()> {
        let mut lines = String::new();
        for trace in traces {
            let line = serde_json::to_string(trace)
                .map_err(|e| Error::SpanExportError(e.to_string()))?;
            lines.push_str(&line);
            lines.push('\n');
        }
        let mut file = self.file.lock();
        file.write_all(lines.as_bytes())
            .map_err(|e| Error::SpanExportError(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Keeps exported traces and snapshots in memory, for tests
#[derive(Debug, Default)]
pub struct InMemoryExporter {
    traces: Mutex<Vec<ExecutionTrace>>,
    snapshots: Mutex<Vec<MetricsSnapshot>>,
}

impl InMemoryExporter {
    /// Create an empty exporter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All traces exported so far
    #[must_use]
    pub fn traces(&self) -> Vec<ExecutionTrace> {
        self.traces.lock().clone()
    }

    /// All metric snapshots exported so far
    #[must_use]
    pub fn snapshots(&self) -> Vec<MetricsSnapshot> {
        self.snapshots.lock().clone()
    }

    /// Find the exported trace for a correlation id
    #[must_use]
    pub fn trace_for(&self, correlation_id: &str) -> Option<ExecutionTrace> {
        self.traces
            .lock()
            .iter()
            .find(|t| t.correlation_id == correlation_id)
            .cloned()
    }

    /// Clear captured traces and snapshots
    pub fn clear(&self) {
        self.traces.lock().clear();
        self.snapshots.lock().clear();
    }
}

#[async_trait]
impl SpanExporter for InMemoryExporter {
    async fn export_spans(&self, traces: &[ExecutionTrace]) -> Result<()> {
        self.traces.lock().extend_from_slice(traces);
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[async_trait]
impl MetricExporter for InMemoryExporter {
    async fn export_metrics(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        self.snapshots.lock().push(snapshot.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

/// Spawn a background task exporting metric snapshots at a fixed cadence
///
/// The task runs until the returned handle is aborted. Export failures are
/// logged and the loop keeps going.
pub fn spawn_metric_export_loop(
    registry: Arc<MetricsRegistry>,
    exporter: Arc<dyn MetricExporter>,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so the first export
        // happens one full interval in
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snapshot = registry.snapshot();
            if let Err(e) = exporter.export_metrics(&snapshot).await {
                tracing::warn!(exporter = exporter.name(), error = %e, "metric export failed");
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sampling::{SampleVerdict, SamplingDecision};

    fn sample_trace(correlation_id: &str) -> ExecutionTrace {
        ExecutionTrace {
            correlation_id: correlation_id.to_string(),
            workflow_id: None,
            decision: SamplingDecision::new(SampleVerdict::Sample, "base-rate", 1.0),
            spans: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_exporter_captures_traces() {
        let exporter = InMemoryExporter::new();
        exporter
            .export_spans(&[sample_trace("a"), sample_trace("b")])
            .await
            .unwrap();
        assert_eq!(exporter.traces().len(), 2);
        assert!(exporter.trace_for("a").is_some());
        assert!(exporter.trace_for("missing").is_none());
    }

    #[tokio::test]
    async fn test_in_memory_exporter_clear() {
        let exporter = InMemoryExporter::new();
        exporter.export_spans(&[sample_trace("a")]).await.unwrap();
        exporter.clear();
        assert!(exporter.traces().is_empty());
    }

    #[tokio::test]
    async fn test_file_exporter_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traces.jsonl");
        let exporter = FileSpanExporter::create(&path).unwrap();

        exporter
            .export_spans(&[sample_trace("a"), sample_trace("b")])
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: ExecutionTrace = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.correlation_id, "a");
    }

    #[tokio::test]
    async fn test_metric_export_loop_exports_on_cadence() {
        tokio::time::pause();
        let registry = Arc::new(MetricsRegistry::new());
        registry.increment_counter("calls_total", &[], 1);
        let exporter = Arc::new(InMemoryExporter::new());

        let handle = spawn_metric_export_loop(
            Arc::clone(&registry),
            exporter.clone() as Arc<dyn MetricExporter>,
            std::time::Duration::from_secs(10),
        );

        // Let the loop task register its timer before moving the clock
        tokio::task::yield_now().await;
        tokio::time::advance(std::time::Duration::from_secs(25)).await;
        tokio::task::yield_now().await;
        handle.abort();

        assert!(!exporter.snapshots().is_empty());
    }
}
