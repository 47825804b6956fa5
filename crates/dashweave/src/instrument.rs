// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The instrumentation wrapper
//!
//! [`Instrumented`] surrounds any primitive with a span, start/end log
//! records, and cardinality-limited metrics, without the wrapped primitive
//! containing a line of telemetry vocabulary. It is a one-way wrapper: it
//! holds the wrapped primitive, never the reverse.
//!
//! Parent/child span linkage travels through a reserved, additively-extended
//! context metadata key; the context seen by user code is otherwise
//! untouched. Sampling cascades from the root: the head decision drawn for
//! the correlation id governs every nested span.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use dashweave_observability::{current_config, SpanLogLevel, TraceCollector};
use tracing::Instrument;

use crate::context::WorkflowContext;
use crate::error::Result;
use crate::primitive::WorkflowPrimitive;

/// Reserved context metadata key carrying the parent span id
pub const PARENT_SPAN_KEY: &str = "telemetry.parent_span";

/// Truncate a rendering to the configured summary length
fn summarize(rendered: String, max_chars: usize) -> String {
    if rendered.chars().count() <= max_chars {
        rendered
    } else {
        let mut truncated: String = rendered.chars().take(max_chars).collect();
        truncated.push('…');
        truncated
    }
}

fn log_record(level: SpanLogLevel, primitive: &str, correlation_id: &str, phase: &str) {
    match level {
        SpanLogLevel::Off => {}
        SpanLogLevel::Trace => {
            tracing::trace!(primitive, correlation_id, "primitive {phase}");
        }
        SpanLogLevel::Debug => {
            tracing::debug!(primitive, correlation_id, "primitive {phase}");
        }
        SpanLogLevel::Info => {
            tracing::info!(primitive, correlation_id, "primitive {phase}");
        }
    }
}

/// Wraps a primitive with tracing, logging, and metric emission
///
/// Success-path output is identical to the wrapped primitive's; errors are
/// recorded on the span and re-raised with their kind unchanged.
pub struct Instrumented<P> {
    inner: P,
    collector: Arc<TraceCollector>,
}

impl<P: WorkflowPrimitive> Instrumented<P> {
    /// Wrap a primitive, reporting to the process-global collector
    #[must_use]
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            collector: TraceCollector::global(),
        }
    }

    /// Wrap a primitive, reporting to an explicit collector
    #[must_use]
    pub fn with_collector(inner: P, collector: Arc<TraceCollector>) -> Self {
        Self { inner, collector }
    }

    /// The wrapped primitive
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

/// Wrap a primitive with instrumentation (see [`Instrumented`])
pub fn instrument<P: WorkflowPrimitive>(primitive: P) -> Instrumented<P> {
    Instrumented::new(primitive)
}

#[async_trait]
impl<P> WorkflowPrimitive for Instrumented<P>
where
    P: WorkflowPrimitive,
    P::Input: Debug,
    P::Output: Debug,
{
    type Input = P::Input;
    type Output = P::Output;

    async fn execute(
        &self,
        input: Self::Input,
        context: &WorkflowContext,
    ) -> Result<Self::Output> {
        // Double-wrapping is a no-op: delegate without a second span
        if self.inner.is_instrumented() {
            return self.inner.execute(input, context).await;
        }

        let config = current_config();
        let name = self.inner.name();
        let level = config.tracing.span_log_level;
        let max_chars = config.tracing.summary_max_chars;

        let input_summary = summarize(format!("{input:?}"), max_chars);
        let guard = Arc::clone(&self.collector).start_span(
            context.correlation_id(),
            context.workflow_id(),
            context.metadata_str(PARENT_SPAN_KEY),
            &name,
            input_summary,
        );
        let child_context = context.extend_with(PARENT_SPAN_KEY, guard.span_id());

        let span = tracing::debug_span!(
            "primitive.execute",
            primitive = %name,
            correlation_id = %context.correlation_id(),
            workflow_id = context.workflow_id().unwrap_or(""),
        );

        log_record(level, &name, context.correlation_id(), "started");
        let result = self
            .inner
            .execute(input, &child_context)
            .instrument(span)
            .await;

        match &result {
            Ok(output) => {
                log_record(level, &name, context.correlation_id(), "completed");
                guard.complete_success(summarize(format!("{output:?}"), max_chars));
            }
            Err(e) => {
                tracing::warn!(
                    primitive = %name,
                    correlation_id = %context.correlation_id(),
                    error_kind = %e.kind_label(),
                    error = %e,
                    "primitive failed"
                );
                guard.complete_failure(e.kind_label());
            }
        }
        result
    }

    fn name(&self) -> String {
        self.inner.name()
    }

    fn description(&self) -> Option<String> {
        self.inner.description()
    }

    fn is_instrumented(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compose::Lambda;
    use dashweave_observability::{InMemoryExporter, SpanExporter, SpanStatus};

    fn test_collector() -> (Arc<TraceCollector>, Arc<InMemoryExporter>) {
        let collector = Arc::new(TraceCollector::new());
        let exporter = Arc::new(InMemoryExporter::new());
        collector.set_span_exporter(Arc::clone(&exporter) as Arc<dyn SpanExporter>);
        (collector, exporter)
    }

    #[tokio::test]
    async fn test_success_output_is_unchanged() {
        let (collector, _exporter) = test_collector();
        let inc = Instrumented::with_collector(
            Lambda::new("inc", |x: i64| async move { Ok(x + 1) }),
            collector,
        );
        let ctx = WorkflowContext::new();
        assert_eq!(inc.execute(41, &ctx).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_span_records_name_and_correlation() {
        let (collector, exporter) = test_collector();
        let inc = Instrumented::with_collector(
            Lambda::new("inc", |x: i64| async move { Ok(x + 1) }),
            Arc::clone(&collector),
        );
        let ctx = WorkflowContext::with_correlation_id("corr-inst-1").unwrap();
        inc.execute(1, &ctx).await.unwrap();
        collector.flush().await.unwrap();

        let trace = exporter.trace_for("corr-inst-1").unwrap();
        assert_eq!(trace.spans.len(), 1);
        assert_eq!(trace.spans[0].primitive_name, "inc");
        assert_eq!(trace.spans[0].correlation_id, "corr-inst-1");
        assert_eq!(trace.spans[0].status, SpanStatus::Success);
        assert_eq!(trace.spans[0].input_summary, "1");
        assert_eq!(trace.spans[0].output_summary, "2");
    }

    #[tokio::test]
    async fn test_failure_records_error_kind_and_reraises() {
        let (collector, exporter) = test_collector();
        let failing: Instrumented<Lambda<i64, i64>> = Instrumented::with_collector(
            Lambda::new("failing", |_x: i64| async move {
                Err(crate::error::Error::target(
                    "failing",
                    "ConnectionError",
                    anyhow::anyhow!("refused"),
                ))
            }),
            Arc::clone(&collector),
        );
        let ctx = WorkflowContext::with_correlation_id("corr-inst-2").unwrap();
        let err = failing.execute(1, &ctx).await.unwrap_err();
        // The caller observes the original kind
        assert_eq!(err.kind_label(), "ConnectionError");

        collector.flush().await.unwrap();
        let trace = exporter.trace_for("corr-inst-2").unwrap();
        assert_eq!(trace.spans[0].error_kind.as_deref(), Some("ConnectionError"));
    }

    #[tokio::test]
    async fn test_double_wrapping_adds_no_second_span() {
        let (collector, exporter) = test_collector();
        let inner = Instrumented::with_collector(
            Lambda::new("inc", |x: i64| async move { Ok(x + 1) }),
            Arc::clone(&collector),
        );
        let outer = Instrumented::with_collector(inner, Arc::clone(&collector));

        let ctx = WorkflowContext::with_correlation_id("corr-inst-3").unwrap();
        assert_eq!(outer.execute(1, &ctx).await.unwrap(), 2);
        collector.flush().await.unwrap();

        let trace = exporter.trace_for("corr-inst-3").unwrap();
        assert_eq!(trace.spans.len(), 1);
    }

    #[tokio::test]
    async fn test_summary_truncation() {
        let long = "x".repeat(1_000);
        let summary = summarize(long, 16);
        assert_eq!(summary.chars().count(), 17);
        assert!(summary.ends_with('…'));
    }
}
