//! Span and trace records produced per primitive invocation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sampling::SamplingDecision;

/// Terminal status of a single primitive execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// The primitive returned a value
    Success,
    /// The primitive returned an error
    Failure,
    /// The execution was cancelled before completing
    Cancelled,
    /// The primitive was never invoked (e.g. an untaken branch)
    Skipped,
}

impl SpanStatus {
    /// Stable lowercase label, used as a metric label value
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

/// A timestamped event attached to a span (e.g. one retry attempt)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    /// Event name, e.g. `retry.attempt`
    pub name: String,
    /// Event attributes
    pub attributes: Vec<(String, String)>,
    /// Wall-clock time the event was recorded
    pub timestamp: DateTime<Utc>,
}

impl SpanEvent {
    /// Create an event with the given name and attributes
    #[must_use]
    pub fn new(name: impl Into<String>, attributes: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            attributes,
            timestamp: Utc::now(),
        }
    }

    /// Look up an attribute value by key
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// One completed primitive execution inside a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    /// Unique span id within the trace
    pub span_id: String,
    /// Parent span id, `None` for the root span
    pub parent_span_id: Option<String>,
    /// Name of the executed primitive
    pub primitive_name: String,
    /// Correlation id of the owning workflow execution
    pub correlation_id: String,
    /// Workflow id, if the composition was given one
    pub workflow_id: Option<String>,
    /// Truncated rendering of the input
    pub input_summary: String,
    /// Truncated rendering of the output, empty unless the span succeeded
    pub output_summary: String,
    /// Wall-clock duration of the execution
    pub duration_ms: u64,
    /// Terminal status
    pub status: SpanStatus,
    /// Error kind label, present when status is `failure`
    pub error_kind: Option<String>,
    /// Events recorded while the span was open
    pub events: Vec<SpanEvent>,
    /// Wall-clock start time
    pub started_at: DateTime<Utc>,
}

/// A completed workflow execution: its sampling decision and every span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// Correlation id shared by every span in the trace
    pub correlation_id: String,
    /// Workflow id, if any
    pub workflow_id: Option<String>,
    /// The final (possibly tail-promoted) sampling decision
    pub decision: SamplingDecision,
    /// All spans, in completion order
    pub spans: Vec<SpanRecord>,
}

impl ExecutionTrace {
    /// The root span, if the trace recorded one
    #[must_use]
    pub fn root(&self) -> Option<&SpanRecord> {
        self.spans.iter().find(|s| s.parent_span_id.is_none())
    }

    /// Spans whose parent is the given span id
    #[must_use]
    pub fn children_of(&self, span_id: &str) -> Vec<&SpanRecord> {
        self.spans
            .iter()
            .filter(|s| s.parent_span_id.as_deref() == Some(span_id))
            .collect()
    }

    /// The slowest span duration in the trace, in milliseconds
    #[must_use]
    pub fn max_span_duration_ms(&self) -> u64 {
        self.spans.iter().map(|s| s.duration_ms).max().unwrap_or(0)
    }

    /// True if any span failed
    #[must_use]
    pub fn has_failure(&self) -> bool {
        self.spans.iter().any(|s| s.status == SpanStatus::Failure)
    }

    /// All events across all spans, in span completion order
    #[must_use]
    pub fn events(&self) -> Vec<&SpanEvent> {
        self.spans.iter().flat_map(|s| s.events.iter()).collect()
    }

    /// Spans bearing the given primitive name
    #[must_use]
    pub fn spans_named(&self, primitive_name: &str) -> Vec<&SpanRecord> {
        self.spans
            .iter()
            .filter(|s| s.primitive_name == primitive_name)
            .collect()
    }
}
