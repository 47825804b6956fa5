// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The closed error taxonomy for workflow execution
//!
//! Every failure a workflow call can surface is one of these kinds. Errors
//! propagate unchanged through composition primitives; recovery primitives
//! may convert a kind they handle into a retry, a fallback, or a wrapping
//! exhaustion error that keeps the original as its cause. User primitive
//! failures enter the taxonomy as [`Error::Target`], which carries a
//! caller-supplied kind label (e.g. `ConnectionError`) used by retry
//! classification and recorded on the span.

use std::time::Duration;

use thiserror::Error;

/// Stable discriminant of [`Error`], used for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Context construction failed an invariant
    InvalidContext,
    /// A dynamic pipeline's value did not match the declared input shape
    TypeMismatch,
    /// A conditional predicate or router classifier raised
    Predicate,
    /// A router had no branch for the key and no default
    NoMatchingBranch,
    /// A user primitive raised; carries the underlying error
    Target,
    /// The timeout primitive fired
    Timeout,
    /// The retry primitive gave up
    RetriesExhausted,
    /// Every fallback in a chain failed
    AllFallbacksFailed,
    /// Parallel first-success saw no success
    AllBranchesFailed,
    /// A circuit breaker rejected the call fast
    CircuitOpen,
    /// A bulkhead rejected the call at capacity
    BulkheadRejected,
    /// A compensation workflow failed
    SagaFailed,
    /// Cooperative cancellation was delivered
    Cancelled,
}

impl ErrorKind {
    /// The kind's stable label
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidContext => "InvalidContextError",
            Self::TypeMismatch => "TypeMismatchError",
            Self::Predicate => "PredicateError",
            Self::NoMatchingBranch => "NoMatchingBranchError",
            Self::Target => "TargetError",
            Self::Timeout => "TimeoutError",
            Self::RetriesExhausted => "RetriesExhaustedError",
            Self::AllFallbacksFailed => "AllFallbacksFailedError",
            Self::AllBranchesFailed => "AllBranchesFailedError",
            Self::CircuitOpen => "CircuitOpenError",
            Self::BulkheadRejected => "BulkheadRejectedError",
            Self::SagaFailed => "SagaFailedError",
            Self::Cancelled => "CancelledError",
        }
    }
}

/// Outcome of one compensator run inside a failed saga
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationOutcome {
    /// Index of the compensated action
    pub step: usize,
    /// Name of the compensating primitive
    pub compensator: String,
    /// Whether the compensator succeeded
    pub succeeded: bool,
    /// The compensator's error message, if it failed
    pub message: Option<String>,
}

/// Error type for workflow execution
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Context construction failed an invariant
    #[error("Invalid workflow context: {0}")]
    InvalidContext(String),

    /// A dynamic pipeline's value did not match the declared shape
    #[error("Type mismatch in '{primitive}': {message}")]
    TypeMismatch {
        /// The primitive whose input or output failed to convert
        primitive: String,
        /// What failed to convert
        message: String,
    },

    /// A conditional predicate or router classifier raised
    #[error("Predicate failed in '{primitive}': {message}")]
    Predicate {
        /// The conditional or router primitive
        primitive: String,
        /// The predicate's error
        message: String,
    },

    /// A router had no branch for the key and no default
    #[error("Router '{primitive}' has no branch for key '{key}' and no default")]
    NoMatchingBranch {
        /// The router primitive
        primitive: String,
        /// The unmatched branch key
        key: String,
    },

    /// A user primitive raised
    #[error("Primitive '{primitive}' failed ({kind}): {source}")]
    Target {
        /// The failing primitive
        primitive: String,
        /// Caller-supplied kind label, e.g. `ConnectionError`
        kind: String,
        /// The underlying error
        #[source]
        source: anyhow::Error,
    },

    /// The timeout primitive fired
    #[error("Primitive '{primitive}' timed out after {timeout:?}")]
    Timeout {
        /// The wrapped primitive
        primitive: String,
        /// The configured timeout
        timeout: Duration,
    },

    /// The retry primitive gave up
    #[error("Primitive '{primitive}' still failing after {attempts} attempts")]
    RetriesExhausted {
        /// The wrapped primitive
        primitive: String,
        /// Total invocations made (`max_retries` + 1)
        attempts: u32,
        /// The last failure
        #[source]
        source: Box<Error>,
    },

    /// Every fallback in a chain failed
    #[error("All {count} branches of fallback '{primitive}' failed")]
    AllFallbacksFailed {
        /// The fallback primitive
        primitive: String,
        /// Number of branches tried (primary + fallbacks)
        count: usize,
        /// Per-branch errors, in execution order
        errors: Vec<Error>,
    },

    /// Parallel first-success saw no success
    #[error("All {count} branches of parallel '{primitive}' failed")]
    AllBranchesFailed {
        /// The parallel primitive
        primitive: String,
        /// Number of branches
        count: usize,
        /// Per-branch errors, in declaration order
        errors: Vec<Error>,
    },

    /// A circuit breaker rejected the call fast
    #[error("Circuit breaker '{primitive}' is open; retry in {retry_after:?}")]
    CircuitOpen {
        /// The wrapped primitive
        primitive: String,
        /// Time remaining until the breaker half-opens
        retry_after: Duration,
    },

    /// A bulkhead rejected the call at capacity
    #[error("Bulkhead '{primitive}' rejected the call at {max_concurrent} concurrent executions")]
    BulkheadRejected {
        /// The wrapped primitive
        primitive: String,
        /// The configured concurrency cap
        max_concurrent: usize,
    },

    /// A compensation workflow failed
    #[error("Saga '{primitive}' failed at step {failed_step}")]
    SagaFailed {
        /// The saga primitive
        primitive: String,
        /// Index of the failing action
        failed_step: usize,
        /// The action's failure
        #[source]
        source: Box<Error>,
        /// Which compensators ran and how they fared, in execution order
        report: Vec<CompensationOutcome>,
    },

    /// Cooperative cancellation was delivered
    #[error("Execution of '{primitive}' was cancelled")]
    Cancelled {
        /// The primitive whose execution was cancelled
        primitive: String,
    },
}

impl Error {
    /// Wrap a user error as a [`Error::Target`] with a kind label
    #[must_use]
    pub fn target(
        primitive: impl Into<String>,
        kind: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Target {
            primitive: primitive.into(),
            kind: kind.into(),
            source: source.into(),
        }
    }

    /// This error's kind
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidContext(_) => ErrorKind::InvalidContext,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::Predicate { .. } => ErrorKind::Predicate,
            Self::NoMatchingBranch { .. } => ErrorKind::NoMatchingBranch,
            Self::Target { .. } => ErrorKind::Target,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            Self::AllFallbacksFailed { .. } => ErrorKind::AllFallbacksFailed,
            Self::AllBranchesFailed { .. } => ErrorKind::AllBranchesFailed,
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::BulkheadRejected { .. } => ErrorKind::BulkheadRejected,
            Self::SagaFailed { .. } => ErrorKind::SagaFailed,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// The label recorded on spans and matched by retry classifiers
    ///
    /// For [`Error::Target`] this is the carried user kind (e.g.
    /// `ConnectionError`); for every other variant it is the taxonomy label.
    #[must_use]
    pub fn kind_label(&self) -> &str {
        match self {
            Self::Target { kind, .. } => kind,
            other => other.kind().as_str(),
        }
    }

    /// The primitive this error originated from, when known
    #[must_use]
    pub fn primitive(&self) -> Option<&str> {
        match self {
            Self::InvalidContext(_) => None,
            Self::TypeMismatch { primitive, .. }
            | Self::Predicate { primitive, .. }
            | Self::NoMatchingBranch { primitive, .. }
            | Self::Target { primitive, .. }
            | Self::Timeout { primitive, .. }
            | Self::RetriesExhausted { primitive, .. }
            | Self::AllFallbacksFailed { primitive, .. }
            | Self::AllBranchesFailed { primitive, .. }
            | Self::CircuitOpen { primitive, .. }
            | Self::BulkheadRejected { primitive, .. }
            | Self::SagaFailed { primitive, .. }
            | Self::Cancelled { primitive } => Some(primitive),
        }
    }
}

/// Result type for workflow execution
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_error_display() {
        let err = Error::target("fetch", "ConnectionError", anyhow::anyhow!("refused"));
        assert_eq!(
            err.to_string(),
            "Primitive 'fetch' failed (ConnectionError): refused"
        );
    }

    #[test]
    fn test_target_kind_label_is_user_kind() {
        let err = Error::target("fetch", "ConnectionError", anyhow::anyhow!("refused"));
        assert_eq!(err.kind(), ErrorKind::Target);
        assert_eq!(err.kind_label(), "ConnectionError");
    }

    #[test]
    fn test_framework_kind_labels() {
        let err = Error::Timeout {
            primitive: "slow".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(err.kind_label(), "TimeoutError");

        let err = Error::Cancelled {
            primitive: "gone".to_string(),
        };
        assert_eq!(err.kind_label(), "CancelledError");
    }

    #[test]
    fn test_retries_exhausted_preserves_cause() {
        let cause = Error::target("flaky", "ConnectionError", anyhow::anyhow!("refused"));
        let err = Error::RetriesExhausted {
            primitive: "flaky".to_string(),
            attempts: 4,
            source: Box::new(cause),
        };
        assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
        let source = std::error::Error::source(&err);
        assert!(source.is_some_and(|s| s.to_string().contains("ConnectionError")));
    }

    #[test]
    fn test_primitive_accessor() {
        let err = Error::CircuitOpen {
            primitive: "api".to_string(),
            retry_after: Duration::from_millis(50),
        };
        assert_eq!(err.primitive(), Some("api"));
        assert_eq!(Error::InvalidContext("empty".to_string()).primitive(), None);
    }

    #[test]
    fn test_all_fallbacks_failed_aggregates() {
        let err = Error::AllFallbacksFailed {
            primitive: "chain".to_string(),
            count: 2,
            errors: vec![
                Error::target("primary", "RuntimeError", anyhow::anyhow!("a")),
                Error::target("backup", "RuntimeError", anyhow::anyhow!("b")),
            ],
        };
        assert_eq!(err.to_string(), "All 2 branches of fallback 'chain' failed");
        if let Error::AllFallbacksFailed { errors, .. } = &err {
            assert_eq!(errors.len(), 2);
        }
    }
}
