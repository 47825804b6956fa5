//! Error types for `DashWeave` observability

use thiserror::Error;

/// Error type for observability operations
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Observability configuration rejected
    #[error("Invalid observability configuration: {0}")]
    ConfigurationError(String),

    /// Span export failed
    #[error("Failed to export spans: {0}")]
    SpanExportError(String),

    /// Metric export failed
    #[error("Failed to export metrics: {0}")]
    MetricExportError(String),

    /// Health server error
    #[error("Health server failed: {0}")]
    HealthServer(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for observability operations
pub type Result<T> = std::result::Result<T, Error>;
