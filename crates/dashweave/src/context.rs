// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Per-execution workflow context
//!
//! A [`WorkflowContext`] is created once at workflow entry and threaded
//! unchanged through the whole composition tree: the correlation id it
//! carries ties together every span, metric sample, and log record of that
//! execution. The context is a value object - the framework never mutates it
//! after construction, and extension returns a new instance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Identity and caller-supplied scoping keys for one workflow execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    correlation_id: String,
    workflow_id: Option<String>,
    metadata: HashMap<String, Value>,
}

impl WorkflowContext {
    /// Create a context with a generated correlation id
    #[must_use]
    pub fn new() -> Self {
        Self {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            workflow_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a context with an explicit correlation id
    ///
    /// Fails with [`Error::InvalidContext`] if the id is empty or blank.
    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Result<Self> {
        let correlation_id = correlation_id.into();
        if correlation_id.trim().is_empty() {
            return Err(Error::InvalidContext(
                "correlation_id must be a non-empty string".to_string(),
            ));
        }
        Ok(Self {
            correlation_id,
            workflow_id: None,
            metadata: HashMap::new(),
        })
    }

    /// Attach a stable workflow identifier, used for grouping telemetry
    #[must_use]
    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    /// Attach one metadata entry at construction time
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The correlation id shared by every nested execution
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// The workflow id, if one was attached
    #[must_use]
    pub fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    /// All metadata entries
    #[must_use]
    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    /// Look up a metadata value
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Look up a metadata value as a string
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Return a new context with the union of this metadata and `additions`
    ///
    /// The correlation id and workflow id are shared unchanged; colliding
    /// keys take the new value. Extending with an empty map yields a context
    /// observationally equivalent to the original.
    #[must_use]
    pub fn extend(&self, additions: HashMap<String, Value>) -> Self {
        if additions.is_empty() {
            return self.clone();
        }
        let mut metadata = self.metadata.clone();
        metadata.extend(additions);
        Self {
            correlation_id: self.correlation_id.clone(),
            workflow_id: self.workflow_id.clone(),
            metadata,
        }
    }

    /// Return a new context with one additional metadata entry
    #[must_use]
    pub fn extend_with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut metadata = self.metadata.clone();
        metadata.insert(key.into(), value.into());
        Self {
            correlation_id: self.correlation_id.clone(),
            workflow_id: self.workflow_id.clone(),
            metadata,
        }
    }
}

impl Default for WorkflowContext {
    fn default() -> Self {
        Self::new()
    }
}
