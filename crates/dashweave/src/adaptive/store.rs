// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Optional persistence of learned strategies
//!
//! Persisting is a best-effort side-effect: it runs on a spawned task, a
//! failure is logged at `warn`, and it is never retried synchronously. No
//! persistence is required for correctness.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::adaptive::strategy::LearningStrategy;

/// Destination for adopted strategy records
#[async_trait]
pub trait StrategyStore: Send + Sync {
    /// Persist one strategy record for the named adaptive primitive
    async fn persist(&self, primitive: &str, strategy: &LearningStrategy) -> anyhow::Result<()>;
}

/// Appends strategy records as JSON lines to a file
pub struct JsonlStrategyStore {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl JsonlStrategyStore {
    /// Open (or create) the file at `path` for appending
    pub fn create(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// The file this store appends to
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl StrategyStore for JsonlStrategyStore {
    async fn persist(&self, primitive: &str, strategy: &LearningStrategy) -> anyhow::Result<()> {
        let record = serde_json::json!({
            "primitive": primitive,
            "strategy": strategy,
        });
        let line = serde_json::to_string(&record)?;
        let mut file = self.file.lock();
        writeln!(file, "{line}")?;
        Ok(())
    }
}
