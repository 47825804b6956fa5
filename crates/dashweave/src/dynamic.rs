// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Bridge between typed primitives and `serde_json::Value` pipelines
//!
//! Heterogeneous branch tables (e.g. a router whose branches have different
//! concrete types) compose over `Value`. The adapter deserializes the value
//! into the wrapped primitive's input shape and serializes its output back;
//! a shape mismatch surfaces [`crate::Error::TypeMismatch`] on the first
//! execution, before any mismatched pipeline can complete successfully.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::context::WorkflowContext;
use crate::error::{Error, Result};
use crate::primitive::WorkflowPrimitive;

/// Lifts a typed primitive into a `Value -> Value` primitive
pub struct ValueAdapter<P> {
    inner: P,
}

impl<P> ValueAdapter<P>
where
    P: WorkflowPrimitive,
    P::Input: DeserializeOwned,
    P::Output: Serialize,
{
    /// Wrap a typed primitive
    #[must_use]
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P> WorkflowPrimitive for ValueAdapter<P>
where
    P: WorkflowPrimitive,
    P::Input: DeserializeOwned,
    P::Output: Serialize,
{
    type Input = Value;
    type Output = Value;

    async fn execute(&self, input: Value, context: &WorkflowContext) -> Result<Value> {
        let typed_input: P::Input = serde_json::from_value(input).map_err(|e| {
            Error::TypeMismatch {
                primitive: self.inner.name(),
                message: format!(
                    "input does not match {}: {e}",
                    std::any::type_name::<P::Input>()
                ),
            }
        })?;
        let output = self.inner.execute(typed_input, context).await?;
        serde_json::to_value(output).map_err(|e| Error::TypeMismatch {
            primitive: self.inner.name(),
            message: format!(
                "output {} is not serializable: {e}",
                std::any::type_name::<P::Output>()
            ),
        })
    }

    fn name(&self) -> String {
        self.inner.name()
    }

    fn description(&self) -> Option<String> {
        self.inner.description()
    }
}
