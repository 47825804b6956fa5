// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! N-way branching via a classifier over (input, context)

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::WorkflowContext;
use crate::error::{Error, Result};
use crate::primitive::WorkflowPrimitive;

type Branch<I, O> = Arc<dyn WorkflowPrimitive<Input = I, Output = O>>;
type Classifier<I> =
    Arc<dyn Fn(&I, &WorkflowContext) -> anyhow::Result<String> + Send + Sync>;

/// Selects one of N branches by the key a classifier returns
///
/// An unknown key with no default branch surfaces
/// [`Error::NoMatchingBranch`]; a classifier error surfaces as
/// [`Error::Predicate`].
pub struct Router<I, O> {
    name: String,
    classifier: Classifier<I>,
    branches: HashMap<String, Branch<I, O>>,
    default: Option<Branch<I, O>>,
}

impl<I, O> Router<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Create a router with a fallible classifier
    pub fn new<F>(name: impl Into<String>, classifier: F) -> Self
    where
        F: Fn(&I, &WorkflowContext) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            classifier: Arc::new(classifier),
            branches: HashMap::new(),
            default: None,
        }
    }

    /// Create a router with an infallible classifier
    pub fn with_classifier<F>(name: impl Into<String>, classifier: F) -> Self
    where
        F: Fn(&I, &WorkflowContext) -> String + Send + Sync + 'static,
    {
        Self::new(name, move |input, context| Ok(classifier(input, context)))
    }

    /// Bind a branch to a classifier key
    #[must_use]
    pub fn route<P>(mut self, key: impl Into<String>, primitive: P) -> Self
    where
        P: WorkflowPrimitive<Input = I, Output = O> + 'static,
    {
        self.branches.insert(key.into(), Arc::new(primitive));
        self
    }

    /// Set the branch taken when no key matches
    #[must_use]
    pub fn with_default<P>(mut self, primitive: P) -> Self
    where
        P: WorkflowPrimitive<Input = I, Output = O> + 'static,
    {
        self.default = Some(Arc::new(primitive));
        self
    }
}

#[async_trait]
impl<I, O> WorkflowPrimitive for Router<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    async fn execute(&self, input: I, context: &WorkflowContext) -> Result<O> {
        let key = (self.classifier)(&input, context).map_err(|e| Error::Predicate {
            primitive: self.name.clone(),
            message: e.to_string(),
        })?;
        let branch = self
            .branches
            .get(&key)
            .or(self.default.as_ref())
            .ok_or_else(|| Error::NoMatchingBranch {
                primitive: self.name.clone(),
                key: key.clone(),
            })?;
        tracing::trace!(router = %self.name, key = %key, "routing");
        branch.execute(input, context).await
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
