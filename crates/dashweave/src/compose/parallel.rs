// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Parallel fan-out composition
//!
//! [`Parallel`] broadcasts one input to every branch; [`KeyedParallel`] feeds
//! each branch its own input from a keyed mapping. Branches start together on
//! the cooperative scheduler and their side-effects are unordered; the output
//! list is ordered by declaration, never by completion.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};

use crate::context::WorkflowContext;
use crate::error::{Error, Result};
use crate::primitive::WorkflowPrimitive;

type Branch<I, O> = Arc<dyn WorkflowPrimitive<Input = I, Output = O>>;

/// Completion policy for a parallel fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParallelMode {
    /// Wait for every branch; the first failure cancels the siblings and
    /// surfaces that failure
    #[default]
    WaitAll,
    /// Return the first successful branch's output (as a single-element
    /// list) and cancel the siblings; if every branch fails, surface
    /// [`Error::AllBranchesFailed`] carrying each branch's error
    FirstSuccess,
}

/// Broadcast fan-out: one input value, one output per branch
pub struct Parallel<I, O> {
    name: String,
    branches: Vec<Branch<I, O>>,
    mode: ParallelMode,
}

impl<I, O> Parallel<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    /// Create a wait-all fan-out over the given branches
    #[must_use]
    pub fn new(branches: Vec<Branch<I, O>>) -> Self {
        Self {
            name: "parallel".to_string(),
            branches,
            mode: ParallelMode::WaitAll,
        }
    }

    /// Start an empty builder
    #[must_use]
    pub fn builder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: Vec::new(),
            mode: ParallelMode::WaitAll,
        }
    }

    /// Append a branch
    #[must_use]
    pub fn branch<P>(mut self, primitive: P) -> Self
    where
        P: WorkflowPrimitive<Input = I, Output = O> + 'static,
    {
        self.branches.push(Arc::new(primitive));
        self
    }

    /// Set the completion policy
    #[must_use]
    pub fn with_mode(mut self, mode: ParallelMode) -> Self {
        self.mode = mode;
        self
    }

    /// Number of branches
    #[must_use]
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// True when the fan-out has no branches
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    async fn execute_wait_all(&self, input: I, context: &WorkflowContext) -> Result<Vec<O>> {
        let mut in_flight = FuturesUnordered::new();
        for (index, branch) in self.branches.iter().enumerate() {
            let branch_input = input.clone();
            in_flight.push(async move { (index, branch.execute(branch_input, context).await) });
        }

        let mut outputs: Vec<Option<O>> = std::iter::repeat_with(|| None)
            .take(self.branches.len())
            .collect();
        while let Some((index, result)) = in_flight.next().await {
            match result {
                Ok(output) => outputs[index] = Some(output),
                // Dropping the stream cancels the in-flight siblings
                Err(e) => return Err(e),
            }
        }
        Ok(outputs.into_iter().flatten().collect())
    }

    async fn execute_first_success(&self, input: I, context: &WorkflowContext) -> Result<Vec<O>> {
        let mut in_flight = FuturesUnordered::new();
        for (index, branch) in self.branches.iter().enumerate() {
            let branch_input = input.clone();
            in_flight.push(async move { (index, branch.execute(branch_input, context).await) });
        }

        let mut failures: Vec<Option<Error>> = std::iter::repeat_with(|| None)
            .take(self.branches.len())
            .collect();
        while let Some((index, result)) = in_flight.next().await {
            match result {
                // First success wins; the siblings are cancelled on drop
                Ok(output) => return Ok(vec![output]),
                Err(e) => failures[index] = Some(e),
            }
        }
        Err(Error::AllBranchesFailed {
            primitive: self.name.clone(),
            count: self.branches.len(),
            errors: failures.into_iter().flatten().collect(),
        })
    }
}

#[async_trait]
impl<I, O> WorkflowPrimitive for Parallel<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = Vec<O>;

    async fn execute(&self, input: I, context: &WorkflowContext) -> Result<Vec<O>> {
        match self.mode {
            ParallelMode::WaitAll => self.execute_wait_all(input, context).await,
            ParallelMode::FirstSuccess => self.execute_first_success(input, context).await,
        }
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Keyed fan-out: each branch consumes its own entry of the input mapping
///
/// A branch whose key is absent from the input is an error
/// ([`Error::NoMatchingBranch`]); no branch starts until every key resolves.
pub struct KeyedParallel<I, O> {
    name: String,
    branches: Vec<(String, Branch<I, O>)>,
}

impl<I, O> KeyedParallel<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Start an empty keyed fan-out
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: Vec::new(),
        }
    }

    /// Append a branch bound to an input key
    #[must_use]
    pub fn branch<P>(mut self, key: impl Into<String>, primitive: P) -> Self
    where
        P: WorkflowPrimitive<Input = I, Output = O> + 'static,
    {
        self.branches.push((key.into(), Arc::new(primitive)));
        self
    }
}

#[async_trait]
impl<I, O> WorkflowPrimitive for KeyedParallel<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = HashMap<String, I>;
    type Output = Vec<O>;

    async fn execute(
        &self,
        mut input: HashMap<String, I>,
        context: &WorkflowContext,
    ) -> Result<Vec<O>> {
        let mut assignments = Vec::with_capacity(self.branches.len());
        for (key, branch) in &self.branches {
            let Some(branch_input) = input.remove(key) else {
                return Err(Error::NoMatchingBranch {
                    primitive: self.name.clone(),
                    key: key.clone(),
                });
            };
            assignments.push((branch, branch_input));
        }

        let mut in_flight = FuturesUnordered::new();
        for (index, (branch, branch_input)) in assignments.into_iter().enumerate() {
            in_flight.push(async move { (index, branch.execute(branch_input, context).await) });
        }

        let mut outputs: Vec<Option<O>> = std::iter::repeat_with(|| None)
            .take(self.branches.len())
            .collect();
        while let Some((index, result)) = in_flight.next().await {
            match result {
                Ok(output) => outputs[index] = Some(output),
                Err(e) => return Err(e),
            }
        }
        Ok(outputs.into_iter().flatten().collect())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
