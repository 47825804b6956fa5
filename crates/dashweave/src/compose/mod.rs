// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Composition primitives
//!
//! The closed combinator set for assembling workflows: sequential
//! ([`Then`], [`Sequential`]), parallel fan-out ([`Parallel`],
//! [`KeyedParallel`]), branching ([`Conditional`], [`Router`]), and the
//! [`Lambda`] adapter for plain async callables. Every combinator is itself
//! a [`crate::WorkflowPrimitive`], so trees nest arbitrarily and recovery or
//! instrumentation wrappers apply at any level.

mod conditional;
mod lambda;
mod parallel;
mod router;
mod sequential;

pub use conditional::Conditional;
pub use lambda::Lambda;
pub use parallel::{KeyedParallel, Parallel, ParallelMode};
pub use router::Router;
pub use sequential::{Sequential, Then};
