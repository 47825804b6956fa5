// Allow unwrap in testing utilities - test code should panic on errors
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

//! # DashWeave Testing Utilities
//!
//! Deterministic building blocks for testing workflows without their real
//! dependencies:
//!
//! - **MockPrimitive**: a declaratively-programmed primitive (fixed value,
//!   scripted sequence, failure, or handler; optional delay) that tracks its
//!   calls and captured inputs
//! - **Fixtures**: a test-scoped observability setup with an in-memory span
//!   collector, serialized behind a process-global lock
//! - **Assertions**: call-count, input, span, and retry-exhaustion helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dashweave_testing::{assert_called, test_observability, MockPrimitive, MockStep};
//!
//! let flaky: MockPrimitive<(), String> = MockPrimitive::with_sequence(
//!     "flaky",
//!     vec![
//!         MockStep::err("ConnectionError", "refused"),
//!         MockStep::ok("recovered".to_string()),
//!     ],
//! );
//! ```

mod assertions;
mod fixtures;
mod mock_primitive;

pub use assertions::{
    assert_called, assert_error_kind, assert_failure_recorded, assert_input_matches,
    assert_retries_exhausted, assert_span_recorded,
};
pub use fixtures::{test_observability, TestObservability};
pub use mock_primitive::{MockHandler, MockPrimitive, MockStep};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        assert_called, assert_error_kind, assert_failure_recorded, assert_input_matches,
        assert_retries_exhausted, assert_span_recorded, test_observability, MockPrimitive,
        MockStep, TestObservability,
    };
}
