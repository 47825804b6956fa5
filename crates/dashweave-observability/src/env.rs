//! Centralized environment variable names and helpers for `dashweave-observability`.
//!
//! The core reads only two categories of environment variable: the deployment
//! environment (which selects the recommended config defaults) and optional
//! service identity overrides attached to every exported trace as resource
//! attributes.

// =============================================================================
// Environment Variable Name Constants
// =============================================================================

/// Deployment environment: "development", "staging", or "production".
pub const DASHWEAVE_ENV: &str = "DASHWEAVE_ENV";
/// Service name attached to exported telemetry (default: "dashweave").
pub const DASHWEAVE_SERVICE_NAME: &str = "DASHWEAVE_SERVICE_NAME";
/// Service version attached to exported telemetry.
pub const DASHWEAVE_SERVICE_VERSION: &str = "DASHWEAVE_SERVICE_VERSION";

// =============================================================================
// Typed helpers
// =============================================================================

/// Reads an environment variable as a string, returning `None` if unset.
#[must_use]
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Reads an environment variable as a string, returning `default` if unset.
#[must_use]
pub fn env_string_or_default(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Reads an environment variable as an `f64`, returning `default` if unset or invalid.
#[must_use]
pub fn env_f64_or_default(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

/// Reads an environment variable as a `u64`, returning `default` if unset or invalid.
#[must_use]
pub fn env_u64_or_default(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Helper to set and unset env vars safely for tests
    fn with_env_var<F, R>(name: &str, value: Option<&str>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(name).ok();
        match value {
            Some(v) => env::set_var(name, v),
            None => env::remove_var(name),
        }
        let result = f();
        match original {
            Some(v) => env::set_var(name, v),
            None => env::remove_var(name),
        }
        result
    }

    #[test]
    fn test_env_string_unset() {
        with_env_var("DASHWEAVE_TEST_UNSET", None, || {
            assert_eq!(env_string("DASHWEAVE_TEST_UNSET"), None);
        });
    }

    #[test]
    fn test_env_string_or_default() {
        with_env_var("DASHWEAVE_TEST_STR", Some("staging"), || {
            assert_eq!(
                env_string_or_default("DASHWEAVE_TEST_STR", "development"),
                "staging"
            );
        });
        with_env_var("DASHWEAVE_TEST_STR", None, || {
            assert_eq!(
                env_string_or_default("DASHWEAVE_TEST_STR", "development"),
                "development"
            );
        });
    }

    #[test]
    fn test_env_f64_invalid_falls_back() {
        with_env_var("DASHWEAVE_TEST_F64", Some("not-a-number"), || {
            assert!((env_f64_or_default("DASHWEAVE_TEST_F64", 0.25) - 0.25).abs() < f64::EPSILON);
        });
    }

    #[test]
    fn test_env_u64_parses() {
        with_env_var("DASHWEAVE_TEST_U64", Some("42"), || {
            assert_eq!(env_u64_or_default("DASHWEAVE_TEST_U64", 7), 42);
        });
    }
}
