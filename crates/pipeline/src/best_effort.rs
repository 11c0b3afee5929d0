//! Explicit "log and discard" for secondary failures.
//!
//! Used where a failure must never mask a primary one, e.g. updating the
//! journal while recording that a story already failed.

use std::fmt::Display;

pub trait BestEffort<T> {
    /// Return the value on success. On failure log a warning naming
    /// `action` and return `None`.
    fn best_effort(self, action: &str) -> Option<T>;
}

impl<T, E: Display> BestEffort<T> for Result<T, E> {
    fn best_effort(self, action: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, action, "Best-effort operation failed, ignoring");
                None
            }
        }
    }
}
