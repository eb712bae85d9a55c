//! Error types for symbolic search.

use std::time::Duration;

use thiserror::Error;

use crate::task::Fact;

/// Result type alias for search operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A diagram operation exceeded its node budget. Recoverable by splitting the operand.
    #[error("diagram operation exceeded the node budget of {limit}")]
    NodeLimit { limit: usize },

    /// Wall-clock budget exhausted; the search result is unknown.
    #[error("time limit of {limit:?} exceeded after {elapsed:?}")]
    TimeLimit { limit: Duration, elapsed: Duration },

    /// Too many live nodes in the manager; the search result is unknown.
    #[error("memory limit of {limit} nodes exceeded ({used} nodes in use)")]
    MemoryLimit { limit: usize, used: usize },

    /// Malformed planning task
    #[error("invalid planning task: {0}")]
    InvalidTask(String),

    /// Utility values must be finite and non-negative
    #[error("invalid utility {value} for fact {fact}")]
    InvalidUtility { fact: Fact, value: f64 },

    /// A plan that does not apply to the task
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}

impl Error {
    /// Whether the error aborts the search (as opposed to a recoverable size overflow).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::NodeLimit { .. })
    }
}
