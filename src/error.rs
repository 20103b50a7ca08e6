//! Engine error taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the reviewer and risk engines.
///
/// The type is `Clone` so that a single failed computation can be handed to
/// every caller waiting on the same cache slot.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// An upstream collaborator failed or returned nothing usable.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// The merge request descriptor or configuration is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An external fetch feeding a cached computation exceeded its budget.
    #[error("{operation} timed out after {after:?}")]
    ComputationTimeout {
        /// The fetch that timed out.
        operation: String,
        /// The budget that was exceeded.
        after: Duration,
    },

    /// A computation panicked or was torn down before finishing.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Builds a `DataUnavailable` error from a collaborator failure,
    /// keeping the full cause chain in the message.
    pub fn unavailable(context: &str, err: &anyhow::Error) -> Self {
        Self::DataUnavailable(format!("{context}: {err:#}"))
    }

    /// Returns true for failures that should degrade to neutral defaults
    /// rather than abort the request.
    #[must_use]
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, Self::DataUnavailable(_))
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_keeps_cause_chain() {
        let err = anyhow::anyhow!("connection reset").context("GET /projects/7/reviews");
        let engine_err = EngineError::unavailable("review history for project 7", &err);
        let msg = engine_err.to_string();
        assert!(msg.contains("review history for project 7"));
        assert!(msg.contains("GET /projects/7/reviews"));
        assert!(msg.contains("connection reset"));
        assert!(engine_err.is_data_unavailable());
    }

    #[test]
    fn timeout_message_names_operation() {
        let err = EngineError::ComputationTimeout {
            operation: "review history fetch".to_string(),
            after: Duration::from_secs(10),
        };
        assert_eq!(err.to_string(), "review history fetch timed out after 10s");
        assert!(!err.is_data_unavailable());
    }

    #[test]
    fn internal_errors_do_not_degrade() {
        let err = EngineError::Internal("computation for k panicked".to_string());
        assert_eq!(err.to_string(), "Internal error: computation for k panicked");
        assert!(!err.is_data_unavailable());
    }
}
