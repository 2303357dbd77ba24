//! Error types for the adflow engine.
//!
//! Collaborator failures are modelled separately as
//! [`ProviderError`](crate::providers::ProviderError); this module covers the
//! engine's own failure modes: invalid configuration, unknown jobs, illegal
//! state transitions and persistence errors.

use crate::job::StageTransitionError;
use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The pipeline configuration failed validation.
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// No job with the given id is known to the engine or the store.
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// A stage transition outside the fixed total order was attempted.
    #[error("{0}")]
    Transition(#[from] StageTransitionError),

    /// The job state store failed.
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStage;

    #[test]
    fn test_validation_error_display() {
        let err = EngineError::validation("variant_count must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: variant_count must be at least 1"
        );
    }

    #[test]
    fn test_transition_error_converts() {
        let err: EngineError = StageTransitionError {
            from: JobStage::Completed,
            to: JobStage::Extracting,
        }
        .into();
        assert!(err.to_string().contains("completed"));
        assert!(err.to_string().contains("extracting"));
    }

    #[test]
    fn test_job_not_found_display() {
        let id = Uuid::new_v4();
        let err = EngineError::JobNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
