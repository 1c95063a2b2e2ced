//! Run-level error taxonomy for tribunal.
//!
//! Stage-local failures (a collector that failed, a judge that returned
//! garbage) are never errors: they travel as status fields on records and
//! opinions. Only the variants below cross stage boundaries.

use tribunal_state::StorageError;

/// Tribunal errors.
#[derive(Debug, thiserror::Error)]
pub enum TribunalError {
    #[error("synthesis invariant violated: {0}")]
    SynthesisInvariantViolation(String),

    #[error("target unresolvable: {target}: {reason}")]
    TargetUnresolvable { target: String, reason: String },

    #[error("run aborted after {last_completed}: {reason}")]
    RunAborted {
        reason: String,
        last_completed: String,
    },

    #[error("report emission failed: {0}")]
    EmitFailure(String),

    #[error("invalid rubric: {0}")]
    RubricInvalid(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for TribunalError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { run_id } => TribunalError::CheckpointNotFound(run_id),
            other => TribunalError::Storage(other),
        }
    }
}

/// Result type for tribunal operations.
pub type Result<T> = std::result::Result<T, TribunalError>;
