//! Error types for tribunal-state

use thiserror::Error;

/// Errors produced by checkpoint storage backends.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No checkpoint exists for the requested run.
    #[error("checkpoint not found for run: {run_id}")]
    NotFound { run_id: String },

    /// A digest string was not 64 lowercase hex characters.
    #[error("invalid content digest: {digest}")]
    InvalidDigest { digest: String },

    /// The stored payload no longer hashes to its recorded digest.
    #[error("checkpoint digest mismatch for run {run_id}: expected {expected}, got {actual}")]
    DigestMismatch {
        run_id: String,
        expected: String,
        actual: String,
    },

    /// Connecting to the backend failed.
    #[error("backend connection failed: {0}")]
    Connection(String),

    /// A backend query or write failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// Payload (de)serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
