//! Storage trait definitions for tribunal checkpoints
//!
//! A checkpoint is the serialized run state of one audit run, written after
//! every pipeline transition so the run can resume after a process restart.
//! Backends store an opaque JSON payload together with its SHA-256 digest and
//! verify the digest on every load.
//!
//! All traits are async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Digest of the canonical JSON encoding of `value`.
    pub fn of_json(value: &serde_json::Value) -> StorageResult<Self> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted state of one audit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Run identifier (the run's trace id).
    pub run_id: String,
    /// Pipeline state name at the time of the write, e.g. `"synthesize"`.
    pub state: String,
    /// Serialized run state; opaque to the store.
    pub payload: serde_json::Value,
    /// SHA-256 of the JSON encoding of `payload`.
    pub digest: ContentDigest,
    /// When this checkpoint was written.
    pub updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// Build a record, computing the payload digest.
    pub fn new(
        run_id: impl Into<String>,
        state: impl Into<String>,
        payload: serde_json::Value,
    ) -> StorageResult<Self> {
        let digest = ContentDigest::of_json(&payload)?;
        Ok(Self {
            run_id: run_id.into(),
            state: state.into(),
            payload,
            digest,
            updated_at: Utc::now(),
        })
    }

    /// Recompute the payload digest and compare it to the stored one.
    pub fn verify(&self) -> StorageResult<()> {
        let actual = ContentDigest::of_json(&self.payload)?;
        if actual != self.digest {
            return Err(StorageError::DigestMismatch {
                run_id: self.run_id.clone(),
                expected: self.digest.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

/// Lightweight listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub run_id: String,
    pub state: String,
    pub updated_at: DateTime<Utc>,
}

/// Durable store for run checkpoints.
///
/// Guarantees:
/// - `save` replaces any previous checkpoint for the same run (last write wins).
/// - `load` returns exactly the payload last saved, digest-verified.
/// - `list` is ordered by `run_id`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Write (or overwrite) the checkpoint for `record.run_id`.
    async fn save(&self, record: CheckpointRecord) -> StorageResult<()>;

    /// Load the latest checkpoint for a run. Returns `StorageError::NotFound` if absent
    /// and `StorageError::DigestMismatch` if the payload fails verification.
    async fn load(&self, run_id: &str) -> StorageResult<CheckpointRecord>;

    /// List all stored checkpoints.
    async fn list(&self) -> StorageResult<Vec<CheckpointSummary>>;

    /// Delete the checkpoint for a run. No-op if absent.
    async fn delete(&self, run_id: &str) -> StorageResult<()>;
}
