//! In-memory fakes for storage traits (testing only)
//!
//! `MemoryCheckpointStore` satisfies the `CheckpointStore` contract without any
//! external dependencies and counts writes so tests can assert how often the
//! pipeline checkpointed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

/// In-memory checkpoint store backed by a `BTreeMap<run_id, record>`.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<BTreeMap<String, CheckpointRecord>>,
    saves: AtomicUsize,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls observed so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn guard(
        &self,
    ) -> StorageResult<std::sync::MutexGuard<'_, BTreeMap<String, CheckpointRecord>>> {
        self.records
            .lock()
            .map_err(|e| StorageError::Backend(format!("checkpoint map poisoned: {e}")))
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, record: CheckpointRecord) -> StorageResult<()> {
        record.verify()?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.guard()?.insert(record.run_id.clone(), record);
        Ok(())
    }

    async fn load(&self, run_id: &str) -> StorageResult<CheckpointRecord> {
        let record = self
            .guard()?
            .get(run_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                run_id: run_id.to_string(),
            })?;
        record.verify()?;
        Ok(record)
    }

    async fn list(&self) -> StorageResult<Vec<CheckpointSummary>> {
        Ok(self
            .guard()?
            .values()
            .map(|r| CheckpointSummary {
                run_id: r.run_id.clone(),
                state: r.state.clone(),
                updated_at: r.updated_at,
            })
            .collect())
    }

    async fn delete(&self, run_id: &str) -> StorageResult<()> {
        self.guard()?.remove(run_id);
        Ok(())
    }
}
