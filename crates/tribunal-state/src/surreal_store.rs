//! SurrealDB-backed CheckpointStore implementation
//!
//! Payloads are stored as JSON text and the digest is checked against those
//! exact bytes on load, before they are parsed back into a `Value`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::storage_traits::{
    CheckpointRecord, CheckpointStore, CheckpointSummary, ContentDigest, StorageResult,
};

const NAMESPACE: &str = "tribunal";
const DATABASE: &str = "main";

/// Checkpoint row as stored in the `checkpoints` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbCheckpoint {
    /// SurrealDB record ID
    #[serde(default, skip_serializing)]
    id: Option<surrealdb::sql::Thing>,
    run_id: String,
    state: String,
    payload_json: String,
    digest: String,
    updated_at: String,
}

impl DbCheckpoint {
    fn from_record(record: &CheckpointRecord) -> StorageResult<Self> {
        Ok(Self {
            id: None,
            run_id: record.run_id.clone(),
            state: record.state.clone(),
            payload_json: serde_json::to_string(&record.payload)?,
            digest: record.digest.as_str().to_string(),
            updated_at: record.updated_at.to_rfc3339(),
        })
    }

    /// Check the stored digest against the stored payload bytes.
    fn verify(&self) -> StorageResult<()> {
        let actual = ContentDigest::from_bytes(self.payload_json.as_bytes());
        if actual.as_str() != self.digest {
            return Err(StorageError::DigestMismatch {
                run_id: self.run_id.clone(),
                expected: self.digest.clone(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    fn into_record(self) -> StorageResult<CheckpointRecord> {
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)
            .map_err(|e| StorageError::Serialization(format!("bad updated_at: {e}")))?
            .with_timezone(&Utc);
        Ok(CheckpointRecord {
            run_id: self.run_id,
            state: self.state,
            payload: serde_json::from_str(&self.payload_json)?,
            digest: ContentDigest::try_from(self.digest)?,
            updated_at,
        })
    }
}

/// SurrealDB-backed implementation of [`CheckpointStore`].
pub struct SurrealCheckpointStore {
    db: Surreal<Any>,
}

impl SurrealCheckpointStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> StorageResult<Self> {
        Self::connect("mem://").await
    }

    /// Local persistence under `path` using the SurrealKV engine.
    pub async fn local(path: &std::path::Path) -> StorageResult<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            StorageError::Connection(format!(
                "Failed to create database directory {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::connect(&format!("surrealkv://{}", path.display())).await
    }

    /// Connect to any SurrealDB endpoint URL (`mem://`, `surrealkv://`, `ws://`, ...).
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to connect to {url}: {e}")))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { db };
        store.init_schema().await?;
        info!(url = %url, "SurrealCheckpointStore connected");
        Ok(store)
    }

    async fn init_schema(&self) -> StorageResult<()> {
        debug!("Initializing checkpoints table");
        let sql = r#"
            DEFINE TABLE IF NOT EXISTS checkpoints SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS idx_checkpoint_run ON TABLE checkpoints COLUMNS run_id UNIQUE;
        "#;
        self.db.query(sql).await?.check()?;
        Ok(())
    }

    async fn fetch(&self, run_id: &str) -> StorageResult<Option<DbCheckpoint>> {
        let rid_owned = run_id.to_string();
        let mut res = self
            .db
            .query("SELECT * FROM checkpoints WHERE run_id = $rid")
            .bind(("rid", rid_owned))
            .await?;
        let rows: Vec<DbCheckpoint> = res.take(0)?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl CheckpointStore for SurrealCheckpointStore {
    async fn save(&self, record: CheckpointRecord) -> StorageResult<()> {
        record.verify()?;
        let row = DbCheckpoint::from_record(&record)?;
        debug!(run_id = %record.run_id, state = %record.state, "saving checkpoint");

        self.db
            .query("DELETE checkpoints WHERE run_id = $rid")
            .bind(("rid", record.run_id.clone()))
            .await?
            .check()?;

        let _created: Option<DbCheckpoint> = self.db.create("checkpoints").content(row).await?;
        Ok(())
    }

    async fn load(&self, run_id: &str) -> StorageResult<CheckpointRecord> {
        let row = self
            .fetch(run_id)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                run_id: run_id.to_string(),
            })?;
        row.verify()?;
        row.into_record()
    }

    async fn list(&self) -> StorageResult<Vec<CheckpointSummary>> {
        let mut res = self
            .db
            .query("SELECT * FROM checkpoints ORDER BY run_id ASC")
            .await?;
        let rows: Vec<DbCheckpoint> = res.take(0)?;
        rows.into_iter()
            .map(|row| {
                let record = row.into_record()?;
                Ok(CheckpointSummary {
                    run_id: record.run_id,
                    state: record.state,
                    updated_at: record.updated_at,
                })
            })
            .collect()
    }

    async fn delete(&self, run_id: &str) -> StorageResult<()> {
        self.db
            .query("DELETE checkpoints WHERE run_id = $rid")
            .bind(("rid", run_id.to_string()))
            .await?
            .check()?;
        Ok(())
    }
}
