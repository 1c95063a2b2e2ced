//! tribunal-state: checkpoint persistence for audit runs
//!
//! Layer 0 of the tribunal workspace. The pipeline controller serializes its
//! run state after every transition and hands it to a [`CheckpointStore`];
//! on restart it loads the checkpoint and resumes from the recorded state.
//!
//! ## Key Components
//!
//! - `CheckpointStore`: async storage trait with digest-verified loads
//! - `MemoryCheckpointStore`: in-memory fake for tests
//! - `SurrealCheckpointStore`: SurrealDB backend (`mem://`, `surrealkv://`, remote)

mod error;
pub mod fakes;
pub mod storage_traits;
pub mod surreal_store;

pub use error::StorageError;
pub use storage_traits::{
    CheckpointRecord, CheckpointStore, CheckpointSummary, ContentDigest, StorageResult,
};
pub use surreal_store::SurrealCheckpointStore;
