//! Evidence aggregation.
//!
//! `aggregate` is pure: the same records and required set always yield the
//! same bundle, whatever order the collectors finished in.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{EvidenceBundle, EvidenceKind, EvidenceRecord, EvidenceStatus};

/// Preference rank of a record when several arrive for one kind.
fn rank(status: &EvidenceStatus) -> u8 {
    match status {
        EvidenceStatus::Ok => 2,
        EvidenceStatus::Failed { .. } => 1,
        EvidenceStatus::Skipped { .. } => 0,
    }
}

/// Merge records into a bundle, one record per kind.
///
/// Per kind: the most recent `ok` record wins (highest `attempt`, then later
/// position); without one, the first `failed` record; without one, the first
/// `skipped` record. `missing` is `required` minus the kinds with an `ok`
/// record. Absence is never an error.
pub fn aggregate(
    records: impl IntoIterator<Item = EvidenceRecord>,
    required: &BTreeSet<EvidenceKind>,
    attempt: u32,
) -> EvidenceBundle {
    let mut merged: BTreeMap<EvidenceKind, EvidenceRecord> = BTreeMap::new();

    for record in records {
        match merged.get(&record.kind) {
            None => {
                merged.insert(record.kind, record);
            }
            Some(current) => {
                let (new_rank, cur_rank) = (rank(&record.status), rank(&current.status));
                let replace = new_rank > cur_rank
                    || (new_rank == cur_rank && record.is_ok() && record.attempt >= current.attempt);
                if replace {
                    merged.insert(record.kind, record);
                }
            }
        }
    }

    EvidenceBundle::from_parts(merged, required.clone(), attempt)
}
