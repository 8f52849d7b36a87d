//! Merge engine: reconciles a local and a remote snapshot of one collection.
//!
//! # Algorithm
//!
//! 1. Start from a copy of the remote list (remote order is the baseline)
//! 2. For each local record, look for an entry with the same `id`, or failing
//!    that the same `localId`
//! 3. Unmatched local records are appended
//! 4. Matched records are combined; the side with the strictly later
//!    recency timestamp wins every conflicting field, ties go to remote.
//!    The matched entry's `id` is always kept
//!
//! # Limitations
//!
//! This is whole-record last-write-wins, not a field-level merge. When both
//! sides edit different fields concurrently, the later side's values win
//! every field both sides carry. That is acceptable for catalog data edited
//! by a single administrator; it is not a safe protocol for multiple
//! concurrent writers.

use crate::record::Record;
use serde::{Deserialize, Serialize};

/// Which side supplied the winning field values for a matched pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeResolution {
    LocalWins,
    RemoteWins,
}

/// Counts describing what a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    /// Local records with no remote counterpart
    pub appended: usize,
    /// Matched pairs where local was newer
    pub local_wins: usize,
    /// Matched pairs where remote was newer or equal
    pub remote_wins: usize,
}

/// Merge local and remote records.
///
/// Pure; the inputs are not modified.
pub fn merge(local: &[Record], remote: &[Record]) -> Vec<Record> {
    merge_with_summary(local, remote).0
}

/// [`merge`], also reporting how each local record was handled.
pub fn merge_with_summary(local: &[Record], remote: &[Record]) -> (Vec<Record>, MergeSummary) {
    let mut merged: Vec<Record> = remote.to_vec();
    let mut summary = MergeSummary::default();

    for local_record in local {
        match find_match(&merged, local_record) {
            None => {
                merged.push(local_record.clone());
                summary.appended += 1;
            }
            Some(index) => {
                let (mut combined, resolution) = resolve(local_record, &merged[index]);
                // A localId match may pair a stale local id with the real one
                if let Some(id) = merged[index].id() {
                    combined.set_id(id.to_string());
                }
                merged[index] = combined;
                match resolution {
                    MergeResolution::LocalWins => summary.local_wins += 1,
                    MergeResolution::RemoteWins => summary.remote_wins += 1,
                }
            }
        }
    }

    (merged, summary)
}

/// Combine a matched pair.
pub fn resolve(local: &Record, remote: &Record) -> (Record, MergeResolution) {
    if local.recency() > remote.recency() {
        (Record::overlay(remote, local), MergeResolution::LocalWins)
    } else {
        (Record::overlay(local, remote), MergeResolution::RemoteWins)
    }
}

/// Index of the entry `record` should merge into: same `id` first, then same
/// `localId`. A missing key on `record` never matches.
fn find_match(candidates: &[Record], record: &Record) -> Option<usize> {
    let by_id = record
        .id()
        .and_then(|id| candidates.iter().position(|c| c.id() == Some(id)));

    by_id.or_else(|| {
        record
            .local_id()
            .and_then(|lid| candidates.iter().position(|c| c.local_id() == Some(lid)))
    })
}
