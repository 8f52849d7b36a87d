//! Cleanup engine: removes expired and long-deleted records, and sweeps
//! temporary cache entries.

use crate::{
    clock::Clock,
    collection::CollectionName,
    local::LocalCache,
    locks::CollectionLocks,
    record::{parse_timestamp, Record, FIELD_EXPIRES_AT},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How long a soft-deleted record is kept before physical removal.
pub const DELETION_GRACE_DAYS: i64 = 7;

/// Key prefixes of temporary entries swept by [`CleanupEngine::cleanup_temp_entries`].
pub const TEMP_KEY_PREFIXES: [&str; 2] = ["tedsai_temp_", "tedsai_cache_"];

/// Whether a record should be physically removed at `now`.
pub fn is_expired(record: &Record, now: DateTime<Utc>) -> bool {
    let past_ttl = record.expires_at().is_some_and(|at| at < now);
    let past_grace = record
        .deleted_at()
        .is_some_and(|at| at < now - Duration::days(DELETION_GRACE_DAYS));
    past_ttl || past_grace
}

/// Split out expired records, keeping survivors in their original order.
///
/// Returns the survivors and how many records were dropped.
pub fn remove_expired(records: Vec<Record>, now: DateTime<Utc>) -> (Vec<Record>, usize) {
    let before = records.len();
    let kept: Vec<Record> = records
        .into_iter()
        .filter(|r| !is_expired(r, now))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Counts from a full cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Records removed per collection, only collections with removals
    pub collections: BTreeMap<CollectionName, usize>,
    pub temp_entries: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.collections.values().sum::<usize>() + self.temp_entries
    }
}

pub struct CleanupEngine {
    cache: Arc<LocalCache>,
    clock: Arc<dyn Clock>,
    locks: Arc<CollectionLocks>,
}

impl CleanupEngine {
    pub fn new(cache: Arc<LocalCache>, clock: Arc<dyn Clock>, locks: Arc<CollectionLocks>) -> Self {
        Self {
            cache,
            clock,
            locks,
        }
    }

    /// Remove expired records from one collection.
    ///
    /// The collection is only rewritten when something was removed.
    pub async fn cleanup_collection(&self, collection: CollectionName) -> usize {
        let _guard = self.locks.acquire(collection).await;

        let records = self.cache.read_collection(collection);
        let (kept, removed) = remove_expired(records, self.clock.now());

        if removed > 0 {
            self.cache.write_collection(collection, &kept);
            tracing::debug!(collection = %collection, removed, "Removed expired records");
        }
        removed
    }

    /// Delete temporary entries that have expired or cannot be parsed.
    pub fn cleanup_temp_entries(&self) -> usize {
        let store = self.cache.store();
        let keys = match store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list local keys");
                return 0;
            }
        };

        let now = self.clock.now();
        let mut removed = 0;

        for key in keys
            .iter()
            .filter(|k| TEMP_KEY_PREFIXES.iter().any(|p| k.starts_with(*p)))
        {
            let raw = match store.get(key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to read temporary entry");
                    continue;
                }
            };

            let stale = match serde_json::from_str::<Value>(&raw) {
                Ok(value) => value
                    .get(FIELD_EXPIRES_AT)
                    .and_then(parse_timestamp)
                    .is_some_and(|at| at < now),
                Err(_) => {
                    tracing::debug!(key = %key, "Dropping corrupted temporary entry");
                    true
                }
            };

            if stale {
                match store.remove(key) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!(key = %key, error = %e, "Failed to remove entry"),
                }
            }
        }

        removed
    }

    /// Clean every collection and the temporary entries.
    pub async fn cleanup_all(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for collection in CollectionName::ALL {
            let removed = self.cleanup_collection(collection).await;
            if removed > 0 {
                report.collections.insert(collection, removed);
            }
        }
        report.temp_entries = self.cleanup_temp_entries();

        if report.total() > 0 {
            tracing::info!(removed = report.total(), "Cleanup pass complete");
        }
        report
    }
}
