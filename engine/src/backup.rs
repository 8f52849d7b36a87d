//! Full-cache backups.
//!
//! A backup is a point-in-time copy of every collection stored under
//! [`BACKUP_KEY`] as plain JSON (never passed through the codec, so it stays
//! readable whatever the encoding settings). Collections are kept in a
//! `BTreeMap` for deterministic serialization.

use crate::{
    collection::CollectionName,
    error::{Error, Result},
    kv::KeyValueStoreExt,
    local::LocalCache,
    locks::CollectionLocks,
    record::{format_timestamp, Record},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Local key holding the most recent backup.
pub const BACKUP_KEY: &str = "tedsai_db_backup";

/// Version of the backup format.
pub const BACKUP_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    /// When the backup was taken (RFC 3339)
    pub timestamp: String,
    pub version: String,
    pub collections: BTreeMap<CollectionName, Vec<Record>>,
}

impl Backup {
    /// Copy every collection out of the cache.
    pub fn capture(cache: &LocalCache, now: DateTime<Utc>) -> Self {
        let collections = CollectionName::ALL
            .into_iter()
            .map(|name| (name, cache.read_collection(name)))
            .collect();

        Self {
            timestamp: format_timestamp(now),
            version: BACKUP_FORMAT_VERSION.to_string(),
            collections,
        }
    }

    pub fn record_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Capture a backup and store it under [`BACKUP_KEY`].
pub fn create_backup(cache: &LocalCache, now: DateTime<Utc>) -> Result<Backup> {
    let backup = Backup::capture(cache, now);
    cache.store().set_json(BACKUP_KEY, &backup)?;
    tracing::info!(records = backup.record_count(), "Backup created");
    Ok(backup)
}

/// Read the stored backup.
pub fn load_backup(cache: &LocalCache) -> Result<Backup> {
    cache
        .store()
        .get_json::<Backup>(BACKUP_KEY)?
        .ok_or(Error::BackupNotFound)
}

/// Write every collection of the stored backup back into the cache.
///
/// Returns how many collections were restored. Collections absent from the
/// backup are left as they are. Each write holds that collection's lock.
pub async fn restore_backup(cache: &LocalCache, locks: &CollectionLocks) -> Result<usize> {
    let backup = load_backup(cache)?;
    let mut restored = 0;
    for (name, records) in &backup.collections {
        let _guard = locks.acquire(*name).await;
        cache.try_write_collection(*name, records)?;
        restored += 1;
    }
    tracing::info!(collections = restored, timestamp = %backup.timestamp, "Backup restored");
    Ok(restored)
}
