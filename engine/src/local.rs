//! Local cache: per-collection record lists kept in a [`KeyValueStore`].
//!
//! Each collection lives under its own key as an array of records, passed
//! through the configured [`Codec`]. Storage failures never propagate out of
//! the lenient accessors: reads degrade to an empty list and writes report
//! `false`, with the cause logged.

use crate::{
    codec::Codec,
    collection::CollectionName,
    error::{Error, Result},
    kv::KeyValueStore,
    record::Record,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};

/// Collection cache over a key-value store.
pub struct LocalCache {
    store: Arc<dyn KeyValueStore>,
    codec: RwLock<Codec>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn KeyValueStore>, codec: Codec) -> Self {
        Self {
            store,
            codec: RwLock::new(codec),
        }
    }

    /// The underlying key-value store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn codec(&self) -> Codec {
        *self.codec.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap the codec used for subsequent reads and writes.
    pub fn set_codec(&self, codec: Codec) {
        *self.codec.write().unwrap_or_else(PoisonError::into_inner) = codec;
    }

    /// Read a collection, failing on storage or decoding errors.
    pub fn try_read_collection(&self, name: CollectionName) -> Result<Vec<Record>> {
        let key = name.storage_key();
        let Some(raw) = self.store.get(&key)? else {
            return Ok(Vec::new());
        };

        match self.codec().decode(&raw)? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).map_err(Error::from))
                .collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(Error::storage(
                key,
                format!("expected an array of records, found {}", json_kind(&other)),
            )),
        }
    }

    /// Read a collection; missing or unreadable data yields an empty list.
    pub fn read_collection(&self, name: CollectionName) -> Vec<Record> {
        self.try_read_collection(name).unwrap_or_else(|e| {
            tracing::warn!(collection = %name, error = %e, "Failed to read local collection");
            Vec::new()
        })
    }

    /// Replace a collection, failing on storage or encoding errors.
    pub fn try_write_collection(&self, name: CollectionName, records: &[Record]) -> Result<()> {
        let value = serde_json::to_value(records)?;
        let raw = self.codec().encode(&value)?;
        self.store.set(&name.storage_key(), &raw)
    }

    /// Replace a collection; returns whether the write succeeded.
    pub fn write_collection(&self, name: CollectionName, records: &[Record]) -> bool {
        match self.try_write_collection(name, records) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(collection = %name, error = %e, "Failed to write local collection");
                false
            }
        }
    }

    /// Find a record by `id` or `localId`.
    pub fn get(&self, name: CollectionName, key: &str) -> Option<Record> {
        self.read_collection(name)
            .into_iter()
            .find(|r| matches_key(r, key))
    }

    /// Insert or replace a record, matching on `id` then `localId`.
    pub fn upsert(&self, name: CollectionName, record: Record) -> bool {
        let mut records = self.read_collection(name);

        let position = record
            .id()
            .and_then(|id| records.iter().position(|r| r.id() == Some(id)))
            .or_else(|| {
                record
                    .local_id()
                    .and_then(|lid| records.iter().position(|r| r.local_id() == Some(lid)))
            });

        match position {
            Some(index) => records[index] = record,
            None => records.push(record),
        }
        self.write_collection(name, &records)
    }

    /// Soft-delete the record whose `id` or `localId` equals `key`.
    ///
    /// Returns false when no such record exists or the write failed.
    pub fn soft_delete(&self, name: CollectionName, key: &str, now: DateTime<Utc>) -> bool {
        let mut records = self.read_collection(name);
        let Some(record) = records.iter_mut().find(|r| matches_key(r, key)) else {
            return false;
        };
        record.mark_deleted(now);
        self.write_collection(name, &records)
    }

    /// Stored size in bytes of a key's raw value, zero when absent or
    /// unreadable.
    pub fn raw_size(&self, key: &str) -> usize {
        match self.store.get(key) {
            Ok(Some(raw)) => raw.len(),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read key size");
                0
            }
        }
    }
}

fn matches_key(record: &Record, key: &str) -> bool {
    record.id() == Some(key) || record.local_id() == Some(key)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
