//! Record type: a loosely-typed JSON document with a few recognized fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Remote-assigned identifier.
pub const FIELD_ID: &str = "id";
/// Client-generated correlation identifier.
pub const FIELD_LOCAL_ID: &str = "localId";
pub const FIELD_LAST_MODIFIED: &str = "lastModified";
pub const FIELD_CREATED_AT: &str = "createdAt";
pub const FIELD_EXPIRES_AT: &str = "expiresAt";
/// Soft-deletion marker, holds the deletion timestamp.
pub const FIELD_DELETED: &str = "deleted";

/// Prefix for generated local ids.
pub const LOCAL_ID_PREFIX: &str = "local_";

/// A single document of a collection.
///
/// Records are plain JSON objects. Only the fields named by the `FIELD_*`
/// constants carry meaning for sync and cleanup; everything else is payload
/// and passes through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Create a locally-authored record: assigns a fresh `localId` and stamps
    /// `createdAt`/`lastModified` with `now`.
    pub fn new_local(fields: Map<String, Value>, now: DateTime<Utc>) -> Self {
        let mut record = Self(fields);
        record.set(FIELD_LOCAL_ID, Value::String(generate_local_id()));
        let stamp = Value::String(format_timestamp(now));
        record.set(FIELD_CREATED_AT, stamp.clone());
        record.set(FIELD_LAST_MODIFIED, stamp);
        record
    }

    /// Build a record from a remote document, tagging it with its id.
    pub fn from_remote(id: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        fields.insert(FIELD_ID.to_string(), Value::String(id.into()));
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Remote identifier, if the record has been written remotely. An empty
    /// string is not an identifier.
    pub fn id(&self) -> Option<&str> {
        self.str_field(FIELD_ID).filter(|id| !id.is_empty())
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.set(FIELD_ID, Value::String(id.into()));
    }

    pub fn local_id(&self) -> Option<&str> {
        self.str_field(FIELD_LOCAL_ID)
    }

    /// Both identifiers are present.
    pub fn is_reconciled(&self) -> bool {
        self.id().is_some() && self.local_id().is_some()
    }

    /// Only the local identifier is present.
    pub fn is_pending(&self) -> bool {
        self.id().is_none() && self.local_id().is_some()
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.get(FIELD_LAST_MODIFIED).and_then(parse_timestamp)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.get(FIELD_CREATED_AT).and_then(parse_timestamp)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.get(FIELD_EXPIRES_AT).and_then(parse_timestamp)
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.get(FIELD_DELETED).and_then(parse_timestamp)
    }

    /// Timestamp used for last-write-wins: `lastModified`, then `createdAt`,
    /// then the Unix epoch.
    pub fn recency(&self) -> DateTime<Utc> {
        self.last_modified()
            .or_else(|| self.created_at())
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Refresh `lastModified`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.set(FIELD_LAST_MODIFIED, Value::String(format_timestamp(now)));
    }

    /// Soft-delete the record. It stays visible until the cleanup grace
    /// period runs out.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.set(FIELD_DELETED, Value::String(format_timestamp(now)));
        self.touch(now);
    }

    /// Fields as written to the remote store: everything except `id`, which
    /// is the document path there.
    pub fn remote_fields(&self) -> Map<String, Value> {
        let mut fields = self.0.clone();
        fields.remove(FIELD_ID);
        fields
    }

    /// Copy of `base` with every field of `overlay` written on top.
    pub fn overlay(base: &Record, overlay: &Record) -> Record {
        let mut merged = base.0.clone();
        for (key, value) in &overlay.0 {
            merged.insert(key.clone(), value.clone());
        }
        Record(merged)
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }
}

/// Generate a client-side correlation id.
pub fn generate_local_id() -> String {
    format!("{LOCAL_ID_PREFIX}{}", uuid::Uuid::new_v4())
}

/// Format a timestamp the way records store them (`2024-05-01T12:00:00.000Z`).
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339, naive date-times (read as UTC) and bare dates (midnight
/// UTC). Anything else, including non-string values, yields `None`.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
