//! Remote document store seam.
//!
//! The engine only consumes this interface; the host supplies the real
//! backend. [`MemoryRemoteStore`] is an in-process implementation used by
//! tests and for running the engine without a backend.

use crate::collection::CollectionName;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;

/// A document as returned by the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// Failure reported by a remote store (network, permission, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Per-collection document storage with a readiness flag.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Whether the connection is usable. Sync passes are skipped until this
    /// returns true.
    fn is_ready(&self) -> bool;

    /// Every document of a collection.
    async fn get_all(&self, collection: CollectionName)
        -> Result<Vec<RemoteDocument>, RemoteError>;

    /// Write a document at `id`. With `merge`, existing fields absent from
    /// `fields` are kept; otherwise the document is replaced.
    async fn upsert(
        &self,
        collection: CollectionName,
        id: &str,
        fields: Map<String, Value>,
        merge: bool,
    ) -> Result<(), RemoteError>;

    /// Create a document with a store-assigned id and return that id.
    async fn add(
        &self,
        collection: CollectionName,
        fields: Map<String, Value>,
    ) -> Result<String, RemoteError>;

    /// Remove the document at `id`. Removing a missing document succeeds.
    async fn delete(&self, collection: CollectionName, id: &str) -> Result<(), RemoteError>;
}

/// In-memory remote store.
///
/// Documents keep insertion order per collection. Individual collections can
/// be made to fail, and readiness can be toggled, to exercise the sync
/// orchestrator's failure paths.
#[derive(Debug)]
pub struct MemoryRemoteStore {
    collections: DashMap<CollectionName, Vec<RemoteDocument>>,
    failing: DashSet<CollectionName>,
    ready: AtomicBool,
    next_id: AtomicU64,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    /// Create an empty store that reports ready.
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            failing: DashSet::new(),
            ready: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Make every call touching `collection` fail until cleared.
    pub fn fail_collection(&self, collection: CollectionName) {
        self.failing.insert(collection);
    }

    pub fn clear_failures(&self) {
        self.failing.clear();
    }

    /// Seed a document directly.
    pub fn insert(&self, collection: CollectionName, id: impl Into<String>, fields: Value) {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.collections
            .entry(collection)
            .or_default()
            .push(RemoteDocument {
                id: id.into(),
                fields,
            });
    }

    /// Look a document up by id.
    pub fn document(&self, collection: CollectionName, id: &str) -> Option<RemoteDocument> {
        self.collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned())
    }

    pub fn len(&self, collection: CollectionName) -> usize {
        self.collections.get(&collection).map_or(0, |d| d.len())
    }

    pub fn is_empty(&self, collection: CollectionName) -> bool {
        self.len(collection) == 0
    }

    fn check(&self, collection: CollectionName) -> Result<(), RemoteError> {
        if self.failing.contains(&collection) {
            return Err(RemoteError::new(format!(
                "simulated failure for collection '{collection}'"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn get_all(
        &self,
        collection: CollectionName,
    ) -> Result<Vec<RemoteDocument>, RemoteError> {
        self.check(collection)?;
        Ok(self
            .collections
            .get(&collection)
            .map(|docs| docs.value().clone())
            .unwrap_or_default())
    }

    async fn upsert(
        &self,
        collection: CollectionName,
        id: &str,
        fields: Map<String, Value>,
        merge: bool,
    ) -> Result<(), RemoteError> {
        self.check(collection)?;
        let mut docs = self.collections.entry(collection).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(existing) if merge => existing.fields.extend(fields),
            Some(existing) => existing.fields = fields,
            None => docs.push(RemoteDocument {
                id: id.to_string(),
                fields,
            }),
        }
        Ok(())
    }

    async fn add(
        &self,
        collection: CollectionName,
        fields: Map<String, Value>,
    ) -> Result<String, RemoteError> {
        self.check(collection)?;
        let id = format!("doc_{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.collections
            .entry(collection)
            .or_default()
            .push(RemoteDocument {
                id: id.clone(),
                fields,
            });
        Ok(id)
    }

    async fn delete(&self, collection: CollectionName, id: &str) -> Result<(), RemoteError> {
        self.check(collection)?;
        if let Some(mut docs) = self.collections.get_mut(&collection) {
            docs.retain(|d| d.id != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn add_assigns_ids() {
        let remote = MemoryRemoteStore::new();
        let a = remote
            .add(CollectionName::Menu, fields(json!({"dish": "Ndolé"})))
            .await
            .unwrap();
        let b = remote
            .add(CollectionName::Menu, fields(json!({"dish": "Eru"})))
            .await
            .unwrap();
        assert_ne!(a, b);

        let docs = remote.get_all(CollectionName::Menu).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, a);
    }

    #[tokio::test]
    async fn upsert_merge_and_replace() {
        let remote = MemoryRemoteStore::new();
        remote.insert(CollectionName::Menu, "1", json!({"a": 1, "b": 1}));

        remote
            .upsert(CollectionName::Menu, "1", fields(json!({"b": 2})), true)
            .await
            .unwrap();
        assert_eq!(
            remote.document(CollectionName::Menu, "1").unwrap().fields,
            fields(json!({"a": 1, "b": 2}))
        );

        remote
            .upsert(CollectionName::Menu, "1", fields(json!({"c": 3})), false)
            .await
            .unwrap();
        assert_eq!(
            remote.document(CollectionName::Menu, "1").unwrap().fields,
            fields(json!({"c": 3}))
        );

        remote
            .upsert(CollectionName::Menu, "2", fields(json!({"d": 4})), true)
            .await
            .unwrap();
        assert_eq!(remote.len(CollectionName::Menu), 2);
    }

    #[tokio::test]
    async fn delete_removes_only_that_document() {
        let remote = MemoryRemoteStore::new();
        remote.insert(CollectionName::Logs, "1", json!({"a": 1}));
        remote.insert(CollectionName::Logs, "2", json!({"a": 2}));

        remote.delete(CollectionName::Logs, "1").await.unwrap();
        assert!(remote.document(CollectionName::Logs, "1").is_none());
        assert_eq!(remote.len(CollectionName::Logs), 1);

        remote.delete(CollectionName::Logs, "1").await.unwrap();
        remote.delete(CollectionName::Menu, "1").await.unwrap();
        assert_eq!(remote.len(CollectionName::Logs), 1);
    }

    #[tokio::test]
    async fn failure_injection_is_per_collection() {
        let remote = MemoryRemoteStore::new();
        remote.fail_collection(CollectionName::Users);

        assert!(remote.get_all(CollectionName::Users).await.is_err());
        assert!(remote.get_all(CollectionName::Menu).await.is_ok());

        remote.clear_failures();
        assert!(remote.get_all(CollectionName::Users).await.is_ok());
    }

    #[test]
    fn readiness_toggle() {
        let remote = MemoryRemoteStore::new();
        assert!(remote.is_ready());
        remote.set_ready(false);
        assert!(!remote.is_ready());
    }
}
