//! Sync orchestrator: pushes and pulls every collection through the merge
//! engine.
//!
//! A pass handles collections one after another. For each it reads the local
//! list and all remote documents, merges them, writes every merged record
//! back to the remote store and stores the merged list locally. Records that
//! have never reached the remote store are created there and the assigned id
//! is copied back onto the local record.
//!
//! Records the cleanup engine would remove are dropped from the merged list
//! and deleted from the remote store, so a pass never brings back a record
//! that cleanup already pruned locally.
//!
//! A failure aborts only the collection it happened in; the pass moves on to
//! the next one. There is no retry, the next scheduled pass is the retry.
//! Local-only records are not durable until a pass succeeds for their
//! collection.

use crate::{
    cleanup,
    clock::Clock,
    collection::CollectionName,
    error::{Error, Result},
    local::LocalCache,
    locks::CollectionLocks,
    merge::{merge_with_summary, MergeSummary},
    record::Record,
    remote::RemoteStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a successful collection sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSyncStats {
    /// Records in the merged list
    pub merged: usize,
    /// Existing remote documents written
    pub upserted: usize,
    /// New remote documents created
    pub created: usize,
    /// Expired records deleted instead of written
    pub removed: usize,
    pub summary: MergeSummary,
}

/// Result of syncing a single collection within a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum SyncOutcome {
    Synced(CollectionSyncStats),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSyncResult {
    pub collection: CollectionName,
    pub outcome: SyncOutcome,
}

/// Result of a full sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// The remote store was not ready, nothing was touched
    pub skipped: bool,
    pub collections: Vec<CollectionSyncResult>,
}

impl SyncReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            collections: Vec::new(),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.collections
            .iter()
            .filter(|c| matches!(c.outcome, SyncOutcome::Failed { .. }))
            .count()
    }

    pub fn outcome(&self, collection: CollectionName) -> Option<&SyncOutcome> {
        self.collections
            .iter()
            .find(|c| c.collection == collection)
            .map(|c| &c.outcome)
    }
}

/// Drives reconciliation between the local cache and the remote store.
pub struct SyncOrchestrator {
    cache: Arc<LocalCache>,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    locks: Arc<CollectionLocks>,
    collections: Vec<CollectionName>,
}

impl SyncOrchestrator {
    /// Create an orchestrator covering every known collection.
    pub fn new(
        cache: Arc<LocalCache>,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        locks: Arc<CollectionLocks>,
    ) -> Self {
        Self {
            cache,
            remote,
            clock,
            locks,
            collections: CollectionName::ALL.to_vec(),
        }
    }

    /// Restrict passes to the given collections, processed in this order.
    pub fn with_collections(mut self, collections: Vec<CollectionName>) -> Self {
        self.collections = collections;
        self
    }

    /// Run a full pass over every configured collection.
    ///
    /// Skipped entirely when the remote store is not ready.
    pub async fn sync_all(&self) -> SyncReport {
        if !self.remote.is_ready() {
            tracing::warn!("Remote store not ready, skipping sync pass");
            return SyncReport::skipped();
        }

        let mut report = SyncReport::default();
        for &collection in &self.collections {
            let outcome = match self.sync_collection(collection).await {
                Ok(stats) => {
                    tracing::debug!(
                        collection = %collection,
                        merged = stats.merged,
                        upserted = stats.upserted,
                        created = stats.created,
                        removed = stats.removed,
                        "Collection synced"
                    );
                    SyncOutcome::Synced(stats)
                }
                Err(e) => {
                    tracing::error!(collection = %collection, error = %e, "Collection sync failed");
                    SyncOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.collections.push(CollectionSyncResult {
                collection,
                outcome,
            });
        }

        tracing::info!(
            collections = report.collections.len(),
            failed = report.failed_count(),
            "Sync pass complete"
        );
        report
    }

    /// Reconcile one collection with the remote store.
    pub async fn sync_collection(&self, collection: CollectionName) -> Result<CollectionSyncStats> {
        if !self.remote.is_ready() {
            return Err(Error::RemoteNotReady);
        }

        let _guard = self.locks.acquire(collection).await;

        let mut local = self.cache.read_collection(collection);
        let remote: Vec<Record> = self
            .remote
            .get_all(collection)
            .await?
            .into_iter()
            .map(|doc| Record::from_remote(doc.id, doc.fields))
            .collect();

        let (merged, summary) = merge_with_summary(&local, &remote);
        let now = self.clock.now();
        let (expired, mut merged): (Vec<Record>, Vec<Record>) = merged
            .into_iter()
            .partition(|r| cleanup::is_expired(r, now));
        let mut stats = CollectionSyncStats {
            merged: merged.len(),
            summary,
            ..CollectionSyncStats::default()
        };

        for id in expired.iter().filter_map(Record::id) {
            self.remote.delete(collection, id).await?;
            stats.removed += 1;
        }

        for record in &mut merged {
            if let Some(id) = record.id().map(str::to_string) {
                self.remote
                    .upsert(collection, &id, record.remote_fields(), true)
                    .await?;
                stats.upserted += 1;
                continue;
            }

            let new_id = self.remote.add(collection, record.remote_fields()).await?;
            stats.created += 1;

            if let Some(local_id) = record.local_id().map(str::to_string) {
                if let Some(pending) = local
                    .iter_mut()
                    .find(|r| r.local_id() == Some(local_id.as_str()))
                {
                    pending.set_id(new_id.clone());
                    self.cache.write_collection(collection, &local);
                }
            }
            record.set_id(new_id);
        }

        self.cache.write_collection(collection, &merged);
        Ok(stats)
    }
}
