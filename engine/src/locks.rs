//! Per-collection mutual exclusion.
//!
//! Sync and cleanup both read a collection, work on it, and write it back.
//! Holding the collection's lock for the whole read-modify-write keeps one
//! from overwriting the other's result. Locks are process-local; two
//! processes sharing a backing store can still race.

use crate::collection::CollectionName;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct CollectionLocks {
    locks: DashMap<CollectionName, Arc<Mutex<()>>>,
}

impl CollectionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a collection.
    pub async fn acquire(&self, name: CollectionName) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(name).or_default().clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_collection_is_exclusive() {
        let locks = CollectionLocks::new();
        let guard = locks.acquire(CollectionName::Menu).await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire(CollectionName::Menu))
                .await;
        assert!(blocked.is_err());

        drop(guard);
        let _again = locks.acquire(CollectionName::Menu).await;
    }

    #[tokio::test]
    async fn different_collections_do_not_block() {
        let locks = CollectionLocks::new();
        let _menu = locks.acquire(CollectionName::Menu).await;
        let users =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire(CollectionName::Users))
                .await;
        assert!(users.is_ok());
    }
}
