//! # TEDSAI Engine
//!
//! Keeps a local cache of site data collections reconciled with a remote
//! document store.
//!
//! Each collection (menu, reservations, blog posts, ...) is held locally as
//! a list of JSON records under its own key, so the site keeps working when
//! the remote store is unreachable. Periodic passes reconcile the two sides,
//! prune expired data and watch storage usage.
//!
//! ## Design Principles
//!
//! - **Injected IO**: local storage, the remote store and the clock are
//!   traits ([`KeyValueStore`], [`RemoteStore`], [`Clock`])
//! - **Pure merge**: [`merge`] has no side effects and is deterministic
//! - **Local first**: local storage failures degrade to empty reads, remote
//!   failures only abort the collection they happened in
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] is a JSON object with a few recognized fields: `id` (assigned
//! by the remote store), `localId` (assigned on the client before the first
//! sync), `lastModified`/`createdAt` for recency, `expiresAt` for a TTL and
//! `deleted` as a soft-delete marker.
//!
//! ### Merge
//!
//! [`merge`] matches local records to remote ones by `id`, then `localId`.
//! The more recently modified side wins on conflicting fields; fields only
//! one side has survive. This is whole-record last-write-wins, not a CRDT:
//! concurrent edits to different fields of one record keep only the newer
//! side's values for the fields both sides carry.
//!
//! ### Sync, cleanup and monitoring
//!
//! [`SyncOrchestrator`] runs a pass over every collection, [`CleanupEngine`]
//! removes expired and long-deleted records, and [`StorageStats`] reports
//! usage with recommendations. [`DatabaseOptimizer`] wires these together
//! behind three periodic timers.
//!
//! ## Quick Start
//!
//! ```rust
//! use tedsai_engine::{merge, Codec, CollectionName, LocalCache, MemoryStore, Record};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let cache = LocalCache::new(Arc::new(MemoryStore::new()), Codec::default());
//!
//! let local: Vec<Record> = serde_json::from_value(json!([
//!     {"id": "r1", "guests": 4, "lastModified": "2024-05-02T10:00:00Z"},
//!     {"localId": "local_x", "guests": 2}
//! ])).unwrap();
//! let remote: Vec<Record> = serde_json::from_value(json!([
//!     {"id": "r1", "guests": 3, "table": 7, "lastModified": "2024-05-01T10:00:00Z"}
//! ])).unwrap();
//!
//! let merged = merge(&local, &remote);
//! assert_eq!(merged.len(), 2);
//! assert_eq!(merged[0].get("guests"), Some(&json!(4)));
//! assert_eq!(merged[0].get("table"), Some(&json!(7)));
//!
//! cache.write_collection(CollectionName::Reservations, &merged);
//! assert_eq!(cache.read_collection(CollectionName::Reservations), merged);
//! ```

pub mod backup;
pub mod cleanup;
pub mod clock;
pub mod codec;
pub mod collection;
pub mod config;
pub mod error;
pub mod kv;
pub mod local;
pub mod locks;
pub mod merge;
pub mod optimizer;
pub mod record;
pub mod remote;
pub mod scheduler;
pub mod stats;
pub mod sync;

// Re-export main types at crate root
pub use backup::{Backup, BACKUP_FORMAT_VERSION, BACKUP_KEY};
pub use cleanup::{CleanupEngine, CleanupReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::Codec;
pub use collection::CollectionName;
pub use config::{OptimizerConfig, SETTINGS_KEY};
pub use error::{Error, Result};
pub use kv::{FileStore, KeyValueStore, KeyValueStoreExt, MemoryStore};
pub use local::LocalCache;
pub use locks::CollectionLocks;
pub use merge::{merge, merge_with_summary, MergeResolution, MergeSummary};
pub use optimizer::DatabaseOptimizer;
pub use record::Record;
pub use remote::{MemoryRemoteStore, RemoteDocument, RemoteError, RemoteStore};
pub use scheduler::PeriodicTask;
pub use stats::{Priority, Recommendation, StorageStats};
pub use sync::{CollectionSyncResult, CollectionSyncStats, SyncOrchestrator, SyncOutcome, SyncReport};
