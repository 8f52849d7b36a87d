//! Storage statistics and advisory recommendations.
//!
//! Read-only: computing statistics never modifies storage.

use crate::{
    collection::{CollectionName, KEY_PREFIX},
    config::OptimizerConfig,
    local::LocalCache,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Share of the storage budget above which a high-priority warning is raised.
pub const HIGH_USAGE_RATIO: f64 = 0.8;
/// Per-collection size above which a medium-priority warning is raised.
pub const LARGE_COLLECTION_BYTES: u64 = 100 * 1024;
/// Sync interval above which a low-priority warning is raised.
pub const SLOW_SYNC_INTERVAL_MS: u64 = 10 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionName>,
    pub message: String,
}

/// Snapshot of local storage usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    /// Bytes used by every engine key
    pub total_size: u64,
    /// Bytes used per collection key
    pub collections: BTreeMap<CollectionName, u64>,
    /// Bytes used by other engine keys (settings, backup, temporary entries)
    pub other_size: u64,
    pub max_size: u64,
    /// `total_size / max_size`
    pub usage_ratio: f64,
    pub recommendations: Vec<Recommendation>,
}

impl StorageStats {
    /// Measure the cache and derive recommendations.
    pub fn collect(cache: &LocalCache, config: &OptimizerConfig) -> Self {
        let mut collections = BTreeMap::new();
        for collection in CollectionName::ALL {
            let size = cache.raw_size(&collection.storage_key()) as u64;
            collections.insert(collection, size);
        }

        let other_size = match cache.store().keys() {
            Ok(keys) => keys
                .iter()
                .filter(|k| k.starts_with(KEY_PREFIX))
                .filter(|k| CollectionName::from_storage_key(k).is_none())
                .map(|k| cache.raw_size(k) as u64)
                .sum(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list local keys");
                0
            }
        };

        Self::from_sizes(collections, other_size, config)
    }

    /// Build statistics from already measured sizes.
    pub fn from_sizes(
        collections: BTreeMap<CollectionName, u64>,
        other_size: u64,
        config: &OptimizerConfig,
    ) -> Self {
        let total_size = collections.values().sum::<u64>() + other_size;
        let max_size = config.max_local_storage_size;
        let usage_ratio = if max_size == 0 {
            0.0
        } else {
            total_size as f64 / max_size as f64
        };
        let recommendations = recommend(&collections, total_size, config);

        Self {
            total_size,
            collections,
            other_size,
            max_size,
            usage_ratio,
            recommendations,
        }
    }

    pub fn has_high_priority(&self) -> bool {
        self.recommendations
            .iter()
            .any(|r| r.priority == Priority::High)
    }
}

/// Derive recommendations from measured sizes and the configuration.
pub fn recommend(
    collections: &BTreeMap<CollectionName, u64>,
    total_size: u64,
    config: &OptimizerConfig,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    let threshold = config.max_local_storage_size as f64 * HIGH_USAGE_RATIO;
    if total_size as f64 > threshold {
        recommendations.push(Recommendation {
            priority: Priority::High,
            collection: None,
            message: format!(
                "Local storage at {total_size} of {} bytes; run a cleanup",
                config.max_local_storage_size
            ),
        });
    }

    for (&collection, &size) in collections {
        if size > LARGE_COLLECTION_BYTES {
            recommendations.push(Recommendation {
                priority: Priority::Medium,
                collection: Some(collection),
                message: format!(
                    "Collection '{collection}' uses {} KiB; consider archiving old records",
                    size / 1024
                ),
            });
        }
    }

    if config.sync_interval > SLOW_SYNC_INTERVAL_MS {
        recommendations.push(Recommendation {
            priority: Priority::Low,
            collection: None,
            message: format!(
                "Sync interval of {} minutes risks losing unsynced local records",
                config.sync_interval / 60_000
            ),
        });
    }

    recommendations
}
