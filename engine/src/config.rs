//! Optimizer configuration.
//!
//! Defaults can be overridden by a JSON object stored under
//! [`SETTINGS_KEY`]; only the fields present there replace the defaults.

use crate::kv::{KeyValueStore, KeyValueStoreExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Local key holding configuration overrides.
pub const SETTINGS_KEY: &str = "tedsai_db_optimizer_settings";

/// 5 MiB, a typical browser local storage allowance.
pub const DEFAULT_MAX_LOCAL_STORAGE_SIZE: u64 = 5 * 1024 * 1024;
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 30 * 60 * 1000;
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 10 * 60 * 1000;
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Tunables for the optimizer service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizerConfig {
    /// Local storage budget in bytes
    pub max_local_storage_size: u64,
    /// Milliseconds between cleanup passes
    pub cleanup_interval: u64,
    /// Milliseconds between remote sync passes
    pub sync_interval: u64,
    /// Milliseconds between storage size checks
    pub monitor_interval: u64,
    /// Reserved; writes are currently issued one record at a time
    pub batch_size: usize,
    /// Strip null and empty fields before storing
    pub compression_enabled: bool,
    /// Base64-wrap stored values. This is not encryption.
    #[serde(alias = "encryptionEnabled")]
    pub encoding_enabled: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_local_storage_size: DEFAULT_MAX_LOCAL_STORAGE_SIZE,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL_MS,
            sync_interval: DEFAULT_SYNC_INTERVAL_MS,
            monitor_interval: DEFAULT_MONITOR_INTERVAL_MS,
            batch_size: DEFAULT_BATCH_SIZE,
            compression_enabled: false,
            encoding_enabled: false,
        }
    }
}

impl OptimizerConfig {
    /// Defaults with any stored overrides applied.
    ///
    /// Unreadable or malformed overrides are logged and ignored.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        match store.get_json::<OptimizerConfig>(SETTINGS_KEY) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable optimizer settings");
                Self::default()
            }
        }
    }

    /// Persist this configuration as the stored overrides.
    pub fn save(&self, store: &dyn KeyValueStore) -> crate::error::Result<()> {
        store.set_json(SETTINGS_KEY, self)
    }

    /// This configuration with the fields present in `patch` replaced.
    /// Fields absent from `patch` keep their current value.
    pub fn with_overrides(&self, patch: Map<String, Value>) -> crate::error::Result<Self> {
        let mut fields = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if patch.contains_key("encryptionEnabled") {
            fields.remove("encodingEnabled");
        }
        fields.extend(patch);
        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    pub fn cleanup_period(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval)
    }

    pub fn sync_period(&self) -> Duration {
        Duration::from_millis(self.sync_interval)
    }

    pub fn monitor_period(&self) -> Duration {
        Duration::from_millis(self.monitor_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    #[test]
    fn defaults() {
        let config = OptimizerConfig::default();
        assert_eq!(config.max_local_storage_size, 5 * 1024 * 1024);
        assert_eq!(config.cleanup_period(), Duration::from_secs(30 * 60));
        assert_eq!(config.sync_period(), Duration::from_secs(5 * 60));
        assert_eq!(config.monitor_period(), Duration::from_secs(10 * 60));
        assert!(!config.compression_enabled);
        assert!(!config.encoding_enabled);
    }

    #[test]
    fn partial_overrides() {
        let store = MemoryStore::new();
        store
            .set(SETTINGS_KEY, r#"{"syncInterval": 60000, "encryptionEnabled": true}"#)
            .unwrap();

        let config = OptimizerConfig::load(&store);
        assert_eq!(config.sync_interval, 60_000);
        assert!(config.encoding_enabled);
        assert_eq!(config.cleanup_interval, DEFAULT_CLEANUP_INTERVAL_MS);
    }

    #[test]
    fn overrides_keep_unnamed_fields() {
        let current = OptimizerConfig {
            compression_enabled: true,
            max_local_storage_size: 1024,
            ..OptimizerConfig::default()
        };
        let patch = serde_json::json!({"syncInterval": 60000, "encryptionEnabled": true});
        let Value::Object(patch) = patch else {
            unreachable!()
        };

        let updated = current.with_overrides(patch).unwrap();
        assert_eq!(updated.sync_interval, 60_000);
        assert!(updated.encoding_enabled);
        assert!(updated.compression_enabled);
        assert_eq!(updated.max_local_storage_size, 1024);

        let mut bad = Map::new();
        bad.insert("syncInterval".into(), serde_json::json!("soon"));
        assert!(current.with_overrides(bad).is_err());
    }

    #[test]
    fn malformed_overrides_fall_back() {
        let store = MemoryStore::new();
        store.set(SETTINGS_KEY, "not json").unwrap();
        assert_eq!(OptimizerConfig::load(&store), OptimizerConfig::default());
    }

    #[test]
    fn save_and_load() {
        let store = MemoryStore::new();
        let config = OptimizerConfig {
            compression_enabled: true,
            max_local_storage_size: 1024,
            ..OptimizerConfig::default()
        };
        config.save(&store).unwrap();

        let raw = store.get(SETTINGS_KEY).unwrap().unwrap();
        assert!(raw.contains("\"maxLocalStorageSize\":1024"));
        assert_eq!(OptimizerConfig::load(&store), config);
    }
}
