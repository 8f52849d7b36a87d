//! The optimizer service.
//!
//! [`DatabaseOptimizer`] owns the local cache, the sync orchestrator and the
//! cleanup engine, and runs three periodic timers over them:
//!
//! - cleanup: expired records and temporary entries
//! - sync: a full pass against the remote store
//! - monitor: storage statistics, with an immediate cleanup when storage runs
//!   high
//!
//! Every collaborator is injected, so a host can run several independent
//! instances. A failing pass in one timer is logged and never stops the
//! others.

use crate::{
    backup::{self, Backup},
    cleanup::{CleanupEngine, CleanupReport},
    clock::Clock,
    codec::Codec,
    collection::CollectionName,
    config::OptimizerConfig,
    error::Result,
    kv::KeyValueStore,
    local::LocalCache,
    locks::CollectionLocks,
    record::Record,
    remote::RemoteStore,
    scheduler::PeriodicTask,
    stats::{Priority, StorageStats},
    sync::{SyncOrchestrator, SyncReport},
};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

fn codec_for(config: &OptimizerConfig) -> Codec {
    Codec::new(config.compression_enabled, config.encoding_enabled)
}

pub struct DatabaseOptimizer {
    cache: Arc<LocalCache>,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    locks: Arc<CollectionLocks>,
    sync: Arc<SyncOrchestrator>,
    cleanup: Arc<CleanupEngine>,
    config: RwLock<OptimizerConfig>,
    tasks: Mutex<Vec<PeriodicTask>>,
}

impl DatabaseOptimizer {
    /// Build the service over the given stores. No timer runs until
    /// [`init`](Self::init).
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = OptimizerConfig::load(store.as_ref());
        let cache = Arc::new(LocalCache::new(store, codec_for(&config)));
        let locks = Arc::new(CollectionLocks::new());
        let sync = Arc::new(SyncOrchestrator::new(
            cache.clone(),
            remote.clone(),
            clock.clone(),
            locks.clone(),
        ));
        let cleanup = Arc::new(CleanupEngine::new(
            cache.clone(),
            clock.clone(),
            locks.clone(),
        ));

        Self {
            cache,
            remote,
            clock,
            locks,
            sync,
            cleanup,
            config: RwLock::new(config),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Load stored settings and start the periodic timers.
    ///
    /// Must be called from within a tokio runtime. Calling it again while
    /// the timers run has no effect.
    pub fn init(&self) {
        if self.is_running() {
            tracing::warn!("Optimizer already running");
            return;
        }

        let config = OptimizerConfig::load(self.cache.store().as_ref());
        self.apply_config(config.clone());
        self.start_timers(&config);

        tracing::info!(
            sync_interval_ms = config.sync_interval,
            cleanup_interval_ms = config.cleanup_interval,
            monitor_interval_ms = config.monitor_interval,
            remote_ready = self.remote.is_ready(),
            "Database optimizer started"
        );
    }

    /// Stop every timer, letting passes in flight finish.
    pub async fn shutdown(&self) {
        let tasks = self.take_tasks();
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            task.cancel().await;
        }
        tracing::info!("Database optimizer stopped");
    }

    pub fn is_running(&self) -> bool {
        !self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn remote_ready(&self) -> bool {
        self.remote.is_ready()
    }

    pub fn config(&self) -> OptimizerConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Persist new settings and apply them. Running timers are restarted
    /// with the new intervals.
    pub async fn update_settings(&self, config: OptimizerConfig) -> Result<()> {
        config.save(self.cache.store().as_ref())?;
        self.apply_config(config.clone());

        let tasks = self.take_tasks();
        if !tasks.is_empty() {
            for task in tasks {
                task.cancel().await;
            }
            self.start_timers(&config);
        }
        tracing::info!("Optimizer settings updated");
        Ok(())
    }

    pub fn cache(&self) -> &Arc<LocalCache> {
        &self.cache
    }

    pub fn read_collection(&self, collection: CollectionName) -> Vec<Record> {
        self.cache.read_collection(collection)
    }

    /// Run a sync pass now.
    pub async fn sync_now(&self) -> SyncReport {
        self.sync.sync_all().await
    }

    /// Run a cleanup pass now.
    pub async fn cleanup_now(&self) -> CleanupReport {
        self.cleanup.cleanup_all().await
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats::collect(&self.cache, &self.config())
    }

    /// Check storage usage, cleaning up right away when it runs high.
    pub async fn monitor_now(&self) -> StorageStats {
        monitor(&self.cache, &self.cleanup, &self.config()).await
    }

    pub fn create_backup(&self) -> Result<Backup> {
        backup::create_backup(&self.cache, self.clock.now())
    }

    /// Restore the stored backup; returns the number of collections written.
    pub async fn restore_backup(&self) -> Result<usize> {
        backup::restore_backup(&self.cache, &self.locks).await
    }

    /// Every collection as a pretty-printed backup document.
    pub fn export_json(&self) -> Result<String> {
        Backup::capture(&self.cache, self.clock.now()).to_json_pretty()
    }

    fn apply_config(&self, config: OptimizerConfig) {
        self.cache.set_codec(codec_for(&config));
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    fn take_tasks(&self) -> Vec<PeriodicTask> {
        std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn start_timers(&self, config: &OptimizerConfig) {
        let cleanup = self.cleanup.clone();
        let cleanup_task = PeriodicTask::spawn("cleanup", config.cleanup_period(), move || {
            let cleanup = cleanup.clone();
            async move {
                cleanup.cleanup_all().await;
            }
        });

        let sync = self.sync.clone();
        let sync_task = PeriodicTask::spawn("sync", config.sync_period(), move || {
            let sync = sync.clone();
            async move {
                sync.sync_all().await;
            }
        });

        let cache = self.cache.clone();
        let cleanup = self.cleanup.clone();
        let monitor_config = config.clone();
        let monitor_task = PeriodicTask::spawn("monitor", config.monitor_period(), move || {
            let (cache, cleanup, config) = (cache.clone(), cleanup.clone(), monitor_config.clone());
            async move {
                monitor(&cache, &cleanup, &config).await;
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.extend([cleanup_task, sync_task, monitor_task]);
    }
}

async fn monitor(
    cache: &LocalCache,
    cleanup: &CleanupEngine,
    config: &OptimizerConfig,
) -> StorageStats {
    let stats = StorageStats::collect(cache, config);
    tracing::debug!(
        total_size = stats.total_size,
        usage_ratio = stats.usage_ratio,
        "Storage usage"
    );

    for rec in &stats.recommendations {
        match rec.priority {
            Priority::High => tracing::warn!(advice = %rec.message, "Storage running high"),
            Priority::Medium | Priority::Low => {
                tracing::info!(advice = %rec.message, "Storage recommendation")
            }
        }
    }

    if stats.has_high_priority() {
        let report = cleanup.cleanup_all().await;
        tracing::info!(removed = report.total(), "Cleanup triggered by storage usage");
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SETTINGS_KEY;
    use crate::kv::{KeyValueStore, MemoryStore};
    use crate::remote::MemoryRemoteStore;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        remote: Arc<MemoryRemoteStore>,
        optimizer: DatabaseOptimizer,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let remote = Arc::new(MemoryRemoteStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
        ));
        let optimizer = DatabaseOptimizer::new(store.clone(), remote.clone(), clock);
        Fixture {
            store,
            remote,
            optimizer,
        }
    }

    fn records(value: Value) -> Vec<Record> {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn sync_timer_runs_after_interval() {
        let f = fixture();
        f.remote.insert(CollectionName::Menu, "m1", json!({"dish": "Achu"}));

        f.optimizer.init();
        assert!(f.optimizer.is_running());

        tokio::time::sleep(Duration::from_secs(4 * 60)).await;
        assert!(f.optimizer.read_collection(CollectionName::Menu).is_empty());

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert_eq!(f.optimizer.read_collection(CollectionName::Menu).len(), 1);

        f.optimizer.shutdown().await;
        assert!(!f.optimizer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_does_not_stop_cleanup() {
        let f = fixture();
        for collection in CollectionName::ALL {
            f.remote.fail_collection(collection);
        }
        f.optimizer.cache().write_collection(
            CollectionName::Logs,
            &records(json!([{"id": "l1", "expiresAt": "2001-01-01"}])),
        );

        f.optimizer.init();
        // Several failing sync passes, then the first cleanup pass
        tokio::time::sleep(Duration::from_secs(31 * 60)).await;

        assert!(f.optimizer.read_collection(CollectionName::Logs).is_empty());
        assert!(f.optimizer.is_running());
        f.optimizer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn init_twice_keeps_one_set_of_timers() {
        let f = fixture();
        f.optimizer.init();
        f.optimizer.init();
        assert_eq!(f.optimizer.take_tasks().len(), 3);
    }

    #[tokio::test]
    async fn init_loads_stored_settings() {
        let f = fixture();
        f.store
            .set(SETTINGS_KEY, r#"{"encodingEnabled": true, "syncInterval": 1000}"#)
            .unwrap();

        f.optimizer.init();
        assert_eq!(f.optimizer.config().sync_interval, 1000);
        assert!(f.optimizer.cache().codec().encoding);
        f.optimizer.shutdown().await;
    }

    #[tokio::test]
    async fn update_settings_persists_and_applies() {
        let f = fixture();
        let config = OptimizerConfig {
            compression_enabled: true,
            ..OptimizerConfig::default()
        };
        f.optimizer.update_settings(config.clone()).await.unwrap();

        assert_eq!(OptimizerConfig::load(f.store.as_ref()), config);
        assert!(f.optimizer.cache().codec().compaction);
        assert!(!f.optimizer.is_running());
    }

    #[tokio::test]
    async fn sync_now_backfills_ids() {
        let f = fixture();
        f.optimizer.cache().write_collection(
            CollectionName::Messages,
            &records(json!([{"localId": "local_1", "body": "Bonjour"}])),
        );

        let report = f.optimizer.sync_now().await;
        assert_eq!(report.failed_count(), 0);

        let messages = f.optimizer.read_collection(CollectionName::Messages);
        assert!(messages[0].is_reconciled());
    }

    #[tokio::test]
    async fn monitor_cleans_when_storage_runs_high() {
        let f = fixture();
        f.optimizer.cache().write_collection(
            CollectionName::ErrorLogs,
            &records(json!([
                {"id": "e1", "expiresAt": "2001-01-01", "trace": "x".repeat(200)}
            ])),
        );
        f.optimizer
            .update_settings(OptimizerConfig {
                max_local_storage_size: 100,
                ..OptimizerConfig::default()
            })
            .await
            .unwrap();

        let stats = f.optimizer.monitor_now().await;
        assert!(stats.has_high_priority());
        assert!(f.optimizer.read_collection(CollectionName::ErrorLogs).is_empty());
    }

    #[tokio::test]
    async fn backup_restore_and_export() {
        let f = fixture();
        let users = records(json!([{"id": "u1", "name": "Ama"}]));
        f.optimizer.cache().write_collection(CollectionName::Users, &users);

        let backup = f.optimizer.create_backup().unwrap();
        assert_eq!(backup.timestamp, "2024-06-15T12:00:00.000Z");

        f.optimizer.cache().write_collection(CollectionName::Users, &[]);
        f.optimizer.restore_backup().await.unwrap();
        assert_eq!(f.optimizer.read_collection(CollectionName::Users), users);

        let exported: Value = serde_json::from_str(&f.optimizer.export_json().unwrap()).unwrap();
        assert_eq!(exported["version"], "1.0");
        assert_eq!(exported["collections"]["users"][0]["name"], "Ama");
    }
}
