//! Storage Coordinator
//!
//! Owns one instance of every store over a shared backend, runs periodic
//! maintenance, republishes changes made by other tabs to in-process
//! listeners, and moves all stores in and out of a single snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::{RawStorageEvent, StorageBackend};
use crate::cache::CacheLayer;
use crate::clock::{to_rfc3339, SharedClock, SystemClock};
use crate::config::Config;
use crate::coordinator::{
    HealthReport, ImportReport, ListenerId, ListenerRegistry, MaintenanceReport, Snapshot,
    StorageChangeEvent, StoreKind, SNAPSHOT_VERSION,
};
use crate::error::{Result, StorageError};
use crate::queue::OfflineQueue;
use crate::quota::{QuotaInfo, QuotaMonitor};
use crate::store::{
    EncryptedStore, EncryptionKey, EphemeralStore, KeySpace, KeyValueStore, Namespace,
    SOFT_LIMIT_RATIO,
};
use crate::tasks::{spawn_change_listener, spawn_maintenance_task};

// == Store Ref ==
/// A borrowed store, as returned by [`StorageCoordinator::get_store`].
#[derive(Debug, Clone, Copy)]
pub enum StoreRef<'a> {
    Data(&'a KeyValueStore),
    Cache(&'a CacheLayer),
    Queue(&'a OfflineQueue),
    Session(&'a EphemeralStore),
}

// == Storage Coordinator ==
#[derive(Debug)]
pub struct StorageCoordinator {
    config: Config,
    keyspace: KeySpace,
    backend: Arc<dyn StorageBackend>,
    clock: SharedClock,
    kv: KeyValueStore,
    secure: EncryptedStore,
    cache: CacheLayer,
    queue: OfflineQueue,
    session: EphemeralStore,
    quota: QuotaMonitor,
    listeners: ListenerRegistry,
    maintenance_task: Mutex<Option<JoinHandle<()>>>,
    change_task: Mutex<Option<JoinHandle<()>>>,
}

impl StorageCoordinator {
    // == Constructors ==
    /// Builds every store over `backend`, with session state on
    /// `session_backend`.
    pub fn new(
        config: Config,
        backend: Arc<dyn StorageBackend>,
        session_backend: Arc<dyn StorageBackend>,
    ) -> Self {
        Self::with_clock(config, backend, session_backend, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: Config,
        backend: Arc<dyn StorageBackend>,
        session_backend: Arc<dyn StorageBackend>,
        clock: SharedClock,
    ) -> Self {
        let keyspace = KeySpace::new(config.prefix.clone());
        let store = |namespace| {
            KeyValueStore::new(
                backend.clone(),
                keyspace.clone(),
                namespace,
                clock.clone(),
                config.assumed_capacity,
            )
        };

        let kv = store(Namespace::Data);
        let secure = EncryptedStore::new(kv.clone(), encryption_key(&config));
        let cache = CacheLayer::new(
            store(Namespace::Cache),
            config.default_ttl(),
            config.max_entries,
        );
        let queue = OfflineQueue::new(store(Namespace::Queue));
        let session = EphemeralStore::new(session_backend, &config.prefix, clock.clone());
        let quota = QuotaMonitor::new(backend.clone(), keyspace.clone(), config.assumed_capacity);

        info!(
            "Storage coordinator ready: prefix={}, available={}, encryption={}",
            config.prefix,
            kv.is_available(),
            secure.is_configured()
        );

        Self {
            config,
            keyspace,
            backend,
            clock,
            kv,
            secure,
            cache,
            queue,
            session,
            quota,
            listeners: ListenerRegistry::new(),
            maintenance_task: Mutex::new(None),
            change_task: Mutex::new(None),
        }
    }

    // == Accessors ==
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn keyspace(&self) -> &KeySpace {
        &self.keyspace
    }

    pub fn kv(&self) -> &KeyValueStore {
        &self.kv
    }

    pub fn secure(&self) -> &EncryptedStore {
        &self.secure
    }

    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub fn session(&self) -> &EphemeralStore {
        &self.session
    }

    pub fn quota(&self) -> &QuotaMonitor {
        &self.quota
    }

    pub fn get_store(&self, kind: StoreKind) -> StoreRef<'_> {
        match kind {
            StoreKind::Data => StoreRef::Data(&self.kv),
            StoreKind::Cache => StoreRef::Cache(&self.cache),
            StoreKind::Queue => StoreRef::Queue(&self.queue),
            StoreKind::Session => StoreRef::Session(&self.session),
        }
    }

    // == Listeners ==
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StorageChangeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // == Maintenance ==
    /// Sweeps expired entries, prunes the queue, and checks the quota.
    ///
    /// Each step that fails is logged and counted as zero.
    pub fn run_maintenance(&self) -> MaintenanceReport {
        let expired_data = logged("data expiry sweep", self.kv.clear_expired());
        let expired_cache = logged("cache expiry sweep", self.cache.clear_expired());
        let pruned_stale = logged(
            "queue age pruning",
            self.queue.prune_older_than(self.config.queue_max_age_days),
        );
        let pruned_failed = logged(
            "queue attempt pruning",
            self.queue.prune_failed_after(self.config.queue_max_attempts),
        );

        let quota = match self.quota.get_quota_info() {
            Ok(info) => {
                warn_if_near_full(&info);
                Some(info)
            }
            Err(e) => {
                warn!("Maintenance could not read quota: {}", e);
                None
            }
        };

        info!(
            "Maintenance: {} expired data, {} expired cache, {} stale and {} failed queued actions removed",
            expired_data, expired_cache, pruned_stale, pruned_failed
        );

        MaintenanceReport {
            expired_data,
            expired_cache,
            pruned_stale,
            pruned_failed,
            quota,
        }
    }

    /// Runs maintenance every `interval`, replacing any running schedule.
    pub fn start_maintenance(self: &Arc<Self>, interval: Duration) {
        let handle = spawn_maintenance_task(Arc::downgrade(self), interval);
        if let Some(previous) = self.maintenance_task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Returns false if maintenance was not running.
    pub fn stop_maintenance(&self) -> bool {
        match self.maintenance_task.lock().take() {
            Some(handle) => {
                handle.abort();
                info!("Maintenance stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_maintenance_running(&self) -> bool {
        self.maintenance_task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // == Cross-Tab Changes ==
    /// Subscribes to the backend's change notifications. Returns false if
    /// the backend has none.
    pub fn start_change_listener(self: &Arc<Self>) -> bool {
        let Some(events) = self.backend.subscribe() else {
            info!("Backend has no change notifications; cross-tab events disabled");
            return false;
        };

        let handle = spawn_change_listener(Arc::downgrade(self), events);
        if let Some(previous) = self.change_task.lock().replace(handle) {
            previous.abort();
        }
        true
    }

    pub fn stop_change_listener(&self) -> bool {
        match self.change_task.lock().take() {
            Some(handle) => {
                handle.abort();
                debug!("Change listener stopped");
                true
            }
            None => false,
        }
    }

    /// Turns a host notification into a typed event for the listeners.
    ///
    /// Writes made through this coordinator's own backend handle and keys
    /// outside its prefix are dropped.
    pub fn handle_raw_event(&self, raw: &RawStorageEvent) -> Option<StorageChangeEvent> {
        if raw.origin == self.backend.tab_id() {
            return None;
        }
        let event = StorageChangeEvent::from_raw(&self.keyspace, raw, self.clock.now_ms())?;

        let delivered = self.listeners.emit(&event);
        debug!(
            "Change to {:?} delivered to {}/{} listeners",
            event.key,
            delivered,
            self.listeners.len()
        );
        Some(event)
    }

    // == Health ==
    /// Probes every store.
    pub fn health_check(&self) -> HealthReport {
        let stores: BTreeMap<StoreKind, bool> = [
            (StoreKind::Data, self.kv.check_health()),
            (StoreKind::Cache, self.cache.check_health()),
            (StoreKind::Queue, self.queue.check_health()),
            (StoreKind::Session, self.session.check_health()),
        ]
        .into_iter()
        .collect();
        let overall = stores.values().all(|healthy| *healthy);
        if !overall {
            warn!("Storage health check failed: {:?}", stores);
        }

        HealthReport {
            stores,
            overall,
            timestamp: to_rfc3339(self.clock.now_ms()),
        }
    }

    // == Export / Import ==
    /// Every live entry of every store as raw envelopes.
    pub fn export_all(&self) -> Result<Snapshot> {
        let snapshot = Snapshot {
            data: self.kv.export()?,
            cache: self.cache.store().export()?,
            queue: self.queue.store().export()?,
            session: self.session.export()?,
            timestamp: to_rfc3339(self.clock.now_ms()),
            version: SNAPSHOT_VERSION,
        };
        info!("Exported {} entries", snapshot.entry_count());
        Ok(snapshot)
    }

    /// Writes every entry of `snapshot` over the current stores.
    ///
    /// Existing keys not in the snapshot are kept. Queued actions are merged
    /// by id, and the cache is trimmed back to its entry cap. Entries whose
    /// envelope is unreadable are skipped and counted.
    pub fn import_all(&self, snapshot: &Snapshot) -> Result<ImportReport> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StorageError::InvalidSnapshot(format!(
                "unsupported version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        let mut report = ImportReport::default();
        import_section(&mut report, &snapshot.data, |key, raw| self.kv.import_raw(key, raw))?;
        import_section(&mut report, &snapshot.cache, |key, raw| {
            self.cache.store().import_raw(key, raw)
        })?;
        self.cache.enforce_cap()?;
        import_section(&mut report, &snapshot.queue, |key, raw| {
            self.queue.import_raw(key, raw)
        })?;
        import_section(&mut report, &snapshot.session, |key, raw| {
            self.session.import_raw(key, raw)
        })?;

        info!(
            "Imported {} entries ({} skipped)",
            report.imported, report.skipped
        );
        Ok(report)
    }

    // == Clear All ==
    /// Removes every key under the application prefix plus all session
    /// state, and resets cache statistics. Returns how many keys went.
    pub fn clear_all_app_data(&self) -> Result<usize> {
        let mut removed = 0;
        if self.kv.is_available() {
            for physical in self.keyspace.owned_keys(self.backend.as_ref())? {
                self.backend.remove_item(&physical)?;
                removed += 1;
            }
        }
        removed += self.session.clear()?;
        self.cache.reset_stats();

        warn!("Cleared all application data ({} keys)", removed);
        Ok(removed)
    }

    // == Shutdown ==
    /// Stops maintenance and the change listener.
    pub fn shutdown(&self) {
        self.stop_maintenance();
        self.stop_change_listener();
        info!("Storage coordinator shut down");
    }
}

impl Drop for StorageCoordinator {
    fn drop(&mut self) {
        for task in [&self.maintenance_task, &self.change_task] {
            if let Some(handle) = task.lock().take() {
                handle.abort();
            }
        }
    }
}

fn encryption_key(config: &Config) -> Option<EncryptionKey> {
    let hex_key = config.encryption_key.as_deref()?;
    match EncryptionKey::from_hex(hex_key) {
        Ok(key) => Some(key),
        Err(e) => {
            error!("Ignoring ENCRYPTION_KEY: {}", e);
            None
        }
    }
}

fn import_section(
    report: &mut ImportReport,
    entries: &BTreeMap<String, Value>,
    import: impl Fn(&str, &Value) -> Result<()>,
) -> Result<()> {
    for (key, raw) in entries {
        match import(key, raw) {
            Ok(()) => report.imported += 1,
            Err(e @ StorageError::Corrupted { .. }) => {
                warn!("Skipping snapshot entry: {}", e);
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn logged(step: &str, result: Result<usize>) -> usize {
    result.unwrap_or_else(|e| {
        warn!("Maintenance step '{}' failed: {}", step, e);
        0
    })
}

fn warn_if_near_full(info: &QuotaInfo) {
    if info.percentage_used >= SOFT_LIMIT_RATIO * 100.0 {
        warn!(
            usage = info.usage,
            quota = info.quota,
            "Storage is {:.1}% full",
            info.percentage_used
        );
    }
}
