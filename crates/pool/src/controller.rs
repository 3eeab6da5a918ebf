use std::{collections::HashMap, sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{sleep, Instant};
use uuid::Uuid;

use crate::client::{ClientError, PoolClient};
use crate::config::PoolConfig;
use crate::definition::{self, PoolDefinition};
use crate::error::{PoolError, Result};
use crate::store::{PoolRecord, PoolStore};
use crate::transform::Stylesheet;

/// Mutual exclusion keyed by pool name. A lock handle is created on first
/// use; entries nobody holds or waits on are pruned on later acquires.
/// Distinct names never contend with each other.
#[derive(Clone, Default)]
pub struct NameLocks {
    entries: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        NameLocks::default()
    }

    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut entries = self.entries.lock().await;
            // A sole strong reference means no guard is held and nobody is
            // waiting, so the entry can go.
            entries.retain(|key, lock| key == name || Arc::strong_count(lock) > 1);
            entries
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}

/// The daemon-side state of a pool as last observed.
#[derive(Debug, Clone)]
pub struct PoolState {
    pub uuid: Uuid,
    pub name: String,
    pub capacity: u64,
    pub allocation: u64,
    pub available: u64,
    pub target_path: Option<String>,
    pub source_devices: Vec<String>,
}

/// Drives pool resources through their lifecycle against the daemon.
///
/// `create` is serialized per pool name; `read` and `delete` target an
/// already-assigned identifier and run unlocked.
#[derive(Clone)]
pub struct PoolController {
    client: Arc<dyn PoolClient>,
    store: PoolStore,
    locks: NameLocks,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl PoolController {
    pub fn new(client: Arc<dyn PoolClient>, store: PoolStore, config: &PoolConfig) -> Self {
        PoolController {
            client,
            store,
            locks: NameLocks::new(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            wait_timeout: Duration::from_secs(config.wait_timeout_secs),
        }
    }

    /// Defines, builds, autostarts, starts and refreshes a pool from the
    /// given definition, returning the daemon-assigned identifier.
    ///
    /// The per-name lock is held for the entire call, daemon round trips and
    /// existence poll included, so concurrent creates under one name cannot
    /// race past the collision check. Failures part way leave the
    /// daemon-side object as is; a follow-up `delete` cleans it up.
    pub async fn create(
        &self,
        definition: &PoolDefinition,
        stylesheet: Option<&Stylesheet>,
    ) -> Result<Uuid> {
        let _guard = self.locks.acquire(definition.name()).await;

        // Name uniqueness is enforced here, not by the daemon: the daemon
        // tolerates transient name-less objects.
        match self.client.lookup_by_name(definition.name()).await {
            Ok(_) => return Err(PoolError::AlreadyExists(definition.name().to_string())),
            Err(ClientError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }
        debug!("pool with name '{}' does not exist yet", definition.name());

        let mut xml = definition.to_xml();
        debug!("generated pool document:\n{}", xml);
        if let Some(stylesheet) = stylesheet {
            xml = stylesheet.apply(&xml).await?;
        }

        let handle = self
            .client
            .define(&xml)
            .await
            .map_err(PoolError::SubmissionFailed)?;
        self.client
            .build(&handle)
            .await
            .map_err(PoolError::BuildFailed)?;
        self.client
            .set_autostart(&handle, true)
            .await
            .map_err(PoolError::AutostartFailed)?;
        self.client
            .start(&handle)
            .await
            .map_err(PoolError::StartFailed)?;
        self.client
            .refresh(&handle)
            .await
            .map_err(PoolError::RefreshFailed)?;

        let uuid = self
            .client
            .uuid_of(&handle)
            .await
            .map_err(PoolError::IdentifierRetrievalFailed)?;
        // Record the identifier before anything else can fail, so a later
        // delete can still target the pool.
        self.store
            .update(
                uuid,
                PoolRecord {
                    name: definition.name().to_string(),
                    kind: definition.kind().to_string(),
                    target_path: definition.target_path().map(str::to_string),
                    source_devices: definition.source_devices().to_vec(),
                    ..Default::default()
                },
            )
            .await?;
        info!("created storage pool '{}' ({})", definition.name(), uuid);

        self.wait_until_exists(uuid).await?;
        self.read(uuid).await?;
        Ok(uuid)
    }

    /// Looks a pool up by identifier and reports its observed state,
    /// refreshing the local record. An object unknown to the daemon is not
    /// an error: the record is cleared and `None` returned, since removal
    /// out of band is an expected occurrence.
    pub async fn read(&self, uuid: Uuid) -> Result<Option<PoolState>> {
        let handle = match self.client.lookup_by_uuid(uuid).await {
            Ok(handle) => handle,
            Err(ClientError::NotFound) => {
                warn!("storage pool {} may have been deleted outside of basin", uuid);
                self.store.remove(uuid).await?;
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let name = self.client.name_of(&handle).await?;
        let info = self.client.info(&handle).await?;
        let xml = self.client.xml_desc(&handle).await?;
        let target_path = definition::target_path_from_xml(&xml);
        let source_devices = definition::source_devices_from_xml(&xml);
        if target_path.is_none() {
            debug!("pool '{}' has no target path specified", name);
        }

        let state = PoolState {
            uuid,
            name,
            capacity: info.capacity,
            allocation: info.allocation,
            available: info.available,
            target_path,
            source_devices,
        };
        self.store
            .update(
                uuid,
                PoolRecord {
                    name: state.name.clone(),
                    kind: definition::kind_from_xml(&xml).unwrap_or_default(),
                    target_path: state.target_path.clone(),
                    source_devices: state.source_devices.clone(),
                    capacity: state.capacity,
                    allocation: state.allocation,
                    available: state.available,
                },
            )
            .await?;
        Ok(Some(state))
    }

    /// Stops and undefines a pool. Idempotent: an object already unknown to
    /// the daemon, at lookup or at any later step, counts as deleted.
    pub async fn delete(&self, uuid: Uuid) -> Result<()> {
        let handle = match self.client.lookup_by_uuid(uuid).await {
            Ok(handle) => handle,
            Err(ClientError::NotFound) => {
                self.store.remove(uuid).await?;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        match self.client.is_active(&handle).await {
            Ok(true) => match self.client.destroy(&handle).await {
                Ok(()) | Err(ClientError::NotFound) => {}
                Err(err) => return Err(err.into()),
            },
            Ok(false) | Err(ClientError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }

        match self.client.undefine(&handle).await {
            Ok(()) | Err(ClientError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }

        self.store.remove(uuid).await?;
        info!("deleted storage pool {}", uuid);
        Ok(())
    }

    /// Polls until the pool is observably present. Creation may be
    /// asynchronous from the daemon's perspective even though defining
    /// returns synchronously; reads issued immediately after a create would
    /// otherwise race not-yet-visible state.
    pub async fn wait_until_exists(&self, uuid: Uuid) -> Result<()> {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            match self.client.lookup_by_uuid(uuid).await {
                Ok(_) => return Ok(()),
                Err(ClientError::NotFound) => {}
                Err(err) => return Err(err.into()),
            }
            if Instant::now() >= deadline {
                return Err(PoolError::Timeout(uuid));
            }
            sleep(self.poll_interval).await;
        }
    }

    pub async fn list_records(&self) -> Result<HashMap<Uuid, PoolRecord>> {
        Ok(self.store.list().await?)
    }

    pub async fn record(&self, uuid: Uuid) -> Result<Option<PoolRecord>> {
        Ok(self.store.read(uuid).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{PoolHandle, PoolInfo};
    use async_trait::async_trait;
    use std::result::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct FakePool {
        uuid: Uuid,
        xml: String,
        active: bool,
        autostart: bool,
        built: bool,
        refreshed: bool,
        lookups_until_visible: u64,
    }

    #[derive(Default)]
    struct FakeDaemon {
        pools: Mutex<HashMap<String, FakePool>>,
        fail_build: bool,
        fail_start: bool,
        visibility_delay: u64,
        define_calls: AtomicUsize,
    }

    impl FakeDaemon {
        fn with_visibility_delay(delay: u64) -> Self {
            FakeDaemon {
                visibility_delay: delay,
                ..Default::default()
            }
        }
    }

    fn name_from_xml(xml: &str) -> String {
        let start = xml.find("<name>").unwrap() + "<name>".len();
        let end = xml.find("</name>").unwrap();
        xml[start..end].to_string()
    }

    #[async_trait]
    impl PoolClient for FakeDaemon {
        async fn lookup_by_name(&self, name: &str) -> Result<PoolHandle, ClientError> {
            let pools = self.pools.lock().await;
            if pools.contains_key(name) {
                Ok(name.to_string())
            } else {
                Err(ClientError::NotFound)
            }
        }

        async fn lookup_by_uuid(&self, uuid: Uuid) -> Result<PoolHandle, ClientError> {
            let mut pools = self.pools.lock().await;
            for (name, pool) in pools.iter_mut() {
                if pool.uuid != uuid {
                    continue;
                }
                if pool.lookups_until_visible > 0 {
                    pool.lookups_until_visible -= 1;
                    return Err(ClientError::NotFound);
                }
                return Ok(name.clone());
            }
            Err(ClientError::NotFound)
        }

        async fn define(&self, xml: &str) -> Result<PoolHandle, ClientError> {
            self.define_calls.fetch_add(1, Ordering::SeqCst);
            let name = name_from_xml(xml);
            let mut pools = self.pools.lock().await;
            pools.insert(
                name.clone(),
                FakePool {
                    uuid: Uuid::new_v4(),
                    xml: xml.to_string(),
                    active: false,
                    autostart: false,
                    built: false,
                    refreshed: false,
                    lookups_until_visible: self.visibility_delay,
                },
            );
            Ok(name)
        }

        async fn build(&self, pool: &PoolHandle) -> Result<(), ClientError> {
            if self.fail_build {
                return Err(ClientError::Call("disk failure".to_string()));
            }
            let mut pools = self.pools.lock().await;
            pools.get_mut(pool).ok_or(ClientError::NotFound)?.built = true;
            Ok(())
        }

        async fn set_autostart(&self, pool: &PoolHandle, autostart: bool) -> Result<(), ClientError> {
            let mut pools = self.pools.lock().await;
            pools.get_mut(pool).ok_or(ClientError::NotFound)?.autostart = autostart;
            Ok(())
        }

        async fn start(&self, pool: &PoolHandle) -> Result<(), ClientError> {
            if self.fail_start {
                return Err(ClientError::Call("activation failure".to_string()));
            }
            let mut pools = self.pools.lock().await;
            pools.get_mut(pool).ok_or(ClientError::NotFound)?.active = true;
            Ok(())
        }

        async fn refresh(&self, pool: &PoolHandle) -> Result<(), ClientError> {
            let mut pools = self.pools.lock().await;
            pools.get_mut(pool).ok_or(ClientError::NotFound)?.refreshed = true;
            Ok(())
        }

        async fn destroy(&self, pool: &PoolHandle) -> Result<(), ClientError> {
            let mut pools = self.pools.lock().await;
            pools.get_mut(pool).ok_or(ClientError::NotFound)?.active = false;
            Ok(())
        }

        async fn undefine(&self, pool: &PoolHandle) -> Result<(), ClientError> {
            let mut pools = self.pools.lock().await;
            pools.remove(pool).ok_or(ClientError::NotFound)?;
            Ok(())
        }

        async fn uuid_of(&self, pool: &PoolHandle) -> Result<Uuid, ClientError> {
            let pools = self.pools.lock().await;
            Ok(pools.get(pool).ok_or(ClientError::NotFound)?.uuid)
        }

        async fn name_of(&self, pool: &PoolHandle) -> Result<String, ClientError> {
            let pools = self.pools.lock().await;
            pools
                .contains_key(pool)
                .then(|| pool.clone())
                .ok_or(ClientError::NotFound)
        }

        async fn is_active(&self, pool: &PoolHandle) -> Result<bool, ClientError> {
            let pools = self.pools.lock().await;
            Ok(pools.get(pool).ok_or(ClientError::NotFound)?.active)
        }

        async fn xml_desc(&self, pool: &PoolHandle) -> Result<String, ClientError> {
            let pools = self.pools.lock().await;
            Ok(pools.get(pool).ok_or(ClientError::NotFound)?.xml.clone())
        }

        async fn info(&self, pool: &PoolHandle) -> Result<PoolInfo, ClientError> {
            let pools = self.pools.lock().await;
            pools.get(pool).ok_or(ClientError::NotFound)?;
            Ok(PoolInfo {
                capacity: 10485760,
                allocation: 0,
                available: 10485760,
            })
        }
    }

    fn controller(daemon: Arc<FakeDaemon>) -> (PoolController, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = PoolStore::open(&dir.path().join("pools.db")).unwrap();
        let config = PoolConfig {
            store_path: String::new(),
            poll_interval_ms: 10,
            wait_timeout_secs: 1,
        };
        (PoolController::new(daemon, store, &config), dir)
    }

    fn dir_definition(name: &str) -> PoolDefinition {
        PoolDefinition::new(name, "dir", Some("/tmp/x"), &[]).unwrap()
    }

    #[tokio::test]
    async fn create_drives_full_lifecycle() {
        let daemon = Arc::new(FakeDaemon::default());
        let (controller, _dir) = controller(daemon.clone());
        let uuid = controller.create(&dir_definition("pool1"), None).await.unwrap();

        let pools = daemon.pools.lock().await;
        let pool = pools.get("pool1").unwrap();
        assert_eq!(pool.uuid, uuid);
        assert!(pool.built && pool.active && pool.autostart && pool.refreshed);
        drop(pools);

        let record = controller.record(uuid).await.unwrap().unwrap();
        assert_eq!(record.name, "pool1");
        assert_eq!(record.kind, "dir");
        assert_eq!(record.target_path.as_deref(), Some("/tmp/x"));
        assert_eq!(record.capacity, 10485760);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let daemon = Arc::new(FakeDaemon::default());
        let (controller, _dir) = controller(daemon);
        controller.create(&dir_definition("pool1"), None).await.unwrap();
        let err = controller
            .create(&dir_definition("pool1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::AlreadyExists(name) if name == "pool1"));
    }

    #[tokio::test]
    async fn concurrent_creates_have_one_winner() {
        let daemon = Arc::new(FakeDaemon::default());
        let (controller, _dir) = controller(daemon.clone());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let controller = controller.clone();
            handles.push(tokio::spawn(async move {
                controller.create(&dir_definition("pool1"), None).await
            }));
        }
        let mut successes = 0;
        let mut collisions = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(PoolError::AlreadyExists(_)) => collisions += 1,
                Err(err) => panic!("unexpected error: {}", err),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(collisions, 7);
        assert_eq!(daemon.define_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn read_reports_observed_state() {
        let daemon = Arc::new(FakeDaemon::default());
        let (controller, _dir) = controller(daemon);
        let devices = vec!["/dev/loop0".to_string()];
        let definition = PoolDefinition::new("vg0", "logical", None, &devices).unwrap();
        let uuid = controller.create(&definition, None).await.unwrap();

        let state = controller.read(uuid).await.unwrap().unwrap();
        assert_eq!(state.name, "vg0");
        assert_eq!(state.capacity, 10485760);
        assert_eq!(state.source_devices, devices);
    }

    #[tokio::test]
    async fn read_of_absent_pool_clears_record() {
        let daemon = Arc::new(FakeDaemon::default());
        let (controller, _dir) = controller(daemon.clone());
        let uuid = controller.create(&dir_definition("pool1"), None).await.unwrap();

        daemon.pools.lock().await.clear();
        assert!(controller.read(uuid).await.unwrap().is_none());
        assert!(controller.record(uuid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent_for_out_of_band_removal() {
        let daemon = Arc::new(FakeDaemon::default());
        let (controller, _dir) = controller(daemon.clone());
        let uuid = controller.create(&dir_definition("pool1"), None).await.unwrap();

        // Removed behind our back; delete must still succeed.
        daemon.pools.lock().await.clear();
        controller.delete(uuid).await.unwrap();
        assert!(controller.record(uuid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_stops_and_undefines() {
        let daemon = Arc::new(FakeDaemon::default());
        let (controller, _dir) = controller(daemon.clone());
        let uuid = controller.create(&dir_definition("pool1"), None).await.unwrap();
        controller.delete(uuid).await.unwrap();
        assert!(daemon.pools.lock().await.is_empty());
        assert!(controller.read(uuid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn build_failure_is_wrapped_and_leaves_no_record() {
        let daemon = Arc::new(FakeDaemon {
            fail_build: true,
            ..Default::default()
        });
        let (controller, _dir) = controller(daemon);
        let err = controller
            .create(&dir_definition("pool1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::BuildFailed(_)));
        assert!(controller.list_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_failure_is_wrapped() {
        let daemon = Arc::new(FakeDaemon {
            fail_start: true,
            ..Default::default()
        });
        let (controller, _dir) = controller(daemon);
        let err = controller
            .create(&dir_definition("pool1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::StartFailed(_)));
    }

    #[tokio::test]
    async fn create_waits_out_async_visibility() {
        let daemon = Arc::new(FakeDaemon::with_visibility_delay(3));
        let (controller, _dir) = controller(daemon);
        let uuid = controller.create(&dir_definition("pool1"), None).await.unwrap();
        assert!(controller.read(uuid).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn identifier_survives_poll_timeout() {
        let daemon = Arc::new(FakeDaemon::with_visibility_delay(u64::MAX));
        let (controller, _dir) = controller(daemon.clone());
        let err = controller
            .create(&dir_definition("pool1"), None)
            .await
            .unwrap_err();
        let PoolError::Timeout(uuid) = err else {
            panic!("expected timeout, got: {}", err);
        };
        // The record was persisted before polling began, so cleanup can
        // still target the pool.
        assert!(controller.record(uuid).await.unwrap().is_some());
        daemon
            .pools
            .lock()
            .await
            .get_mut("pool1")
            .unwrap()
            .lookups_until_visible = 0;
        controller.delete(uuid).await.unwrap();
        assert!(daemon.pools.lock().await.is_empty());
        assert!(controller.record(uuid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn same_name_acquires_serialize() {
        let locks = NameLocks::new();
        let guard = locks.acquire("pool1").await;
        let contender = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = contender.acquire("pool1").await;
        });
        sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn distinct_names_are_independent() {
        let locks = NameLocks::new();
        let _first = locks.acquire("pool1").await;
        let _second = locks.acquire("pool2").await;
    }

    #[tokio::test]
    async fn uncontended_entries_are_pruned() {
        let locks = NameLocks::new();
        drop(locks.acquire("pool1").await);
        drop(locks.acquire("pool2").await);
        let _guard = locks.acquire("pool3").await;
        assert_eq!(locks.entries.lock().await.len(), 1);
    }
}
