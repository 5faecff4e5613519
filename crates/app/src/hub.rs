//! Hub context: everything the mirror owns, built at startup and torn down
//! at shutdown.
//!
//! [`Hub`] wires the [`SyncEngine`], the [`Supervisor`], the command executor
//! and the device catalog together. The binary holds one and passes it by
//! reference; nothing lives in globals.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

use tokio::task::JoinHandle;

use hamirror_domain::descriptor::{DEVICE_GROUP_PREFIX, resolve, split_native_id};
use hamirror_domain::device::{Catalog, CatalogEntity, DeviceManifest};
use hamirror_domain::entity::EntityId;
use hamirror_domain::error::{MirrorError, NotFoundError, UnsupportedError};

use crate::devices::{Command, DeviceAdapter};
use crate::ports::{CommandExecutor, DeviceCatalog, HubTransport};
use crate::supervisor::{Supervisor, SupervisorConfig, SupervisorError};
use crate::sync_engine::SyncEngine;

/// What to mirror and how to supervise the link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubConfig {
    pub supervisor: SupervisorConfig,
    /// Entities subscribed to from the start.
    pub track: Vec<EntityId>,
    /// Catalog device ids mirrored as device groups.
    pub devices: Vec<String>,
}

pub struct Hub<T: HubTransport, E, C> {
    engine: Arc<SyncEngine>,
    supervisor: Arc<Supervisor<T>>,
    executor: E,
    catalog_source: C,
    catalog: RwLock<Catalog>,
    track: Vec<EntityId>,
    devices: Vec<String>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl<T, E, C> Hub<T, E, C>
where
    T: HubTransport,
    E: CommandExecutor,
    C: DeviceCatalog,
{
    #[must_use]
    pub fn new(transport: T, executor: E, catalog_source: C, config: HubConfig) -> Self {
        let engine = Arc::new(SyncEngine::new());
        let supervisor = Arc::new(Supervisor::new(
            transport,
            Arc::clone(&engine),
            config.supervisor,
        ));
        Self {
            engine,
            supervisor,
            executor,
            catalog_source,
            catalog: RwLock::default(),
            track: config.track,
            devices: config.devices,
            watchdog: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    #[must_use]
    pub fn supervisor(&self) -> &Arc<Supervisor<T>> {
        &self.supervisor
    }

    fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the catalog again. Returns the number of entities it lists.
    ///
    /// # Errors
    ///
    /// Returns the error raised by the catalog source; the previous catalog
    /// is kept.
    pub async fn refresh_catalog(&self) -> Result<usize, MirrorError> {
        let entries = self.catalog_source.fetch().await?;
        let catalog = Catalog::from_entries(entries);
        let count = catalog.entities().count();
        tracing::info!(
            entities = count,
            devices = catalog.devices().count(),
            "device catalog loaded"
        );
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = catalog;
        Ok(count)
    }

    /// Load the catalog, register interest, spawn the watchdog and connect.
    ///
    /// A catalog failure is logged and does not stop the start.
    ///
    /// # Errors
    ///
    /// Returns the supervisor's error when the hub stays unreachable.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        if let Err(err) = self.refresh_catalog().await {
            tracing::warn!(%err, "device catalog unavailable, continuing without it");
        }

        let mut interest = self.track.clone();
        {
            let catalog = self.catalog();
            for device_id in &self.devices {
                match catalog.device(device_id) {
                    Some(device) => {
                        interest.extend(device.entities.iter().cloned());
                        self.engine.group_for(device);
                    }
                    None => tracing::warn!(device_id, "configured device is not in the catalog"),
                }
            }
        }
        self.engine.track(interest);

        let watchdog = self.supervisor.spawn_watchdog();
        if let Some(previous) = self
            .watchdog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(watchdog)
        {
            previous.abort();
        }

        self.supervisor.start().await
    }

    /// Manifests for every catalog entity the registry resolves and for
    /// every catalog device.
    #[must_use]
    pub fn discover_devices(&self) -> Vec<DeviceManifest> {
        let catalog = self.catalog();
        let entities = catalog.entities().filter_map(|entity| {
            resolve(&entity.to_record())
                .map(|descriptor| DeviceManifest::for_entity(&descriptor, entity))
        });
        let devices = catalog.devices().map(DeviceManifest::for_device);
        entities.chain(devices).collect()
    }

    /// Add entities to the subscription. Re-subscribes when any was new.
    ///
    /// # Errors
    ///
    /// Returns the transport error raised by the re-subscription.
    pub async fn track(&self, ids: impl IntoIterator<Item = EntityId>) -> Result<bool, MirrorError> {
        if !self.engine.track(ids) {
            return Ok(false);
        }
        self.supervisor.resubscribe().await?;
        Ok(true)
    }

    /// The adapter behind a native id, created and tracked on first lookup.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Validation`] for a malformed native id,
    /// [`MirrorError::NotFound`] when neither the store nor the catalog knows
    /// the entity or device, and [`MirrorError::Unsupported`] when no adapter
    /// resolves for it.
    pub async fn adapter(&self, native_id: &str) -> Result<Arc<DeviceAdapter>, MirrorError> {
        if let Some(adapter) = self.engine.cache().get(native_id) {
            return Ok(adapter);
        }

        let (prefix, id) = split_native_id(native_id)?;
        if prefix == DEVICE_GROUP_PREFIX {
            let device = self.catalog().device(id).cloned().ok_or_else(|| NotFoundError {
                entity: "Device",
                id: id.to_string(),
            })?;
            let adapter = self.engine.group_for(&device);
            self.track(device.entities).await?;
            return Ok(adapter);
        }

        let entity_id = EntityId::parse(id)?;
        let record = self
            .engine
            .record(&entity_id)
            .or_else(|| self.catalog().entity(&entity_id).map(CatalogEntity::to_record))
            .ok_or_else(|| NotFoundError {
                entity: "Entity",
                id: entity_id.to_string(),
            })?;
        let adapter = self
            .engine
            .cache()
            .get_or_create(&record)
            .filter(|adapter| adapter.native_id() == native_id)
            .ok_or_else(|| UnsupportedError {
                target: native_id.to_string(),
                operation: "device adapter".to_string(),
            })?;
        self.track([entity_id]).await?;
        Ok(adapter)
    }

    /// Run a host command against an adapter. Service calls are sent once
    /// and never retried.
    ///
    /// # Errors
    ///
    /// Returns the lookup error from [`adapter`](Self::adapter),
    /// [`MirrorError::Unsupported`] when the adapter rejects the command, or
    /// the executor's error.
    pub async fn command(&self, native_id: &str, command: Command) -> Result<(), MirrorError> {
        let adapter = self.adapter(native_id).await?;
        let Some(call) = adapter.command(&command)? else {
            tracing::debug!(native_id, command = command.name(), "command handled locally");
            return Ok(());
        };
        tracing::info!(native_id, %call, "executing service call");
        self.executor.execute(call).await
    }

    /// Stop the watchdog, close the transport and wait for the watchdog task.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
        let watchdog = self
            .watchdog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(watchdog) = watchdog
            && let Err(err) = watchdog.await
        {
            tracing::warn!(%err, "watchdog task ended abnormally");
        }
    }
}
