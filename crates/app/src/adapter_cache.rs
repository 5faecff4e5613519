//! Adapter cache: memoized device adapters keyed by native id.
//!
//! Adapters are created lazily, on the first observed update for an entity
//! or on the first lookup, and are never recreated for the same native id
//! while the process is alive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hamirror_domain::descriptor::resolve;
use hamirror_domain::device::CatalogDevice;
use hamirror_domain::entity::{EntityId, EntityRecord};

use crate::devices::DeviceAdapter;

#[derive(Debug, Default)]
struct Inner {
    adapters: HashMap<String, Arc<DeviceAdapter>>,
    /// Entity id to the native ids of every adapter owning it.
    owners: HashMap<EntityId, Vec<String>>,
}

impl Inner {
    fn insert(&mut self, adapter: DeviceAdapter) -> Arc<DeviceAdapter> {
        let adapter = Arc::new(adapter);
        for id in adapter.entities() {
            let owners = self.owners.entry(id.clone()).or_default();
            if !owners.iter().any(|n| n == adapter.native_id()) {
                owners.push(adapter.native_id().to_string());
            }
        }
        self.adapters
            .insert(adapter.native_id().to_string(), Arc::clone(&adapter));
        adapter
    }
}

#[derive(Debug, Default)]
pub struct AdapterCache {
    inner: Mutex<Inner>,
}

impl AdapterCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self, native_id: &str) -> Option<Arc<DeviceAdapter>> {
        self.lock().adapters.get(native_id).cloned()
    }

    /// The single-entity adapter for `record`, created on first use.
    ///
    /// Returns `None` when no descriptor resolves for the record.
    pub fn get_or_create(&self, record: &EntityRecord) -> Option<Arc<DeviceAdapter>> {
        let descriptor = resolve(record)?;
        let native_id = descriptor.native_id(record.id.as_str());

        let mut inner = self.lock();
        if let Some(existing) = inner.adapters.get(&native_id) {
            return Some(Arc::clone(existing));
        }
        tracing::debug!(%native_id, kind = ?descriptor.adapter, "creating adapter");
        Some(inner.insert(DeviceAdapter::for_entity(descriptor, record)))
    }

    /// The device-group adapter for `device`, created on first use and fed
    /// the current record of every constituent known to `current`.
    pub fn get_or_create_group(
        &self,
        device: &CatalogDevice,
        current: impl Fn(&EntityId) -> Option<EntityRecord>,
    ) -> Arc<DeviceAdapter> {
        let candidate = DeviceAdapter::for_device(device);
        let adapter = {
            let mut inner = self.lock();
            if let Some(existing) = inner.adapters.get(candidate.native_id()) {
                return Arc::clone(existing);
            }
            tracing::debug!(native_id = candidate.native_id(), entities = device.entities.len(), "creating device group");
            inner.insert(candidate)
        };
        for record in adapter.entities().iter().filter_map(&current) {
            if let Err(err) = adapter.apply_update(&record) {
                tracing::warn!(%err, "failed to seed device group");
            }
        }
        adapter
    }

    /// Every adapter owning `id`.
    #[must_use]
    pub fn owners_of(&self, id: &EntityId) -> Vec<Arc<DeviceAdapter>> {
        let inner = self.lock();
        inner
            .owners
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|n| inner.adapters.get(n).cloned())
            .collect()
    }

    /// Fan one record out to every adapter owning it, creating the
    /// single-entity adapter on the first update.
    ///
    /// Returns the number of adapters that accepted the record. A failing
    /// adapter is logged and does not affect the others.
    pub fn dispatch(&self, record: &EntityRecord) -> usize {
        if self.get_or_create(record).is_none() {
            tracing::trace!(entity_id = %record.id, "no standalone adapter for entity");
        }
        let mut applied = 0;
        for adapter in self.owners_of(&record.id) {
            match adapter.apply_update(record) {
                Ok(()) => applied += 1,
                Err(err) => tracing::warn!(
                    native_id = adapter.native_id(),
                    entity_id = %record.id,
                    %err,
                    "adapter rejected update"
                ),
            }
        }
        applied
    }

    #[must_use]
    pub fn adapters(&self) -> Vec<Arc<DeviceAdapter>> {
        self.lock().adapters.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{GroupState, Projection};
    use serde_json::{Value, json};

    fn record(id: &str, state: &str, attributes: Value) -> EntityRecord {
        EntityRecord::new(EntityId::parse(id).unwrap(), Some(state.to_string()))
            .with_attributes(attributes.as_object().cloned().unwrap())
    }

    fn device() -> CatalogDevice {
        CatalogDevice {
            id: "dev1".to_string(),
            name: "Front door".to_string(),
            info: hamirror_domain::device::DeviceInfo::default(),
            entities: vec![
                EntityId::parse("lock.front").unwrap(),
                EntityId::parse("sensor.front_battery").unwrap(),
            ],
        }
    }

    #[test]
    fn should_memoize_adapter_per_native_id() {
        let cache = AdapterCache::new();
        let first = cache
            .get_or_create(&record("lock.front", "locked", json!({})))
            .unwrap();
        let second = cache
            .get_or_create(&record("lock.front", "unlocked", json!({})))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("haLock:lock.front").is_some());
    }

    #[test]
    fn should_not_create_adapter_for_unsupported_entity() {
        let cache = AdapterCache::new();
        let power = record("sensor.power", "12", json!({"device_class": "power"}));
        assert!(cache.get_or_create(&power).is_none());
        assert_eq!(cache.dispatch(&power), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn should_create_adapter_on_first_dispatch_and_update_afterwards() {
        let cache = AdapterCache::new();
        assert_eq!(cache.dispatch(&record("switch.fan", "on", json!({}))), 1);
        assert_eq!(cache.dispatch(&record("switch.fan", "off", json!({}))), 1);

        let adapter = cache.get("haSwitch:switch.fan").unwrap();
        assert_eq!(adapter.projection(), Projection::Power(Some(false)));
    }

    #[test]
    fn should_return_same_group_for_any_constituent() {
        let cache = AdapterCache::new();
        let seeded = record("sensor.front_battery", "87", json!({}));
        let group = cache.get_or_create_group(&device(), |id| {
            (id == &seeded.id).then(|| seeded.clone())
        });
        let again = cache.get_or_create_group(&device(), |_| None);

        assert!(Arc::ptr_eq(&group, &again));
        let Projection::Group(GroupState { members }) = group.projection() else {
            panic!("expected group projection");
        };
        assert_eq!(members.len(), 1);
    }

    #[test]
    fn should_fan_out_to_standalone_and_group_adapters() {
        let cache = AdapterCache::new();
        cache.get_or_create_group(&device(), |_| None);

        let applied = cache.dispatch(&record("lock.front", "unlocked", json!({})));
        assert_eq!(applied, 2);
        assert_eq!(cache.owners_of(&EntityId::parse("lock.front").unwrap()).len(), 2);

        let battery = cache.dispatch(&record("sensor.front_battery", "80", json!({})));
        assert_eq!(battery, 1);
    }
}
