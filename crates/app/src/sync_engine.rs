//! Sync engine: applies delta frames to the store and routes the resulting
//! records to device adapters.
//!
//! Frame processing is serialized by a reentrancy guard: a frame arriving
//! while another is being applied is dropped, not queued. The hub is the
//! source of truth, so a later frame (or a full resync) restores anything a
//! dropped frame carried.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hamirror_domain::delta::{DeltaMessage, DeltaReport};
use hamirror_domain::device::CatalogDevice;
use hamirror_domain::entity::{EntityId, EntityRecord};

use crate::adapter_cache::AdapterCache;
use crate::devices::DeviceAdapter;
use crate::guard::FlagGuard;
use crate::state_store::StateStore;

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Applied(DeltaReport),
    /// Another frame was still being applied.
    Dropped,
}

#[derive(Debug, Default)]
pub struct SyncEngine {
    store: StateStore,
    cache: AdapterCache,
    interest: Mutex<BTreeSet<EntityId>>,
    applying: AtomicBool,
    applied_frames: AtomicU64,
    dropped_frames: AtomicU64,
}

impl SyncEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    #[must_use]
    pub fn cache(&self) -> &AdapterCache {
        &self.cache
    }

    fn interest_lock(&self) -> MutexGuard<'_, BTreeSet<EntityId>> {
        self.interest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add ids to the interest set. Returns `true` if any was new.
    pub fn track(&self, ids: impl IntoIterator<Item = EntityId>) -> bool {
        let mut interest = self.interest_lock();
        let before = interest.len();
        interest.extend(ids);
        interest.len() != before
    }

    /// Remove ids from the interest set. Returns `true` if any was tracked.
    pub fn untrack<'a>(&self, ids: impl IntoIterator<Item = &'a EntityId>) -> bool {
        let mut interest = self.interest_lock();
        ids.into_iter().fold(false, |acc, id| interest.remove(id) | acc)
    }

    /// The ids the next subscription should request, sorted.
    #[must_use]
    pub fn interest(&self) -> Vec<EntityId> {
        self.interest_lock().iter().cloned().collect()
    }

    pub(crate) fn begin_frame(&self) -> Option<FlagGuard<'_>> {
        FlagGuard::acquire(&self.applying)
    }

    /// Apply one frame and dispatch every touched record.
    pub fn handle_frame(&self, frame: &DeltaMessage) -> FrameOutcome {
        let Some(_guard) = self.begin_frame() else {
            let dropped = self.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(dropped, "frame arrived while another was being applied, dropping it");
            return FrameOutcome::Dropped;
        };

        let report = self.store.apply(frame);
        for id in &report.unknown {
            tracing::warn!(entity_id = %id, "change for unknown entity skipped");
        }
        for id in &report.removed {
            tracing::debug!(entity_id = %id, "entity removed");
        }
        for id in &report.upserted {
            if let Some(record) = self.store.get(id) {
                self.cache.dispatch(&record);
            }
        }
        self.applied_frames.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            upserted = report.upserted.len(),
            removed = report.removed.len(),
            "frame applied"
        );
        FrameOutcome::Applied(report)
    }

    #[must_use]
    pub fn record(&self, id: &EntityId) -> Option<EntityRecord> {
        self.store.get(id)
    }

    /// The single-entity adapter for `id`, created from the current record.
    #[must_use]
    pub fn adapter_for(&self, id: &EntityId) -> Option<Arc<DeviceAdapter>> {
        let record = self.store.get(id)?;
        self.cache.get_or_create(&record)
    }

    /// The device-group adapter for `device`, seeded from the store.
    pub fn group_for(&self, device: &CatalogDevice) -> Arc<DeviceAdapter> {
        self.cache
            .get_or_create_group(device, |id| self.store.get(id))
    }

    #[must_use]
    pub fn applied_frames(&self) -> u64 {
        self.applied_frames.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::Projection;
    use hamirror_domain::descriptor::AdapterKind;
    use serde_json::json;

    fn frame(value: serde_json::Value) -> DeltaMessage {
        serde_json::from_value(value).unwrap()
    }

    fn id(value: &str) -> EntityId {
        EntityId::parse(value).unwrap()
    }

    #[test]
    fn should_route_front_door_updates_to_entry_sensor() {
        let engine = SyncEngine::new();
        engine.handle_frame(&frame(json!({
            "a": {"binary_sensor.front_door": {"s": "on", "a": {"device_class": "door"}}}
        })));
        engine.handle_frame(&frame(json!({
            "c": {"binary_sensor.front_door": {"+": {"s": "off"}}}
        })));

        let record = engine.record(&id("binary_sensor.front_door")).unwrap();
        assert_eq!(record.state(), Some("off"));
        assert_eq!(record.device_class(), Some("door"));

        let adapter = engine.adapter_for(&id("binary_sensor.front_door")).unwrap();
        assert_eq!(adapter.kind(), AdapterKind::EntrySensor);
        assert_eq!(adapter.projection(), Projection::Detection(Some(false)));
        assert_eq!(engine.applied_frames(), 2);
    }

    #[test]
    fn should_drop_frame_while_another_is_applied() {
        let engine = SyncEngine::new();
        let busy = engine.begin_frame().unwrap();

        let outcome = engine.handle_frame(&frame(json!({
            "a": {"lock.front": {"s": "locked", "a": {}}}
        })));

        assert_eq!(outcome, FrameOutcome::Dropped);
        assert_eq!(engine.dropped_frames(), 1);
        assert!(engine.record(&id("lock.front")).is_none());

        drop(busy);
        let outcome = engine.handle_frame(&frame(json!({
            "a": {"lock.front": {"s": "locked", "a": {}}}
        })));
        assert!(matches!(outcome, FrameOutcome::Applied(_)));
    }

    #[test]
    fn should_report_unknown_change_and_keep_applying() {
        let engine = SyncEngine::new();
        let outcome = engine.handle_frame(&frame(json!({
            "a": {"switch.fan": {"s": "on", "a": {}}},
            "c": {"switch.ghost": {"+": {"s": "off"}}}
        })));

        let FrameOutcome::Applied(report) = outcome else {
            panic!("frame should apply");
        };
        assert_eq!(report.unknown, vec![id("switch.ghost")]);
        assert!(engine.cache().get("haSwitch:switch.fan").is_some());
    }

    #[test]
    fn should_track_interest_set() {
        let engine = SyncEngine::new();
        assert!(engine.track([id("lock.front"), id("switch.fan")]));
        assert!(!engine.track([id("lock.front")]));
        assert_eq!(engine.interest(), vec![id("lock.front"), id("switch.fan")]);

        assert!(engine.untrack([&id("lock.front")]));
        assert!(!engine.untrack([&id("lock.front")]));
        assert_eq!(engine.interest(), vec![id("switch.fan")]);
    }

    #[test]
    fn should_seed_group_from_store() {
        let engine = SyncEngine::new();
        engine.handle_frame(&frame(json!({
            "a": {"sensor.front_battery": {"s": "87", "a": {}}}
        })));
        let device = CatalogDevice {
            id: "dev1".to_string(),
            name: "Front door".to_string(),
            info: hamirror_domain::device::DeviceInfo::default(),
            entities: vec![id("sensor.front_battery")],
        };

        let group = engine.group_for(&device);
        let Projection::Group(state) = group.projection() else {
            panic!("expected group projection");
        };
        assert_eq!(
            state.members[&id("sensor.front_battery")].value.as_deref(),
            Some("87")
        );
    }
}
