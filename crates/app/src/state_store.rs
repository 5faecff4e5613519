//! Entity state store: the canonical map of entity id to current record.
//!
//! The store is the only writer of adapter-visible state. It is updated
//! exclusively by applying decoded deltas and hands out record clones.

use std::sync::{Mutex, MutexGuard, PoisonError};

use hamirror_domain::delta::{self, DeltaMessage, DeltaReport, Snapshot};
use hamirror_domain::entity::{EntityId, EntityRecord};

/// Mutex-guarded [`Snapshot`].
#[derive(Debug, Default)]
pub struct StateStore {
    snapshot: Mutex<Snapshot>,
}

impl StateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one frame. Readers lock the same mutex, so they observe either
    /// the state before the frame or after it.
    pub fn apply(&self, frame: &DeltaMessage) -> DeltaReport {
        delta::apply_in_place(&mut self.lock(), frame)
    }

    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<EntityRecord> {
        self.lock().get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.lock().contains_key(id)
    }

    /// Copy of the whole map.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(value: serde_json::Value) -> DeltaMessage {
        serde_json::from_value(value).unwrap()
    }

    fn id(value: &str) -> EntityId {
        EntityId::parse(value).unwrap()
    }

    #[test]
    fn should_start_empty() {
        let store = StateStore::new();
        assert!(store.is_empty());
        assert!(store.get(&id("lock.front")).is_none());
    }

    #[test]
    fn should_apply_frames_in_sequence() {
        let store = StateStore::new();
        store.apply(&frame(json!({
            "a": {"binary_sensor.front_door": {"s": "on", "a": {"device_class": "door"}, "lc": 1.0}}
        })));
        let report = store.apply(&frame(json!({
            "c": {"binary_sensor.front_door": {"+": {"s": "off"}}}
        })));

        let record = store.get(&id("binary_sensor.front_door")).unwrap();
        assert_eq!(record.state(), Some("off"));
        assert_eq!(record.device_class(), Some("door"));
        assert!(report.upserted.contains(&id("binary_sensor.front_door")));
    }

    #[test]
    fn should_report_unknown_ids_without_inserting_them() {
        let store = StateStore::new();
        let report = store.apply(&frame(json!({"c": {"lock.ghost": {"+": {"s": "locked"}}}})));
        assert_eq!(report.unknown, vec![id("lock.ghost")]);
        assert!(!store.contains(&id("lock.ghost")));
    }

    #[test]
    fn should_hand_out_independent_snapshots() {
        let store = StateStore::new();
        store.apply(&frame(json!({"a": {"lock.front": {"s": "locked", "a": {}}}})));
        let before = store.snapshot();
        store.apply(&frame(json!({"r": ["lock.front"]})));
        assert_eq!(before.len(), 1);
        assert_eq!(store.len(), 0);
    }
}
