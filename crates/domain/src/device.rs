//! Device: catalog metadata and what gets announced to the host.
//!
//! The hub groups entities under devices. The catalog is fetched in bulk
//! (see the REST adapter) and lets device-group adapters aggregate every
//! entity of one physical device.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::descriptor::{Capability, Category, DeviceDescriptor};
use crate::entity::{EntityId, EntityRecord};

/// Host-facing descriptive information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub room: Option<String>,
}

/// One row of the bulk catalog query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub entity_id: EntityId,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub device_id: Option<String>,
    /// Device name, if the entity belongs to one.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
}

impl CatalogEntity {
    /// Record view, used to resolve a descriptor before the first frame arrives.
    #[must_use]
    pub fn to_record(&self) -> EntityRecord {
        EntityRecord::new(self.entity_id.clone(), self.state.clone())
            .with_attributes(self.attributes.clone())
    }

    #[must_use]
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            room: self.area.clone(),
        }
    }
}

/// A hub device and the entities it groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDevice {
    pub id: String,
    pub name: String,
    pub info: DeviceInfo,
    pub entities: Vec<EntityId>,
}

/// Result of the bulk catalog query, indexed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entities: BTreeMap<EntityId, CatalogEntity>,
    devices: BTreeMap<String, CatalogDevice>,
}

impl Catalog {
    /// Index catalog rows by entity and group them by device.
    ///
    /// A later row for the same entity id replaces the earlier one.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntity>) -> Self {
        let mut catalog = Self::default();
        for entry in entries {
            if let Some(device_id) = entry.device_id.clone() {
                let device = catalog
                    .devices
                    .entry(device_id.clone())
                    .or_insert_with(|| CatalogDevice {
                        name: entry.name.clone().unwrap_or_else(|| device_id.clone()),
                        id: device_id,
                        info: entry.info(),
                        entities: Vec::new(),
                    });
                if !device.entities.contains(&entry.entity_id) {
                    device.entities.push(entry.entity_id.clone());
                }
            }
            catalog.entities.insert(entry.entity_id.clone(), entry);
        }
        catalog
    }

    #[must_use]
    pub fn entity(&self, id: &EntityId) -> Option<&CatalogEntity> {
        self.entities.get(id)
    }

    #[must_use]
    pub fn device(&self, device_id: &str) -> Option<&CatalogDevice> {
        self.devices.get(device_id)
    }

    /// The device owning an entity, if any.
    #[must_use]
    pub fn device_of(&self, id: &EntityId) -> Option<&CatalogDevice> {
        self.entities
            .get(id)
            .and_then(|e| e.device_id.as_deref())
            .and_then(|d| self.devices.get(d))
    }

    pub fn entities(&self) -> impl Iterator<Item = &CatalogEntity> {
        self.entities.values()
    }

    pub fn devices(&self) -> impl Iterator<Item = &CatalogDevice> {
        self.devices.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// What the host runtime would register for one adapter instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceManifest {
    pub native_id: String,
    pub name: String,
    pub category: Category,
    pub capabilities: Vec<Capability>,
    pub info: DeviceInfo,
}

impl DeviceManifest {
    /// Manifest of a single-entity adapter.
    #[must_use]
    pub fn for_entity(descriptor: &DeviceDescriptor, entity: &CatalogEntity) -> Self {
        let record = entity.to_record();
        Self {
            native_id: descriptor.native_id(entity.entity_id.as_str()),
            name: record.display_name(),
            category: descriptor.category,
            capabilities: descriptor.capabilities.clone(),
            info: entity.info(),
        }
    }

    /// Manifest of a device-group adapter.
    #[must_use]
    pub fn for_device(device: &CatalogDevice) -> Self {
        let descriptor = DeviceDescriptor::device_group();
        Self {
            native_id: descriptor.native_id(&device.id),
            name: device.name.clone(),
            category: descriptor.category,
            capabilities: descriptor.capabilities,
            info: device.info.clone(),
        }
    }
}
