//! Entity: the hub's unit of state.
//!
//! An entity represents a single observable/controllable aspect of a device
//! on the hub (e.g., a door contact, a lock, a temperature reading). The
//! mirror keeps one [`EntityRecord`] per entity and replaces it wholesale
//! whenever a delta touches it.

mod attributes;
mod context;

pub use attributes::Attributes;
pub use context::Context;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::{Timestamp, now};

/// Hub entity identifier of the form `<domain>.<object-id>`.
///
/// Deserialization is lenient so that a single odd id coming from the hub
/// never rejects a whole frame; use [`EntityId::parse`] for operator input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Parse and validate an entity id.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedEntityId`] when the value has no
    /// `.` separator or either side of it is empty.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        match value.split_once('.') {
            Some((domain, object_id)) if !domain.is_empty() && !object_id.is_empty() => {
                Ok(Self(value))
            }
            _ => Err(ValidationError::MalformedEntityId(value)),
        }
    }

    /// The domain prefix (text before the first `.`).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(d, _)| d)
    }

    /// The object id (text after the first `.`).
    #[must_use]
    pub fn object_id(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, o)| o)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

impl FromStr for EntityId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full state of one hub entity.
///
/// Records are values: consumers receive clones and never observe a
/// half-applied delta. Cloning is cheap because [`Attributes`] is shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(rename = "entity_id")]
    pub id: EntityId,
    pub state: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub context: Context,
    pub last_changed: Timestamp,
    pub last_updated: Timestamp,
}

impl EntityRecord {
    /// Create a record with empty attributes, stamped with the current time.
    #[must_use]
    pub fn new(id: EntityId, state: Option<String>) -> Self {
        let ts = now();
        Self {
            id,
            state,
            attributes: Attributes::default(),
            context: Context::default(),
            last_changed: ts,
            last_updated: ts,
        }
    }

    /// Replace the attribute map.
    #[must_use]
    pub fn with_attributes(mut self, attributes: impl Into<Attributes>) -> Self {
        self.attributes = attributes.into();
        self
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        self.id.domain()
    }

    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// The `friendly_name` attribute, or a name derived from the object id.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.attributes
            .get_str("friendly_name")
            .map_or_else(|| humanize(self.id.object_id()), ToOwned::to_owned)
    }

    #[must_use]
    pub fn device_class(&self) -> Option<&str> {
        self.attributes.get_str("device_class")
    }

    #[must_use]
    pub fn state_class(&self) -> Option<&str> {
        self.attributes.get_str("state_class")
    }

    #[must_use]
    pub fn unit_of_measurement(&self) -> Option<&str> {
        self.attributes.get_str("unit_of_measurement")
    }

    /// The state parsed as a number, if it is one.
    #[must_use]
    pub fn numeric_state(&self) -> Option<f64> {
        self.state()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }
}

/// `front_door` → `Front door`.
fn humanize(object_id: &str) -> String {
    let spaced = object_id.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_split_domain_and_object_id() {
        let id = EntityId::parse("binary_sensor.front_door").unwrap();
        assert_eq!(id.domain(), "binary_sensor");
        assert_eq!(id.object_id(), "front_door");
    }

    #[test]
    fn should_split_on_first_dot_only() {
        let id = EntityId::parse("sensor.outside.temp").unwrap();
        assert_eq!(id.domain(), "sensor");
        assert_eq!(id.object_id(), "outside.temp");
    }

    #[test]
    fn should_reject_id_without_dot() {
        assert_eq!(
            EntityId::parse("nodot"),
            Err(ValidationError::MalformedEntityId("nodot".to_string()))
        );
    }

    #[test]
    fn should_reject_id_with_empty_domain() {
        assert!(EntityId::parse(".front_door").is_err());
        assert!(EntityId::parse("lock.").is_err());
    }

    #[test]
    fn should_deserialize_leniently_from_hub_frames() {
        let id: EntityId = serde_json::from_value(json!("nodot")).unwrap();
        assert_eq!(id.domain(), "nodot");
        assert_eq!(id.object_id(), "");
    }

    #[test]
    fn should_use_friendly_name_when_present() {
        let record = EntityRecord::new(EntityId::from("lock.front".to_string()), None)
            .with_attributes(json!({"friendly_name": "Front Lock"}).as_object().cloned().unwrap());
        assert_eq!(record.display_name(), "Front Lock");
    }

    #[test]
    fn should_humanize_object_id_when_friendly_name_missing() {
        let record = EntityRecord::new(EntityId::from("lock.front_door".to_string()), None);
        assert_eq!(record.display_name(), "Front door");
    }

    #[test]
    fn should_parse_numeric_state() {
        let record =
            EntityRecord::new(EntityId::from("sensor.t".to_string()), Some("21.5".to_string()));
        assert_eq!(record.numeric_state(), Some(21.5));

        let record = EntityRecord::new(
            EntityId::from("sensor.t".to_string()),
            Some("unavailable".to_string()),
        );
        assert_eq!(record.numeric_state(), None);
    }
}
