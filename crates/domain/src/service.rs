//! Service call: a command sent back to the hub.
//!
//! Examples: `lock.unlock`, `climate.set_temperature`, `input_select.select_option`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::EntityId;
use crate::error::ValidationError;

/// A `<domain>/<action>` request with a JSON payload.
///
/// The payload always carries the target `entity_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCall {
    pub domain: String,
    pub action: String,
    pub payload: Map<String, Value>,
}

impl ServiceCall {
    /// Create a call targeting one entity.
    #[must_use]
    pub fn new(domain: impl Into<String>, action: impl Into<String>, target: &EntityId) -> Self {
        let mut payload = Map::new();
        payload.insert(
            "entity_id".to_string(),
            Value::String(target.as_str().to_string()),
        );
        Self {
            domain: domain.into(),
            action: action.into(),
            payload,
        }
    }

    /// Add a payload field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// `<domain>/<action>`, appended to `/api/services/`.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}", self.domain, self.action)
    }

    /// Parse a `<domain>.<action>` or `<domain>/<action>` pair into an empty call.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedServicePath`] when either part is
    /// missing.
    pub fn parse(path: &str, target: &EntityId) -> Result<Self, ValidationError> {
        let (domain, action) = path
            .split_once(['.', '/'])
            .filter(|(d, a)| !d.is_empty() && !a.is_empty())
            .ok_or_else(|| ValidationError::MalformedServicePath(path.to_string()))?;
        Ok(Self::new(domain, action, target))
    }

    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.payload.get("entity_id").and_then(Value::as_str)
    }
}

impl fmt::Display for ServiceCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.action)
    }
}
