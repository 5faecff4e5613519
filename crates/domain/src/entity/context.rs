//! Change-origin context attached to entity records.

use serde::{Deserialize, Serialize};

/// Identifies what caused the latest change of an entity on the hub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub id: Option<String>,
    pub parent_id: Option<String>,
    pub user_id: Option<String>,
}

impl Context {
    /// A context carrying only an id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }
}
