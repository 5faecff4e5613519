//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`MirrorError`] via `#[from]` when crossing a port boundary.

/// Top-level error shared by the domain and application layers.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// A value violated a domain invariant.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The requested item does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// The entity or adapter does not support the requested operation.
    #[error("unsupported operation")]
    Unsupported(#[from] UnsupportedError),

    /// An IO collaborator (websocket, REST, …) failed.
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Entity ids must look like `<domain>.<name>`.
    #[error("malformed entity id {0:?}, expected <domain>.<name>")]
    MalformedEntityId(String),

    /// Service paths must look like `<domain>/<action>`.
    #[error("malformed service path {0:?}, expected <domain>/<action>")]
    MalformedServicePath(String),

    /// Native ids must look like `<prefix>:<id>`.
    #[error("malformed native id {0:?}, expected <prefix>:<id>")]
    MalformedNativeId(String),
}

/// Lookup failure for a named item.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of item (e.g. `"Entity"`, `"Adapter"`).
    pub entity: &'static str,
    /// The identifier that was looked up.
    pub id: String,
}

/// An operation the target does not implement.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{target} does not support {operation}")]
pub struct UnsupportedError {
    /// What was asked (e.g. the adapter's native id).
    pub target: String,
    /// The operation that was requested.
    pub operation: String,
}
