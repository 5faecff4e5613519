//! # hamirror-adapter-rest
//!
//! REST adapter: the request channel back to the hub.
//!
//! ## Responsibilities
//! - Execute outbound service calls (`POST /api/services/<domain>/<action>`)
//!   exactly once, without retry
//! - Fetch the device catalog through the template endpoint, one query per
//!   supported domain
//!
//! ## Dependency rule
//! Implements `CommandExecutor` and `DeviceCatalog` from `hamirror-app`.

mod client;
mod config;
mod error;
pub mod template;

pub use client::RestClient;
pub use config::RestConfig;
pub use error::RestError;
