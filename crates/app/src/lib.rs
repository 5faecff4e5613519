//! # hamirror-app
//!
//! Application layer: the realtime synchronization engine and its **port
//! definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement:
//!   - `HubTransport` / `HubConnection`: authenticated realtime link
//!   - `CommandExecutor`: outbound service calls
//!   - `DeviceCatalog`: bulk entity and device metadata
//! - Own the mutable state: the entity state store and the adapter cache
//! - Supervise the connection (retry loop, watchdog, re-subscription)
//! - Provide the `Hub` context the binary builds at startup
//!
//! ## Dependency rule
//! Depends on `hamirror-domain` only (plus `tokio` for tasks, timers and
//! channels). Never imports adapter crates. Adapters depend on *this* crate,
//! not the reverse.

pub mod adapter_cache;
pub mod devices;
mod guard;
pub mod hub;
pub mod ports;
pub mod state_store;
pub mod supervisor;
pub mod sync_engine;

pub use hub::{Hub, HubConfig};
