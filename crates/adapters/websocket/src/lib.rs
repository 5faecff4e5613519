//! # hamirror-adapter-websocket
//!
//! Websocket transport: the realtime link delta frames arrive on.
//!
//! ## Responsibilities
//! - Open the hub's websocket endpoint and run the `auth` handshake
//! - Subscribe to explicit entity ids (`subscribe_entities`) and cancel
//!   subscriptions (`unsubscribe_events`)
//! - Route `event` messages to a bounded queue per subscription, dropping
//!   and counting frames that do not fit
//! - Report liveness so the supervisor can reconnect
//!
//! ## Dependency rule
//! Implements `HubTransport` / `HubConnection` from `hamirror-app`. Knows
//! nothing about device adapters or the state store.

mod config;
mod connection;
mod error;
mod protocol;
mod transport;

pub use config::WebsocketConfig;
pub use connection::WsConnection;
pub use error::WsError;
pub use transport::WsTransport;
