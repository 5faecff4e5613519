//! Realtime transport port: the persistent connection delta frames arrive on.
//!
//! A [`HubTransport`] opens authenticated [`HubConnection`]s. Authentication
//! is part of `connect`: an implementation only returns a connection once the
//! hub accepted its credentials.

use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;

use hamirror_domain::delta::DeltaMessage;
use hamirror_domain::entity::EntityId;
use hamirror_domain::error::MirrorError;

/// Hub-assigned id of an entity subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An active subscription: its id and the frames delivered for it, in order.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub frames: mpsc::Receiver<DeltaMessage>,
}

/// Errors raised by a transport. All of them are retryable.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect: {0}")]
    Connect(String),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("connection closed")]
    Closed,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<TransportError> for MirrorError {
    fn from(err: TransportError) -> Self {
        Self::Transport(Box::new(err))
    }
}

/// Opens connections to the hub.
pub trait HubTransport: Send + Sync + 'static {
    type Connection: HubConnection;

    /// Connect and authenticate.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// One authenticated connection.
pub trait HubConnection: Send + Sync + 'static {
    /// Subscribe to state changes of exactly `ids`.
    ///
    /// The first frame of a subscription carries the full current state of
    /// every id in `added`.
    fn subscribe(
        &self,
        ids: &[EntityId],
    ) -> impl Future<Output = Result<Subscription, TransportError>> + Send;

    /// Cancel a subscription. No frame is delivered for it afterwards.
    fn unsubscribe(
        &self,
        id: SubscriptionId,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Whether the underlying socket is still usable.
    fn is_alive(&self) -> bool;

    /// Number of frames discarded under overload since the last call.
    fn take_dropped_frames(&self) -> u64;

    fn close(&self) -> impl Future<Output = ()> + Send;
}
