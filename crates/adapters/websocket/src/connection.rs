//! One authenticated hub connection.
//!
//! A reader task owns the receiving half of the socket and routes every
//! message through the [`Router`]: results and pongs to the request waiting
//! for them, events to the queue of their subscription. Queues are bounded;
//! a frame that does not fit is dropped and counted.
//!
//! A heartbeat task pings the hub every `ping_interval`. A ping left
//! unanswered for `request_timeout` marks the connection dead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use hamirror_app::ports::transport::{
    HubConnection, Subscription, SubscriptionId, TransportError,
};
use hamirror_domain::delta::DeltaMessage;
use hamirror_domain::entity::EntityId;

use crate::config::WebsocketConfig;
use crate::error::WsError;
use crate::protocol::{Inbound, Outbound};

pub(crate) type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type Writer = SplitSink<Socket, Message>;
pub(crate) type Reader = SplitStream<Socket>;

type Reply = Result<(), WsError>;

#[derive(Debug, Default)]
struct Routes {
    pending: HashMap<u64, oneshot::Sender<Reply>>,
    subscriptions: HashMap<u64, mpsc::Sender<DeltaMessage>>,
}

/// Routing state shared by a connection and its reader task.
#[derive(Debug)]
pub(crate) struct Router {
    routes: Mutex<Routes>,
    alive: AtomicBool,
    dropped: AtomicU64,
}

impl Router {
    pub(crate) fn new() -> Self {
        Self {
            routes: Mutex::default(),
            alive: AtomicBool::new(true),
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Routes> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expect_reply(&self, id: u64) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.lock().pending.insert(id, tx);
        rx
    }

    fn cancel(&self, id: u64) {
        self.lock().pending.remove(&id);
    }

    fn open_subscription(&self, id: u64, depth: usize) -> mpsc::Receiver<DeltaMessage> {
        let (tx, rx) = mpsc::channel(depth);
        self.lock().subscriptions.insert(id, tx);
        rx
    }

    /// Stop routing events for `id`. Returns `true` if it was open.
    fn close_subscription(&self, id: u64) -> bool {
        self.lock().subscriptions.remove(&id).is_some()
    }

    pub(crate) fn route(&self, message: Inbound) {
        match message {
            Inbound::Result { id, success, error } => {
                let outcome = if success {
                    Ok(())
                } else {
                    let error = error.unwrap_or_default();
                    Err(WsError::RequestFailed {
                        id,
                        code: error.code,
                        message: error.message,
                    })
                };
                self.reply(id, outcome);
            }
            Inbound::Pong { id } => self.reply(id, Ok(())),
            Inbound::Event { id, event } => self.deliver(id, event),
            other => tracing::debug!(kind = other.kind(), "ignoring hub message"),
        }
    }

    fn reply(&self, id: u64, outcome: Reply) {
        let Some(reply) = self.lock().pending.remove(&id) else {
            tracing::trace!(id, "reply for a request nobody waits for");
            return;
        };
        let _ = reply.send(outcome);
    }

    fn deliver(&self, id: u64, frame: DeltaMessage) {
        let mut routes = self.lock();
        let Some(queue) = routes.subscriptions.get(&id) else {
            tracing::debug!(subscription = id, "event for a closed subscription");
            return;
        };
        match queue.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(subscription = id, dropped, "subscription queue full, dropping frame");
            }
            Err(TrySendError::Closed(_)) => {
                routes.subscriptions.remove(&id);
            }
        }
    }

    /// Mark the connection dead and release everyone waiting on it.
    pub(crate) fn shut(&self) {
        self.alive.store(false, Ordering::Release);
        let mut routes = self.lock();
        routes.pending.clear();
        routes.subscriptions.clear();
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

async fn read_loop(mut reader: Reader, router: Arc<Router>) {
    while let Some(message) = reader.next().await {
        match message {
            Ok(Message::Text(text)) => match Inbound::parse(&text) {
                Ok(inbound) => router.route(inbound),
                Err(err) => tracing::warn!(%err, "skipping malformed hub message"),
            },
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "hub closed the connection");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(%err, "websocket read failed");
                break;
            }
        }
    }
    router.shut();
}

/// Sending side of a connection, shared with the heartbeat task.
struct Session {
    writer: tokio::sync::Mutex<Writer>,
    router: Arc<Router>,
    next_id: AtomicU64,
    request_timeout: Duration,
}

impl Session {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn send(&self, message: &Outbound<'_>) -> Result<(), WsError> {
        let text = message.to_text().map_err(WsError::Json)?;
        self.writer
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(WsError::from)
    }

    /// Send a request and wait for its `result` (or `pong`).
    async fn request(&self, id: u64, message: &Outbound<'_>) -> Result<(), WsError> {
        if !self.router.is_alive() {
            return Err(WsError::Closed);
        }
        let reply = self.router.expect_reply(id);
        if let Err(err) = self.send(message).await {
            self.router.cancel(id);
            return Err(err);
        }
        match tokio::time::timeout(self.request_timeout, reply).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(WsError::Closed),
            Err(_) => {
                self.router.cancel(id);
                Err(WsError::Timeout(self.request_timeout))
            }
        }
    }
}

async fn heartbeat(session: Arc<Session>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !session.router.is_alive() {
            break;
        }
        let id = session.next_id();
        match session.request(id, &Outbound::Ping { id }).await {
            Ok(()) => tracing::trace!(id, "pong received"),
            Err(WsError::Timeout(after)) => {
                tracing::warn!(?after, "hub did not answer ping, marking connection dead");
                session.router.shut();
                break;
            }
            Err(err) => {
                tracing::warn!(%err, "ping failed, marking connection dead");
                session.router.shut();
                break;
            }
        }
    }
}

/// A live, authenticated websocket to the hub.
pub struct WsConnection {
    session: Arc<Session>,
    reader: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
    queue_depth: usize,
}

impl WsConnection {
    pub(crate) fn spawn(writer: Writer, reader: Reader, config: &WebsocketConfig) -> Self {
        let router = Arc::new(Router::new());
        let reader = tokio::spawn(read_loop(reader, Arc::clone(&router)));
        let session = Arc::new(Session {
            writer: tokio::sync::Mutex::new(writer),
            router,
            next_id: AtomicU64::new(1),
            request_timeout: config.request_timeout(),
        });
        let heartbeat = config
            .ping_interval()
            .map(|period| tokio::spawn(heartbeat(Arc::clone(&session), period)));
        Self {
            session,
            reader,
            heartbeat,
            queue_depth: config.queue_depth(),
        }
    }

    fn router(&self) -> &Router {
        &self.session.router
    }

    fn stop_tasks(&self) {
        self.reader.abort();
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.abort();
        }
    }

    async fn open(&self, ids: &[EntityId]) -> Result<Subscription, WsError> {
        let id = self.session.next_id();
        // Registered before sending: the first event may follow the result
        // before this task is polled again.
        let frames = self.router().open_subscription(id, self.queue_depth);
        let request = Outbound::SubscribeEntities { id, entity_ids: ids };
        if let Err(err) = self.session.request(id, &request).await {
            self.router().close_subscription(id);
            return Err(err);
        }
        tracing::debug!(subscription = id, entities = ids.len(), "subscribed to entities");
        Ok(Subscription {
            id: SubscriptionId(id),
            frames,
        })
    }

    async fn cancel(&self, subscription: SubscriptionId) -> Result<(), WsError> {
        if !self.router().close_subscription(subscription.0) {
            tracing::debug!(%subscription, "subscription already closed");
        }
        let id = self.session.next_id();
        let request = Outbound::UnsubscribeEvents {
            id,
            subscription: subscription.0,
        };
        self.session.request(id, &request).await
    }
}

impl HubConnection for WsConnection {
    async fn subscribe(&self, ids: &[EntityId]) -> Result<Subscription, TransportError> {
        Ok(self.open(ids).await?)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TransportError> {
        Ok(self.cancel(id).await?)
    }

    fn is_alive(&self) -> bool {
        self.router().is_alive() && !self.reader.is_finished()
    }

    fn take_dropped_frames(&self) -> u64 {
        self.router().take_dropped()
    }

    async fn close(&self) {
        if self.router().is_alive()
            && let Err(err) = self.session.writer.lock().await.send(Message::Close(None)).await
        {
            tracing::debug!(%err, "failed to send close frame");
        }
        self.stop_tasks();
        self.router().shut();
    }
}

impl std::fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("alive", &self.router().is_alive())
            .field("queue_depth", &self.queue_depth)
            .field("heartbeat", &self.heartbeat.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(id: u64, state: &str) -> Inbound {
        serde_json::from_value(json!({
            "id": id,
            "type": "event",
            "event": {"a": {"switch.fan": {"s": state, "a": {}}}}
        }))
        .unwrap()
    }

    fn result(id: u64, success: bool) -> Inbound {
        serde_json::from_value(json!({
            "id": id,
            "type": "result",
            "success": success,
            "error": {"code": "not_found", "message": "Subscription not found."}
        }))
        .unwrap()
    }

    #[test]
    fn should_drop_and_count_frames_when_queue_is_full() {
        let router = Router::new();
        let mut frames = router.open_subscription(1, 1);

        router.route(event(1, "on"));
        router.route(event(1, "off"));
        router.route(event(1, "on"));

        assert_eq!(router.take_dropped(), 2);
        assert_eq!(router.take_dropped(), 0);
        let first = frames.try_recv().unwrap();
        assert_eq!(first.added.values().next().unwrap().state.as_deref(), Some("on"));
        assert!(frames.try_recv().is_err());
    }

    #[test]
    fn should_not_deliver_events_after_subscription_closed() {
        let router = Router::new();
        let mut frames = router.open_subscription(1, 4);

        assert!(router.close_subscription(1));
        router.route(event(1, "on"));

        assert!(frames.try_recv().is_err());
        assert_eq!(router.take_dropped(), 0);
    }

    #[test]
    fn should_ignore_events_for_other_subscriptions() {
        let router = Router::new();
        let mut frames = router.open_subscription(1, 4);
        router.route(event(2, "on"));
        assert!(frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_resolve_pending_request_with_its_result() {
        let router = Router::new();
        let ok = router.expect_reply(1);
        let failed = router.expect_reply(2);

        router.route(result(2, false));
        router.route(result(1, true));

        assert!(ok.await.unwrap().is_ok());
        assert!(matches!(
            failed.await.unwrap(),
            Err(WsError::RequestFailed { id: 2, code, message })
                if code == "not_found" && message == "Subscription not found."
        ));
    }

    #[tokio::test]
    async fn should_resolve_ping_with_its_pong() {
        let router = Router::new();
        let ping = router.expect_reply(5);

        router.route(Inbound::Pong { id: 5 });

        assert!(ping.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn should_release_waiters_when_shut() {
        let router = Router::new();
        let reply = router.expect_reply(1);
        let mut frames = router.open_subscription(2, 1);

        router.shut();

        assert!(!router.is_alive());
        assert!(reply.await.is_err());
        assert!(frames.recv().await.is_none());
    }
}
