//! Connection supervisor: establishes, watches and recovers the realtime link.
//!
//! ## Lifecycle
//!
//! 1. [`Supervisor::start`] runs the retry loop: connect (bounded by
//!    `connect_timeout`), sleep `retry_delay` on failure, give up after
//!    `max_retries` attempts and halt.
//! 2. Every successful connection immediately subscribes to the engine's
//!    interest set. A pump task feeds the subscription's frames to the engine.
//! 3. [`Supervisor::spawn_watchdog`] ticks every `watchdog_period` and
//!    reconnects when no message arrived for `message_staleness`, or when the
//!    transport reports itself dead and the last connection is older than
//!    `connection_staleness`. Frames dropped by the transport trigger a
//!    re-subscription instead.
//! 4. [`Supervisor::shutdown`] stops the watchdog, closes the transport and
//!    refuses any later reconnect.
//!
//! At most one reconnect runs at a time; concurrent triggers are coalesced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use hamirror_domain::delta::DeltaMessage;

use crate::guard::FlagGuard;
use crate::ports::{HubConnection, HubTransport, SubscriptionId, TransportError};
use crate::sync_engine::SyncEngine;

/// Timing and retry knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub connect_timeout: Duration,
    pub watchdog_period: Duration,
    pub message_staleness: Duration,
    pub connection_staleness: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(10),
            max_retries: 20,
            connect_timeout: Duration::from_secs(15),
            watchdog_period: Duration::from_secs(30),
            message_staleness: Duration::from_secs(600),
            connection_staleness: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("hub unreachable after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("supervisor is shut down")]
    ShutDown,
}

/// Why the watchdog decided to reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// No delta message for longer than `message_staleness`.
    Messages,
    /// Transport dead for longer than `connection_staleness`.
    Connection,
}

/// Outcome of one watchdog tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// Not started yet, or shut down.
    Idle,
    /// Retries were exhausted; waiting for an external trigger.
    Halted,
    ReconnectInFlight,
    Healthy,
    Resubscribed,
    ResubscribeFailed,
    Reconnected(Staleness),
    ReconnectFailed(Staleness),
}

struct Link<C> {
    connection: C,
    subscription: Option<SubscriptionId>,
    pump: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
struct Activity {
    last_message: Option<Instant>,
    last_connected: Option<Instant>,
}

fn lock_activity(activity: &StdMutex<Activity>) -> MutexGuard<'_, Activity> {
    activity.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Supervisor<T: HubTransport> {
    transport: T,
    config: SupervisorConfig,
    engine: Arc<SyncEngine>,
    link: Mutex<Option<Link<T::Connection>>>,
    activity: Arc<StdMutex<Activity>>,
    reconnecting: AtomicBool,
    halted: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl<T: HubTransport> Supervisor<T> {
    #[must_use]
    pub fn new(transport: T, engine: Arc<SyncEngine>, config: SupervisorConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            transport,
            config,
            engine,
            link: Mutex::new(None),
            activity: Arc::default(),
            reconnecting: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            shutdown,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// `true` after the retry budget ran out, until the next trigger.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub async fn is_connected(&self) -> bool {
        self.link
            .lock()
            .await
            .as_ref()
            .is_some_and(|link| link.connection.is_alive())
    }

    /// Connect, subscribe and start pumping frames.
    ///
    /// Returns `Ok(())` without doing anything when a reconnect is already
    /// in flight.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::RetriesExhausted`] after `max_retries`
    /// failed attempts, or [`SupervisorError::ShutDown`] once
    /// [`shutdown`](Self::shutdown) was called.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        self.reconnect().await
    }

    /// Clear a halt and run the retry loop again.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub async fn trigger_reconnect(&self) -> Result<(), SupervisorError> {
        self.halted.store(false, Ordering::Release);
        self.reconnect().await
    }

    async fn reconnect(&self) -> Result<(), SupervisorError> {
        if self.is_shut_down() {
            return Err(SupervisorError::ShutDown);
        }
        let Some(_in_flight) = FlagGuard::acquire(&self.reconnecting) else {
            tracing::debug!("reconnect already in flight");
            return Ok(());
        };

        self.teardown().await;
        let mut shutdown = self.shutdown.subscribe();
        let max_retries = self.config.max_retries;

        for attempt in 1..=max_retries {
            if self.is_shut_down() {
                return Err(SupervisorError::ShutDown);
            }
            let outcome = tokio::select! {
                outcome = self.connect_once() => outcome,
                _ = shutdown.changed() => return Err(SupervisorError::ShutDown),
            };
            let err = match outcome {
                Ok(()) => {
                    self.halted.store(false, Ordering::Release);
                    tracing::info!(attempt, "connected to hub");
                    return Ok(());
                }
                Err(_) if self.is_shut_down() => return Err(SupervisorError::ShutDown),
                Err(err) => err,
            };

            let remaining = max_retries - attempt;
            if remaining == 0 {
                tracing::warn!(attempt, remaining, %err, "connection attempt failed");
                break;
            }
            tracing::warn!(
                attempt,
                remaining,
                delay_secs = self.config.retry_delay.as_secs(),
                %err,
                "connection attempt failed, retrying"
            );
            tokio::select! {
                () = tokio::time::sleep(self.config.retry_delay) => {}
                _ = shutdown.changed() => return Err(SupervisorError::ShutDown),
            }
        }

        self.halted.store(true, Ordering::Release);
        tracing::error!(
            attempts = max_retries,
            "hub unreachable, giving up until reconnect is triggered"
        );
        Err(SupervisorError::RetriesExhausted {
            attempts: max_retries,
        })
    }

    async fn connect_once(&self) -> Result<(), TransportError> {
        let timeout = self.config.connect_timeout;
        let connection = tokio::time::timeout(timeout, self.transport.connect())
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;

        {
            let now = Instant::now();
            let mut activity = lock_activity(&self.activity);
            activity.last_connected = Some(now);
            activity.last_message = Some(now);
        }

        let mut link = Link {
            connection,
            subscription: None,
            pump: None,
        };
        if let Err(err) = self.subscribe(&mut link).await {
            link.connection.close().await;
            return Err(err);
        }

        // `shutdown` raises the flag before taking this lock to tear down.
        let mut slot = self.link.lock().await;
        if self.is_shut_down() {
            drop(slot);
            if let Some(pump) = link.pump.take() {
                pump.abort();
            }
            link.connection.close().await;
            tracing::debug!("shut down while connecting, discarding connection");
            return Err(TransportError::Closed);
        }
        *slot = Some(link);
        Ok(())
    }

    /// Replace the link's subscription with one for the current interest set.
    async fn subscribe(&self, link: &mut Link<T::Connection>) -> Result<(), TransportError> {
        if let Some(previous) = link.subscription.take() {
            if let Err(err) = link.connection.unsubscribe(previous).await {
                tracing::warn!(subscription = %previous, %err, "failed to cancel previous subscription");
            }
        }
        if let Some(pump) = link.pump.take() {
            pump.abort();
        }

        let interest = self.engine.interest();
        if interest.is_empty() {
            tracing::debug!("interest set is empty, not subscribing");
            return Ok(());
        }
        let subscription = link.connection.subscribe(&interest).await?;
        tracing::info!(
            subscription = %subscription.id,
            entities = interest.len(),
            "subscribed to entity updates"
        );
        link.subscription = Some(subscription.id);
        link.pump = Some(self.spawn_pump(subscription.frames));
        Ok(())
    }

    fn spawn_pump(&self, mut frames: mpsc::Receiver<DeltaMessage>) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let activity = Arc::clone(&self.activity);
        tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                lock_activity(&activity).last_message = Some(Instant::now());
                engine.handle_frame(&frame);
            }
            tracing::debug!("subscription stream ended");
        })
    }

    /// Re-issue the subscription on the current connection.
    ///
    /// Returns `Ok(false)` when there is no connection to subscribe on.
    ///
    /// # Errors
    ///
    /// Returns the transport error raised by the subscribe request.
    pub async fn resubscribe(&self) -> Result<bool, TransportError> {
        let mut link = self.link.lock().await;
        let Some(link) = link.as_mut() else {
            return Ok(false);
        };
        self.subscribe(link).await?;
        Ok(true)
    }

    async fn teardown(&self) {
        let Some(mut link) = self.link.lock().await.take() else {
            return;
        };
        if let Some(pump) = link.pump.take() {
            pump.abort();
        }
        link.connection.close().await;
        tracing::debug!("transport closed");
    }

    /// Run one watchdog evaluation.
    pub async fn check(&self) -> WatchdogVerdict {
        if self.is_shut_down() {
            return WatchdogVerdict::Idle;
        }
        if self.is_halted() {
            return WatchdogVerdict::Halted;
        }
        if self.reconnecting.load(Ordering::Acquire) {
            return WatchdogVerdict::ReconnectInFlight;
        }

        let (last_message, last_connected) = {
            let activity = lock_activity(&self.activity);
            (activity.last_message, activity.last_connected)
        };
        let Some(last_connected) = last_connected else {
            return WatchdogVerdict::Idle;
        };

        let (alive, subscribed, dropped) = match self.link.lock().await.as_ref() {
            Some(link) => (
                link.connection.is_alive(),
                link.subscription.is_some(),
                link.connection.take_dropped_frames(),
            ),
            None => (false, false, 0),
        };

        let now = Instant::now();
        let stale = if !alive
            && now.duration_since(last_connected) > self.config.connection_staleness
        {
            Some(Staleness::Connection)
        } else if subscribed
            && last_message
                .is_some_and(|at| now.duration_since(at) > self.config.message_staleness)
        {
            Some(Staleness::Messages)
        } else {
            None
        };

        if let Some(reason) = stale {
            tracing::warn!(?reason, "hub link is stale, reconnecting");
            return match self.reconnect().await {
                Ok(()) => WatchdogVerdict::Reconnected(reason),
                Err(err) => {
                    tracing::error!(%err, "watchdog reconnect failed");
                    WatchdogVerdict::ReconnectFailed(reason)
                }
            };
        }

        if dropped > 0 {
            tracing::warn!(dropped, "transport dropped frames, resubscribing for a fresh snapshot");
            return match self.resubscribe().await {
                Ok(_) => WatchdogVerdict::Resubscribed,
                Err(err) => {
                    tracing::warn!(%err, "resubscribe failed");
                    WatchdogVerdict::ResubscribeFailed
                }
            };
        }

        WatchdogVerdict::Healthy
    }

    /// Spawn the periodic watchdog. It stops on [`shutdown`](Self::shutdown).
    pub fn spawn_watchdog(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        let period = self.config.watchdog_period;
        tokio::spawn(async move {
            if *shutdown.borrow_and_update() {
                return;
            }
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let verdict = this.check().await;
                        tracing::trace!(?verdict, "watchdog tick");
                    }
                    _ = shutdown.changed() => break,
                }
            }
            tracing::debug!("watchdog stopped");
        })
    }

    /// Stop the watchdog, close the transport and refuse further reconnects.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        self.teardown().await;
        tracing::info!("supervisor shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, AtomicUsize};

    use hamirror_domain::entity::EntityId;
    use serde_json::json;
    use tokio::sync::Notify;

    use crate::ports::Subscription;

    #[derive(Default)]
    struct Shared {
        alive: AtomicBool,
        dropped: AtomicU64,
        closed: AtomicUsize,
        next_subscription: AtomicU64,
        subscriptions: StdMutex<Vec<Vec<EntityId>>>,
        unsubscribed: StdMutex<Vec<SubscriptionId>>,
        sender: StdMutex<Option<mpsc::Sender<DeltaMessage>>>,
    }

    struct FakeConnection {
        shared: Arc<Shared>,
    }

    impl HubConnection for FakeConnection {
        fn subscribe(
            &self,
            ids: &[EntityId],
        ) -> impl Future<Output = Result<Subscription, TransportError>> + Send {
            self.shared.subscriptions.lock().unwrap().push(ids.to_vec());
            let id = SubscriptionId(self.shared.next_subscription.fetch_add(1, Ordering::SeqCst) + 1);
            let (tx, frames) = mpsc::channel(8);
            *self.shared.sender.lock().unwrap() = Some(tx);
            async move { Ok(Subscription { id, frames }) }
        }

        fn unsubscribe(
            &self,
            id: SubscriptionId,
        ) -> impl Future<Output = Result<(), TransportError>> + Send {
            self.shared.unsubscribed.lock().unwrap().push(id);
            async { Ok(()) }
        }

        fn is_alive(&self) -> bool {
            self.shared.alive.load(Ordering::SeqCst)
        }

        fn take_dropped_frames(&self) -> u64 {
            self.shared.dropped.swap(0, Ordering::SeqCst)
        }

        fn close(&self) -> impl Future<Output = ()> + Send {
            self.shared.alive.store(false, Ordering::SeqCst);
            self.shared.closed.fetch_add(1, Ordering::SeqCst);
            async {}
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        shared: Arc<Shared>,
        /// Outcome of each connect call; `Ok` once exhausted.
        script: StdMutex<VecDeque<Result<(), TransportError>>>,
        delay: Option<Duration>,
        /// Connects block until notified.
        gate: Option<Arc<Notify>>,
        connects: AtomicUsize,
    }

    impl FakeTransport {
        fn failing(times: usize) -> Self {
            let transport = Self::default();
            transport.script.lock().unwrap().extend(
                (0..times).map(|_| Err(TransportError::Connect("refused".to_string()))),
            );
            transport
        }
    }

    impl HubTransport for Arc<FakeTransport> {
        type Connection = FakeConnection;

        fn connect(&self) -> impl Future<Output = Result<FakeConnection, TransportError>> + Send {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
            let delay = self.delay;
            let gate = self.gate.clone();
            let shared = Arc::clone(&self.shared);
            async move {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                outcome.map(|()| {
                    shared.alive.store(true, Ordering::SeqCst);
                    FakeConnection { shared }
                })
            }
        }
    }

    fn id(value: &str) -> EntityId {
        EntityId::parse(value).unwrap()
    }

    fn gated() -> (Arc<FakeTransport>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(FakeTransport {
            gate: Some(Arc::clone(&gate)),
            ..FakeTransport::default()
        });
        (transport, gate)
    }

    async fn wait_for_connects(transport: &FakeTransport, count: usize) {
        while transport.connects.load(Ordering::SeqCst) < count {
            tokio::task::yield_now().await;
        }
    }

    fn supervisor(
        transport: &Arc<FakeTransport>,
        config: SupervisorConfig,
    ) -> Arc<Supervisor<Arc<FakeTransport>>> {
        let engine = Arc::new(SyncEngine::new());
        engine.track([id("lock.front")]);
        Arc::new(Supervisor::new(Arc::clone(transport), engine, config))
    }

    #[tokio::test(start_paused = true)]
    async fn should_subscribe_to_interest_set_after_connecting() {
        let transport = Arc::new(FakeTransport::default());
        let sup = supervisor(&transport, SupervisorConfig::default());

        sup.start().await.unwrap();

        assert!(sup.is_connected().await);
        assert_eq!(
            *transport.shared.subscriptions.lock().unwrap(),
            vec![vec![id("lock.front")]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_pump_frames_into_engine() {
        let transport = Arc::new(FakeTransport::default());
        let sup = supervisor(&transport, SupervisorConfig::default());
        sup.start().await.unwrap();

        let sender = transport.shared.sender.lock().unwrap().clone().unwrap();
        let frame = serde_json::from_value(json!({"a": {"lock.front": {"s": "locked", "a": {}}}}))
            .unwrap();
        sender.send(frame).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            sup.engine.record(&id("lock.front")).unwrap().state(),
            Some("locked")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_retry_with_fixed_delay_until_connected() {
        let transport = Arc::new(FakeTransport::failing(2));
        let sup = supervisor(&transport, SupervisorConfig::default());
        let started = Instant::now();

        sup.start().await.unwrap();

        assert_eq!(transport.connects.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn should_halt_when_retries_are_exhausted() {
        let transport = Arc::new(FakeTransport::failing(3));
        let config = SupervisorConfig {
            max_retries: 3,
            ..SupervisorConfig::default()
        };
        let sup = supervisor(&transport, config);

        let err = sup.start().await.unwrap_err();

        assert_eq!(err, SupervisorError::RetriesExhausted { attempts: 3 });
        assert!(sup.is_halted());
        assert_eq!(sup.check().await, WatchdogVerdict::Halted);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn should_resume_after_external_trigger() {
        let transport = Arc::new(FakeTransport::failing(1));
        let config = SupervisorConfig {
            max_retries: 1,
            ..SupervisorConfig::default()
        };
        let sup = supervisor(&transport, config);
        assert!(sup.start().await.is_err());

        sup.trigger_reconnect().await.unwrap();

        assert!(!sup.is_halted());
        assert!(sup.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn should_coalesce_concurrent_reconnects() {
        let transport = Arc::new(FakeTransport {
            delay: Some(Duration::from_secs(1)),
            ..FakeTransport::default()
        });
        let sup = supervisor(&transport, SupervisorConfig::default());

        let (first, second) = tokio::join!(sup.start(), sup.trigger_reconnect());

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_slow_connects() {
        let transport = Arc::new(FakeTransport {
            delay: Some(Duration::from_secs(60)),
            ..FakeTransport::default()
        });
        let config = SupervisorConfig {
            max_retries: 1,
            ..SupervisorConfig::default()
        };
        let sup = supervisor(&transport, config);
        let started = Instant::now();

        let err = sup.start().await.unwrap_err();

        assert_eq!(err, SupervisorError::RetriesExhausted { attempts: 1 });
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn should_stay_healthy_when_quiet_for_less_than_threshold() {
        let transport = Arc::new(FakeTransport::default());
        let sup = supervisor(&transport, SupervisorConfig::default());
        sup.start().await.unwrap();

        tokio::time::advance(Duration::from_secs(300)).await;

        assert_eq!(sup.check().await, WatchdogVerdict::Healthy);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_reconnect_when_messages_are_stale() {
        let transport = Arc::new(FakeTransport::default());
        let sup = supervisor(&transport, SupervisorConfig::default());
        sup.start().await.unwrap();

        tokio::time::advance(Duration::from_secs(601)).await;

        assert_eq!(
            sup.check().await,
            WatchdogVerdict::Reconnected(Staleness::Messages)
        );
        assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
        assert_eq!(transport.shared.closed.load(Ordering::SeqCst), 1);
        assert_eq!(transport.shared.subscriptions.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_reconnect_when_transport_dead_past_threshold() {
        let transport = Arc::new(FakeTransport::default());
        let sup = supervisor(&transport, SupervisorConfig::default());
        sup.start().await.unwrap();
        transport.shared.alive.store(false, Ordering::SeqCst);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(sup.check().await, WatchdogVerdict::Healthy);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(
            sup.check().await,
            WatchdogVerdict::Reconnected(Staleness::Connection)
        );
        assert!(sup.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn should_resubscribe_when_frames_were_dropped() {
        let transport = Arc::new(FakeTransport::default());
        let sup = supervisor(&transport, SupervisorConfig::default());
        sup.start().await.unwrap();
        transport.shared.dropped.store(2, Ordering::SeqCst);

        assert_eq!(sup.check().await, WatchdogVerdict::Resubscribed);

        assert_eq!(
            *transport.shared.unsubscribed.lock().unwrap(),
            vec![SubscriptionId(1)]
        );
        assert_eq!(transport.shared.subscriptions.lock().unwrap().len(), 2);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_refuse_reconnect_after_shutdown() {
        let transport = Arc::new(FakeTransport::default());
        let sup = supervisor(&transport, SupervisorConfig::default());
        sup.start().await.unwrap();

        sup.shutdown().await;

        assert_eq!(sup.start().await, Err(SupervisorError::ShutDown));
        assert_eq!(sup.check().await, WatchdogVerdict::Idle);
        assert!(!sup.is_connected().await);
        assert_eq!(transport.shared.closed.load(Ordering::SeqCst), 1);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_watchdog_on_shutdown() {
        let transport = Arc::new(FakeTransport::default());
        let sup = supervisor(&transport, SupervisorConfig::default());
        sup.start().await.unwrap();
        let watchdog = sup.spawn_watchdog();

        tokio::time::sleep(Duration::from_secs(95)).await;
        sup.shutdown().await;

        watchdog.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_retrying_when_shut_down_during_backoff() {
        let transport = Arc::new(FakeTransport::failing(5));
        let sup = supervisor(&transport, SupervisorConfig::default());

        let runner = {
            let sup = Arc::clone(&sup);
            tokio::spawn(async move { sup.start().await })
        };
        tokio::time::sleep(Duration::from_secs(15)).await;
        sup.shutdown().await;

        assert_eq!(runner.await.unwrap(), Err(SupervisorError::ShutDown));
        assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_discard_connection_established_after_shutdown() {
        let transport = Arc::new(FakeTransport::default());
        let sup = supervisor(&transport, SupervisorConfig::default());
        sup.shutdown().await;

        let err = sup.connect_once().await.unwrap_err();

        assert!(matches!(err, TransportError::Closed));
        assert!(!sup.is_connected().await);
        assert!(!transport.shared.alive.load(Ordering::SeqCst));
        assert_eq!(transport.shared.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn should_leave_nothing_connected_when_shutdown_races_connect() {
        for _ in 0..50 {
            let (transport, gate) = gated();
            let sup = supervisor(&transport, SupervisorConfig::default());
            let runner = {
                let sup = Arc::clone(&sup);
                tokio::spawn(async move { sup.start().await })
            };

            sup.shutdown().await;
            gate.notify_one();

            assert_eq!(runner.await.unwrap(), Err(SupervisorError::ShutDown));
            assert!(!sup.is_connected().await);
            assert!(!transport.shared.alive.load(Ordering::SeqCst));
        }
    }

    #[tokio::test]
    async fn should_coalesce_watchdog_check_into_running_reconnect() {
        let (transport, gate) = gated();
        let sup = supervisor(&transport, SupervisorConfig::default());
        let runner = {
            let sup = Arc::clone(&sup);
            tokio::spawn(async move { sup.start().await })
        };
        wait_for_connects(&transport, 1).await;

        assert_eq!(sup.check().await, WatchdogVerdict::ReconnectInFlight);
        assert_eq!(sup.check().await, WatchdogVerdict::ReconnectInFlight);

        gate.notify_one();
        runner.await.unwrap().unwrap();

        assert!(sup.is_connected().await);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
        assert_eq!(transport.shared.subscriptions.lock().unwrap().len(), 1);
        assert_eq!(sup.check().await, WatchdogVerdict::Healthy);
    }
}
