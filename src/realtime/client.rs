//! Realtime connection state machine.
//!
//! [`RealtimeClient`] owns one logical socket. It fetches an access token,
//! opens the socket through the injected [`TransportFactory`], pings on a
//! fixed interval, reconnects with bounded exponential backoff and replays
//! the [`SubscriptionRegistry`] after every successful (re)connect.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::{join_all, try_join};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::auth::TokenFetcher;
use crate::realtime::dispatcher::{EventDispatcher, ListenerHandle};
use crate::realtime::error::{RealtimeError, RealtimeResult};
use crate::realtime::handlers::MessageHandler;
use crate::realtime::subscriptions::{PendingConfirmations, SubscriptionRegistry};
use crate::realtime::transport::{InboundFrame, OutboundFrame, Transport, TransportFactory};
use crate::realtime::types::{
    Action, ConnectionState, RealtimeConfig, RealtimeEvent, SubscribeOptions,
    SubscriptionCommand, SubscriptionConfirmation,
};
use crate::shared::BackoffPolicy;

const NORMAL_CLOSURE: u16 = 1000;
const ABNORMAL_CLOSURE: u16 = 1006;
const DISCONNECT_REASON: &str = "Client disconnect";

/// How long `disconnect()` waits for the connection task to flush its close frame
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Internal command for the connection task
enum ConnectionCommand {
    Send(String),
    Close { code: u16, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectOrigin {
    /// `connect()` called by the user
    Explicit,
    /// Fired by the reconnect timer
    Reconnect,
}

type ConnectWaiter = oneshot::Sender<RealtimeResult<()>>;

enum ConnectEntry {
    AlreadyConnected,
    /// Another attempt is in flight; wait for its outcome
    Join(oneshot::Receiver<RealtimeResult<()>>),
    /// This caller starts the attempt and is registered as its first waiter
    Start {
        generation: u64,
        changed: Option<ConnectionState>,
        rx: oneshot::Receiver<RealtimeResult<()>>,
    },
}

struct Shared {
    state: ConnectionState,
    auto_reconnect: bool,
    reconnect_attempts: u32,
    /// Bumped on every connect attempt and on disconnect; stale tasks compare against it
    generation: u64,
    cmd_tx: Option<mpsc::UnboundedSender<ConnectionCommand>>,
    connection_task: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    /// Callers that joined an attempt already in flight, tagged with its generation
    connect_waiters: Vec<(u64, ConnectWaiter)>,
}

impl Shared {
    fn transition(&mut self, next: ConnectionState) -> Option<ConnectionState> {
        if self.state == next {
            return None;
        }
        tracing::debug!(from = %self.state, to = %next, "Realtime state transition");
        self.state = next;
        Some(next)
    }

    fn take_waiters(&mut self, generation: u64) -> Vec<ConnectWaiter> {
        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.connect_waiters)
            .into_iter()
            .partition(|(g, _)| *g == generation);
        self.connect_waiters = rest;
        matching.into_iter().map(|(_, tx)| tx).collect()
    }
}

struct Inner {
    config: RealtimeConfig,
    backoff: BackoffPolicy,
    token_fetcher: Arc<dyn TokenFetcher>,
    transport: Arc<dyn TransportFactory>,
    shared: Mutex<Shared>,
    registry: Mutex<SubscriptionRegistry>,
    pending: Arc<PendingConfirmations>,
    dispatcher: Arc<EventDispatcher>,
    handler: MessageHandler,
}

impl Inner {
    fn notify(&self, changed: Option<ConnectionState>) {
        if let Some(state) = changed {
            self.dispatcher.emit_state(state);
        }
    }

    async fn connect_inner(self: &Arc<Self>, origin: ConnectOrigin) -> RealtimeResult<()> {
        let entry = {
            let mut shared = self.shared.lock();
            match shared.state {
                ConnectionState::Connected => ConnectEntry::AlreadyConnected,
                ConnectionState::Connecting => {
                    let (tx, rx) = oneshot::channel();
                    let generation = shared.generation;
                    shared.connect_waiters.push((generation, tx));
                    ConnectEntry::Join(rx)
                }
                ConnectionState::Disconnected | ConnectionState::Reconnecting => {
                    if origin == ConnectOrigin::Explicit {
                        if let Some(timer) = shared.reconnect_timer.take() {
                            timer.abort();
                        }
                    }
                    shared.generation += 1;
                    let generation = shared.generation;
                    let (tx, rx) = oneshot::channel();
                    shared.connect_waiters.push((generation, tx));
                    ConnectEntry::Start {
                        generation,
                        changed: shared.transition(ConnectionState::Connecting),
                        rx,
                    }
                }
            }
        };

        let rx = match entry {
            ConnectEntry::AlreadyConnected => return Ok(()),
            ConnectEntry::Join(rx) => rx,
            ConnectEntry::Start {
                generation,
                changed,
                rx,
            } => {
                self.notify(changed);
                // The attempt owns its outcome, so a caller that stops waiting
                // cannot strand the state machine in `Connecting`.
                tokio::spawn(Arc::clone(self).run_attempt(generation, origin));
                rx
            }
        };

        rx.await.unwrap_or_else(|_| {
            Err(RealtimeError::ConnectionFailed(
                "Connect attempt abandoned".to_string(),
            ))
        })
    }

    /// Drive one connect attempt to completion and resolve its waiters.
    async fn run_attempt(self: Arc<Self>, generation: u64, origin: ConnectOrigin) {
        let Err(err) = self.establish(generation).await else {
            return;
        };

        let (changed, waiters, current) = {
            let mut shared = self.shared.lock();
            let current =
                shared.generation == generation && shared.state == ConnectionState::Connecting;
            let changed = if current {
                shared.transition(ConnectionState::Disconnected)
            } else {
                None
            };
            (changed, shared.take_waiters(generation), current)
        };

        self.notify(changed);
        for waiter in waiters {
            let _ = waiter.send(Err(err.clone()));
        }

        if current {
            tracing::warn!(error = %err, origin = ?origin, "Realtime connect attempt failed");
            self.dispatcher.emit_error(&err);
            if origin == ConnectOrigin::Reconnect {
                self.schedule_reconnect();
            }
        }
    }

    /// Fetch a token, open the socket and start the connection task.
    async fn establish(self: &Arc<Self>, generation: u64) -> RealtimeResult<()> {
        let token = self.token_fetcher.fetch_token().await?;
        self.ensure_current(generation)?;

        let url = socket_url(&self.config.url, &token);
        let transport = tokio::time::timeout(self.config.connect_timeout, self.transport.connect(&url))
            .await
            .map_err(|_| {
                RealtimeError::ConnectionFailed(format!(
                    "Timed out after {:?}",
                    self.config.connect_timeout
                ))
            })??;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (changed, waiters) = {
            let mut shared = self.shared.lock();
            if shared.generation != generation || shared.state != ConnectionState::Connecting {
                // Dropping the transport closes the socket.
                return Err(cancelled());
            }

            shared.reconnect_attempts = 0;
            shared.cmd_tx = Some(cmd_tx);
            shared.connection_task = Some(tokio::spawn(connection_task(
                Arc::downgrade(self),
                generation,
                transport,
                cmd_rx,
                self.handler.clone(),
                Arc::clone(&self.dispatcher),
                self.config.heartbeat_interval,
            )));
            (shared.transition(ConnectionState::Connected), shared.take_waiters(generation))
        };

        tracing::info!(url = %self.config.url, "Realtime connected");
        self.notify(changed);
        // Snapshot the registry before waking callers so their own subscribe
        // calls are not replayed a second time.
        self.spawn_resubscribe();
        for waiter in waiters {
            let _ = waiter.send(Ok(()));
        }
        Ok(())
    }

    fn ensure_current(&self, generation: u64) -> RealtimeResult<()> {
        let shared = self.shared.lock();
        if shared.generation == generation && shared.state == ConnectionState::Connecting {
            Ok(())
        } else {
            Err(cancelled())
        }
    }

    /// Arm the reconnect timer unless one is pending or the budget is spent.
    fn schedule_reconnect(self: &Arc<Self>) {
        let changed = {
            let mut shared = self.shared.lock();
            if !shared.auto_reconnect || shared.reconnect_timer.is_some() {
                return;
            }

            let max = self.config.max_reconnect_attempts;
            if max > 0 && shared.reconnect_attempts >= max {
                tracing::warn!(
                    attempts = shared.reconnect_attempts,
                    "Max reconnect attempts reached, giving up"
                );
                return;
            }

            shared.reconnect_attempts += 1;
            let attempt = shared.reconnect_attempts;
            let delay = self.backoff.reconnect_delay(attempt);
            let generation = shared.generation;
            tracing::info!(
                attempt,
                max_attempts = max,
                delay_ms = delay.as_millis() as u64,
                "Scheduling realtime reconnect"
            );

            let weak = Arc::downgrade(self);
            shared.reconnect_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                {
                    let mut shared = inner.shared.lock();
                    shared.reconnect_timer = None;
                    if !shared.auto_reconnect || shared.generation != generation {
                        return;
                    }
                }
                // Failures reschedule from inside run_attempt.
                if let Err(e) = inner.connect_inner(ConnectOrigin::Reconnect).await {
                    tracing::debug!(error = %e, "Reconnect attempt failed");
                }
            }));
            shared.transition(ConnectionState::Reconnecting)
        };
        self.notify(changed);
    }

    /// Socket closed underneath an established connection.
    fn handle_close(self: &Arc<Self>, generation: u64, code: u16, reason: String) {
        let changed = {
            let mut shared = self.shared.lock();
            if shared.generation != generation || shared.state != ConnectionState::Connected {
                return;
            }
            shared.cmd_tx = None;
            shared.connection_task = None;
            shared.transition(ConnectionState::Disconnected)
        };

        tracing::info!(code, reason = %reason, "Realtime connection closed");
        self.notify(changed);
        self.dispatcher
            .emit_error(&RealtimeError::ConnectionClosed { code, reason });
        self.schedule_reconnect();
    }

    async fn disconnect(&self) {
        let (cmd_tx, task, changed, waiters) = {
            let mut shared = self.shared.lock();
            shared.auto_reconnect = false;
            if let Some(timer) = shared.reconnect_timer.take() {
                timer.abort();
            }
            shared.generation += 1;
            (
                shared.cmd_tx.take(),
                shared.connection_task.take(),
                shared.transition(ConnectionState::Disconnected),
                std::mem::take(&mut shared.connect_waiters),
            )
        };

        self.notify(changed);
        for (_, waiter) in waiters {
            let _ = waiter.send(Err(cancelled()));
        }

        if let Some(tx) = cmd_tx {
            let _ = tx.send(ConnectionCommand::Close {
                code: NORMAL_CLOSURE,
                reason: DISCONNECT_REASON.to_string(),
            });
        }
        if let Some(mut task) = task {
            if tokio::time::timeout(CLOSE_GRACE_PERIOD, &mut task).await.is_err() {
                tracing::warn!("Connection task did not stop in time, aborting");
                task.abort();
            }
        }
    }

    /// Send one subscription command and wait for its confirmation.
    async fn send_command(
        &self,
        command: SubscriptionCommand,
    ) -> RealtimeResult<SubscriptionConfirmation> {
        let text = serde_json::to_string(&command)
            .map_err(|e| RealtimeError::InvalidArgument(e.to_string()))?;

        let waiter = {
            let shared = self.shared.lock();
            let tx = match (&shared.state, &shared.cmd_tx) {
                (ConnectionState::Connected, Some(tx)) => tx,
                _ => return Err(RealtimeError::NotConnected),
            };
            let waiter = self.pending.register(command.key());
            if tx.send(ConnectionCommand::Send(text)).is_err() {
                return Err(RealtimeError::NotConnected);
            }
            waiter
        };

        tracing::debug!(
            action = ?command.action,
            subscription_type = ?command.subscription_type,
            items = command.items().len(),
            "Sent subscription command"
        );
        waiter.wait(self.config.confirmation_timeout).await
    }

    /// Replay the registry in the background. Failures become error notifications.
    fn spawn_resubscribe(self: &Arc<Self>) {
        let commands = self.registry.lock().resubscribe_commands();
        if commands.is_empty() {
            return;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let results = join_all(commands.into_iter().map(|c| inner.send_command(c))).await;
            for result in results {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Resubscribe failed");
                    inner.dispatcher.emit_error(&e);
                }
            }
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let shared = self.shared.get_mut();
        if let Some(timer) = shared.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(task) = shared.connection_task.take() {
            task.abort();
        }
    }
}

fn cancelled() -> RealtimeError {
    RealtimeError::ConnectionFailed("Connection attempt cancelled by disconnect".to_string())
}

/// Append the access token as a query parameter.
fn socket_url(base: &str, token: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", base, separator, urlencoding::encode(token))
}

async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Background task owning the socket for one connection.
async fn connection_task(
    inner: Weak<Inner>,
    generation: u64,
    transport: Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    handler: MessageHandler,
    dispatcher: Arc<EventDispatcher>,
    heartbeat_interval: Duration,
) {
    let Transport {
        mut sink,
        mut stream,
    } = transport;

    // A zero interval disables the heartbeat.
    let mut heartbeat = (!heartbeat_interval.is_zero()).then(|| {
        let mut interval =
            tokio::time::interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    let (code, reason) = loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(InboundFrame::Text(text))) => handler.handle_message(&text),
                Some(Ok(InboundFrame::Close { code, reason })) => break (code, reason),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Realtime transport error");
                    dispatcher.emit_error(&e);
                }
                None => break (ABNORMAL_CLOSURE, "Connection lost".to_string()),
            },

            cmd = cmd_rx.recv() => match cmd {
                Some(ConnectionCommand::Send(text)) => {
                    if let Err(e) = sink.send(OutboundFrame::Text(text)).await {
                        tracing::warn!(error = %e, "Failed to send realtime frame");
                        dispatcher.emit_error(&RealtimeError::SendFailed(e.to_string()));
                    }
                }
                Some(ConnectionCommand::Close { code, reason }) => {
                    let _ = sink.send(OutboundFrame::Close { code, reason }).await;
                    let _ = sink.close().await;
                    return;
                }
                None => {
                    let _ = sink.close().await;
                    return;
                }
            },

            _ = next_heartbeat(&mut heartbeat) => {
                if let Err(e) = sink.send(OutboundFrame::Ping).await {
                    tracing::warn!(error = %e, "Heartbeat ping failed");
                    dispatcher.emit_error(&RealtimeError::SendFailed(e.to_string()));
                }
            }
        }
    };

    if let Some(inner) = inner.upgrade() {
        inner.handle_close(generation, code, reason);
    }
}

// =============================================================================
// Public client
// =============================================================================

/// Builder for configuring [`RealtimeClient`].
pub struct RealtimeClientBuilder {
    config: RealtimeConfig,
    token_fetcher: Option<Arc<dyn TokenFetcher>>,
    transport: Option<Arc<dyn TransportFactory>>,
}

impl std::fmt::Debug for RealtimeClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClientBuilder")
            .field("config", &self.config)
            .field("token_fetcher", &self.token_fetcher.is_some())
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

impl Default for RealtimeClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeClientBuilder {
    pub fn new() -> Self {
        Self {
            config: RealtimeConfig::default(),
            token_fetcher: None,
            transport: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: RealtimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval = interval;
        self
    }

    pub fn max_reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.max_reconnect_interval = interval;
        self
    }

    /// 0 means unlimited.
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// `Duration::ZERO` disables the heartbeat.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    pub fn confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.config.confirmation_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn token_fetcher(mut self, fetcher: impl TokenFetcher + 'static) -> Self {
        self.token_fetcher = Some(Arc::new(fetcher));
        self
    }

    pub fn shared_token_fetcher(mut self, fetcher: Arc<dyn TokenFetcher>) -> Self {
        self.token_fetcher = Some(fetcher);
        self
    }

    pub fn transport(mut self, transport: impl TransportFactory + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Build the client. Does not connect.
    pub fn build(self) -> RealtimeResult<RealtimeClient> {
        let token_fetcher = self.token_fetcher.ok_or_else(|| {
            RealtimeError::InvalidArgument("A token fetcher is required".to_string())
        })?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        let dispatcher = Arc::new(EventDispatcher::new());
        let pending = Arc::new(PendingConfirmations::new());
        let handler = MessageHandler::new(Arc::clone(&dispatcher), Arc::clone(&pending));
        let backoff = BackoffPolicy::reconnect(
            self.config.reconnect_interval,
            self.config.max_reconnect_interval,
        );
        let auto_reconnect = self.config.auto_reconnect;

        Ok(RealtimeClient {
            inner: Arc::new(Inner {
                config: self.config,
                backoff,
                token_fetcher,
                transport,
                shared: Mutex::new(Shared {
                    state: ConnectionState::Disconnected,
                    auto_reconnect,
                    reconnect_attempts: 0,
                    generation: 0,
                    cmd_tx: None,
                    connection_task: None,
                    reconnect_timer: None,
                    connect_waiters: Vec::new(),
                }),
                registry: Mutex::new(SubscriptionRegistry::new()),
                pending,
                dispatcher,
                handler,
            }),
        })
    }
}

#[cfg(feature = "tungstenite")]
fn default_transport() -> RealtimeResult<Arc<dyn TransportFactory>> {
    Ok(Arc::new(crate::realtime::transport::TungsteniteTransport::new()))
}

#[cfg(not(feature = "tungstenite"))]
fn default_transport() -> RealtimeResult<Arc<dyn TransportFactory>> {
    Err(RealtimeError::InvalidArgument(
        "No transport configured and the `tungstenite` feature is disabled".to_string(),
    ))
}

/// Realtime subscription client for Switchboard.
///
/// Cheap to clone; clones share one connection. Dropping the last clone
/// aborts the connection task and any pending reconnect.
///
/// # Example
///
/// ```ignore
/// use switchboard::realtime::*;
///
/// let client = RealtimeClient::builder()
///     .token_fetcher(StaticTokenFetcher::new(token))
///     .build()?;
///
/// client.on_event(|event| println!("{} on {}", event.event_type, event.channel_id));
/// client.connect().await?;
/// client.subscribe_channels(vec!["ch_123".to_string()]).await?;
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("url", &self.inner.config.url)
            .field("state", &self.state())
            .finish()
    }
}

impl RealtimeClient {
    pub fn builder() -> RealtimeClientBuilder {
        RealtimeClientBuilder::new()
    }

    /// Connect, authenticate and replay tracked subscriptions.
    ///
    /// Returns immediately if already connected. Callers arriving while an
    /// attempt is in flight share its outcome.
    pub async fn connect(&self) -> RealtimeResult<()> {
        self.inner.connect_inner(ConnectOrigin::Explicit).await
    }

    /// Close the socket and disable auto-reconnect for this client. Idempotent.
    pub async fn disconnect(&self) {
        self.inner.disconnect().await
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.shared.lock().reconnect_attempts
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    /// Snapshot of the desired subscriptions.
    pub fn subscriptions(&self) -> SubscriptionRegistry {
        self.inner.registry.lock().clone()
    }

    /// Number of commands still waiting for a confirmation.
    pub fn pending_confirmations(&self) -> usize {
        self.inner.pending.len()
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    pub async fn subscribe_all(&self) -> RealtimeResult<SubscriptionConfirmation> {
        self.inner.registry.lock().set_all(true);
        self.inner
            .send_command(SubscriptionCommand::all(Action::Subscribe))
            .await
    }

    pub async fn unsubscribe_all(&self) -> RealtimeResult<SubscriptionConfirmation> {
        self.inner.registry.lock().set_all(false);
        self.inner
            .send_command(SubscriptionCommand::all(Action::Unsubscribe))
            .await
    }

    pub async fn subscribe_channels(
        &self,
        channels: Vec<String>,
    ) -> RealtimeResult<SubscriptionConfirmation> {
        self.inner.registry.lock().add_channels(&channels);
        self.inner
            .send_command(SubscriptionCommand::channels(Action::Subscribe, channels))
            .await
    }

    pub async fn unsubscribe_channels(
        &self,
        channels: Vec<String>,
    ) -> RealtimeResult<SubscriptionConfirmation> {
        self.inner.registry.lock().remove_channels(&channels);
        self.inner
            .send_command(SubscriptionCommand::channels(Action::Unsubscribe, channels))
            .await
    }

    pub async fn subscribe_event_types(
        &self,
        event_types: Vec<String>,
    ) -> RealtimeResult<SubscriptionConfirmation> {
        self.inner.registry.lock().add_event_types(&event_types);
        self.inner
            .send_command(SubscriptionCommand::event_types(Action::Subscribe, event_types))
            .await
    }

    pub async fn unsubscribe_event_types(
        &self,
        event_types: Vec<String>,
    ) -> RealtimeResult<SubscriptionConfirmation> {
        self.inner.registry.lock().remove_event_types(&event_types);
        self.inner
            .send_command(SubscriptionCommand::event_types(Action::Unsubscribe, event_types))
            .await
    }

    /// Subscribe to channels and/or event types; both run concurrently.
    pub async fn subscribe(
        &self,
        options: SubscribeOptions,
    ) -> RealtimeResult<Vec<SubscriptionConfirmation>> {
        let channels = options.requested_channels().cloned();
        let event_types = options.requested_event_types().cloned();

        match (channels, event_types) {
            (None, None) => Err(RealtimeError::InvalidArgument(
                "subscribe requires channels or event types".to_string(),
            )),
            (Some(channels), None) => Ok(vec![self.subscribe_channels(channels).await?]),
            (None, Some(event_types)) => Ok(vec![self.subscribe_event_types(event_types).await?]),
            (Some(channels), Some(event_types)) => {
                let (a, b) = try_join(
                    self.subscribe_channels(channels),
                    self.subscribe_event_types(event_types),
                )
                .await?;
                Ok(vec![a, b])
            }
        }
    }

    /// Unsubscribe from channels and/or event types. Empty options are a no-op.
    pub async fn unsubscribe(
        &self,
        options: SubscribeOptions,
    ) -> RealtimeResult<Vec<SubscriptionConfirmation>> {
        let channels = options.requested_channels().cloned();
        let event_types = options.requested_event_types().cloned();

        match (channels, event_types) {
            (None, None) => Ok(Vec::new()),
            (Some(channels), None) => Ok(vec![self.unsubscribe_channels(channels).await?]),
            (None, Some(event_types)) => {
                Ok(vec![self.unsubscribe_event_types(event_types).await?])
            }
            (Some(channels), Some(event_types)) => {
                let (a, b) = try_join(
                    self.unsubscribe_channels(channels),
                    self.unsubscribe_event_types(event_types),
                )
                .await?;
                Ok(vec![a, b])
            }
        }
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    pub fn on_event<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.inner.dispatcher.on_event(listener)
    }

    pub fn on_state_change<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.inner.dispatcher.on_state_change(listener)
    }

    pub fn on_error<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&RealtimeError) + Send + Sync + 'static,
    {
        self.inner.dispatcher.on_error(listener)
    }

    pub fn remove_all_handlers(&self) {
        self.inner.dispatcher.remove_all();
    }
}
