//! Integration tests for the realtime subscription client.
//!
//! An in-memory transport plays the server: every socket the client opens
//! is handed to the test as a [`MockSocket`]. Timer-driven behavior runs on
//! tokio's paused clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{sink, stream, FutureExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use switchboard::realtime::*;
use tokio::sync::mpsc;
use tokio::time::Instant;

// =============================================================================
// In-memory transport
// =============================================================================

struct MockSocket {
    url: String,
    outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    inbound: mpsc::UnboundedSender<RealtimeResult<InboundFrame>>,
}

impl MockSocket {
    /// Next subscription command written by the client, skipping pings.
    async fn next_command(&mut self) -> Value {
        loop {
            match self.outbound.recv().await {
                Some(OutboundFrame::Text(text)) => return serde_json::from_str(&text).unwrap(),
                Some(OutboundFrame::Ping) => continue,
                Some(other) => panic!("unexpected frame: {other:?}"),
                None => panic!("client closed the socket"),
            }
        }
    }

    /// Drain frames already written, ignoring pings.
    fn drain_commands(&mut self) -> Vec<Value> {
        let mut commands = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            if let OutboundFrame::Text(text) = frame {
                commands.push(serde_json::from_str(&text).unwrap());
            }
        }
        commands
    }

    fn send(&self, frame: Value) {
        self.send_raw(&frame.to_string());
    }

    fn send_raw(&self, text: &str) {
        let _ = self.inbound.send(Ok(InboundFrame::Text(text.to_string())));
    }

    fn reply(&self, command: &Value, frame_type: &str, error: Option<&str>) {
        let items = command
            .get("channels")
            .or_else(|| command.get("eventTypes"))
            .cloned()
            .unwrap_or_else(|| json!([]));
        let mut frame = json!({
            "type": frame_type,
            "action": command["type"],
            "subscriptionType": command["subscriptionType"],
            "items": items,
        });
        if let Some(error) = error {
            frame["error"] = json!(error);
        }
        self.send(frame);
    }

    fn confirm(&self, command: &Value) {
        self.reply(command, "subscription_confirmed", None);
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.inbound.send(Ok(InboundFrame::Close {
            code,
            reason: reason.to_string(),
        }));
    }
}

struct MockState {
    sockets: mpsc::UnboundedSender<MockSocket>,
    attempts: Mutex<Vec<(Instant, String)>>,
    fail: AtomicBool,
    connect_delay: Mutex<Duration>,
}

#[derive(Clone)]
struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    fn new() -> (Self, mpsc::UnboundedReceiver<MockSocket>) {
        let (sockets, rx) = mpsc::unbounded_channel();
        let transport = Self {
            state: Arc::new(MockState {
                sockets,
                attempts: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
                connect_delay: Mutex::new(Duration::ZERO),
            }),
        };
        (transport, rx)
    }

    fn attempts(&self) -> Vec<Instant> {
        self.state.attempts.lock().iter().map(|(at, _)| *at).collect()
    }

    fn set_failing(&self, fail: bool) {
        self.state.fail.store(fail, Ordering::SeqCst);
    }

    fn set_connect_delay(&self, delay: Duration) {
        *self.state.connect_delay.lock() = delay;
    }
}

impl TransportFactory for MockTransport {
    fn connect(&self, url: &str) -> BoxFuture<'static, RealtimeResult<Transport>> {
        let state = self.state.clone();
        let url = url.to_string();
        state.attempts.lock().push((Instant::now(), url.clone()));
        let fail = state.fail.load(Ordering::SeqCst);
        let delay = *state.connect_delay.lock();

        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if fail {
                return Err(RealtimeError::ConnectionFailed("connection refused".to_string()));
            }

            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            let _ = state.sockets.send(MockSocket {
                url,
                outbound: out_rx,
                inbound: in_tx,
            });

            let sink = sink::unfold(
                out_tx,
                |tx: mpsc::UnboundedSender<OutboundFrame>, frame: OutboundFrame| async move {
                    tx.send(frame)
                        .map_err(|_| RealtimeError::SendFailed("peer gone".to_string()))?;
                    Ok::<_, RealtimeError>(tx)
                },
            );
            let stream = stream::unfold(in_rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            Ok(Transport::new(sink, stream))
        }
        .boxed()
    }
}

struct FailingFetcher;

impl TokenFetcher for FailingFetcher {
    fn fetch_token(&self) -> BoxFuture<'_, RealtimeResult<String>> {
        futures_util::future::ready(Err(RealtimeError::AuthenticationFailed(
            "API key revoked".to_string(),
        )))
        .boxed()
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    client: RealtimeClient,
    transport: MockTransport,
    sockets: mpsc::UnboundedReceiver<MockSocket>,
    states: Arc<Mutex<Vec<ConnectionState>>>,
    errors: Arc<Mutex<Vec<RealtimeError>>>,
}

impl Harness {
    fn new() -> Self {
        Self::with(|builder| builder)
    }

    fn with(configure: impl FnOnce(RealtimeClientBuilder) -> RealtimeClientBuilder) -> Self {
        let (transport, sockets) = MockTransport::new();
        let builder = RealtimeClient::builder()
            .url("wss://rt.test/v1/realtime")
            .token_fetcher(StaticTokenFetcher::new("rt_token"))
            .transport(transport.clone());
        let client = configure(builder).build().unwrap();

        let states = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = states.clone();
        client.on_state_change(move |s| sink.lock().push(s));
        let sink = errors.clone();
        client.on_error(move |e| sink.lock().push(e.clone()));

        Self {
            client,
            transport,
            sockets,
            states,
            errors,
        }
    }

    async fn connect(&mut self) -> MockSocket {
        self.client.connect().await.unwrap();
        self.sockets.recv().await.unwrap()
    }

    async fn wait_for(&self, state: ConnectionState) {
        for _ in 0..200 {
            if self.client.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("client never reached {state}, stuck in {}", self.client.state());
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Connection lifecycle
// =============================================================================

mod connection {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_connect_attaches_token_and_reports_states() {
        let mut h = Harness::new();
        let socket = h.connect().await;

        assert_eq!(socket.url, "wss://rt.test/v1/realtime?token=rt_token");
        assert!(h.client.is_connected());
        assert_eq!(
            *h.states.lock(),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_connect_opens_one_socket() {
        let mut h = Harness::new();
        h.transport.set_connect_delay(Duration::from_millis(100));

        let (a, b) = tokio::join!(h.client.connect(), h.client.connect());
        a.unwrap();
        b.unwrap();

        assert_eq!(h.transport.attempts().len(), 1);
        assert!(h.sockets.try_recv().is_ok());
        assert!(h.sockets.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_connect_still_completes() {
        let mut h = Harness::new();
        h.transport.set_connect_delay(Duration::from_secs(5));

        let abandoned = tokio::time::timeout(Duration::from_secs(1), h.client.connect()).await;
        assert!(abandoned.is_err());
        assert_eq!(h.client.state(), ConnectionState::Connecting);

        h.client.connect().await.unwrap();
        assert!(h.client.is_connected());
        assert_eq!(h.transport.attempts().len(), 1);
        assert!(h.sockets.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_failing_connect_returns_to_disconnected() {
        let mut h = Harness::new();
        h.transport.set_failing(true);
        h.transport.set_connect_delay(Duration::from_secs(5));

        let abandoned = tokio::time::timeout(Duration::from_secs(1), h.client.connect()).await;
        assert!(abandoned.is_err());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
        assert_eq!(h.errors.lock().len(), 1);

        h.transport.set_failing(false);
        h.transport.set_connect_delay(Duration::ZERO);
        let _socket = h.connect().await;
        assert!(h.client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_when_connected_is_noop() {
        let mut h = Harness::new();
        let _socket = h.connect().await;
        h.client.connect().await.unwrap();
        assert_eq!(h.transport.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_failure_rejects_connect() {
        let (transport, _sockets) = MockTransport::new();
        let client = RealtimeClient::builder()
            .token_fetcher(FailingFetcher)
            .transport(transport.clone())
            .build()
            .unwrap();

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, RealtimeError::AuthenticationFailed(_)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_initial_connect_does_not_reconnect() {
        let h = Harness::new();
        h.transport.set_failing(true);

        assert!(h.client.connect().await.is_err());
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(h.transport.attempts().len(), 1);
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
        assert_eq!(h.errors.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_sends_ping() {
        let mut h = Harness::new();
        let mut socket = h.connect().await;

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(socket.outbound.try_recv().unwrap(), OutboundFrame::Ping);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close_code_is_reported() {
        let mut h = Harness::with(|b| b.auto_reconnect(false));
        let socket = h.connect().await;

        socket.close(4001, "kicked");
        h.wait_for(ConnectionState::Disconnected).await;

        assert_eq!(
            *h.errors.lock(),
            vec![RealtimeError::ConnectionClosed {
                code: 4001,
                reason: "kicked".to_string()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_is_reported_and_connection_survives() {
        let mut h = Harness::new();
        let socket = h.connect().await;

        socket.send_raw("{definitely not json");
        socket.send(json!({"type": "connected", "clientId": "c_1", "tenantId": "t_1"}));
        socket.send(json!({"type": "typing_indicator", "data": {}}));
        tokio::time::sleep(Duration::from_millis(5)).await;

        let errors = h.errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], RealtimeError::MalformedFrame(_)));
        assert!(h.client.is_connected());
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

mod subscriptions {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_channels_resolves_on_confirmation() {
        let mut h = Harness::new();
        let mut socket = h.connect().await;

        let client = h.client.clone();
        let call = tokio::spawn(async move { client.subscribe_channels(strings(&["ch_1", "ch_2"])).await });

        let command = socket.next_command().await;
        assert_eq!(
            command,
            json!({"type": "subscribe", "subscriptionType": "channel", "channels": ["ch_1", "ch_2"]})
        );
        assert_eq!(h.client.pending_confirmations(), 1);
        socket.confirm(&command);

        let confirmation = call.await.unwrap().unwrap();
        assert_eq!(confirmation.action, Action::Subscribe);
        assert_eq!(confirmation.subscription_type, SubscriptionType::Channel);
        assert_eq!(confirmation.items, strings(&["ch_1", "ch_2"]));
        assert_eq!(h.client.pending_confirmations(), 0);
        assert_eq!(h.client.subscriptions().channels(), strings(&["ch_1", "ch_2"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_timeout_and_late_frame() {
        let mut h = Harness::new();
        let mut socket = h.connect().await;

        let started = Instant::now();
        let client = h.client.clone();
        let call = tokio::spawn(async move { client.subscribe_event_types(strings(&["call.ended"])).await });
        let command = socket.next_command().await;

        let err = call.await.unwrap().unwrap_err();
        assert_eq!(err, RealtimeError::SubscriptionTimeout);
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(h.client.pending_confirmations(), 0);

        socket.confirm(&command);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(h.errors.lock().is_empty());
        assert!(h.client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscription_error_rejects_with_server_message() {
        let mut h = Harness::new();
        let mut socket = h.connect().await;

        let client = h.client.clone();
        let call = tokio::spawn(async move { client.subscribe_all().await });
        let command = socket.next_command().await;
        assert_eq!(command, json!({"type": "subscribe", "subscriptionType": "all"}));
        socket.reply(&command, "subscription_error", Some("Plan does not allow firehose"));

        let err = call.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            RealtimeError::SubscriptionRejected("Plan does not allow firehose".to_string())
        );
        // Desired state is kept even though the server refused it.
        assert!(h.client.subscriptions().is_subscribed_to_all());
    }

    #[tokio::test(start_paused = true)]
    async fn test_combined_subscribe_sends_both_commands() {
        let mut h = Harness::new();
        let mut socket = h.connect().await;

        let client = h.client.clone();
        let call = tokio::spawn(async move {
            client
                .subscribe(SubscribeOptions::new().channels(["a"]).event_types(["x", "y"]))
                .await
        });

        let first = socket.next_command().await;
        let second = socket.next_command().await;
        socket.confirm(&second);
        socket.confirm(&first);

        let confirmations = call.await.unwrap().unwrap();
        assert_eq!(confirmations.len(), 2);
        assert_eq!(confirmations[0].subscription_type, SubscriptionType::Channel);
        assert_eq!(confirmations[1].subscription_type, SubscriptionType::EventType);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_without_targets_is_invalid() {
        let mut h = Harness::new();
        let mut socket = h.connect().await;

        let err = h
            .client
            .subscribe(SubscribeOptions::new().channels(Vec::<String>::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, RealtimeError::InvalidArgument(_)));

        let result = h.client.unsubscribe(SubscribeOptions::new()).await.unwrap();
        assert!(result.is_empty());
        assert!(socket.drain_commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_updates_registry() {
        let mut h = Harness::new();
        let mut socket = h.connect().await;

        let client = h.client.clone();
        let call = tokio::spawn(async move { client.subscribe_channels(strings(&["a", "b"])).await });
        let command = socket.next_command().await;
        socket.confirm(&command);
        call.await.unwrap().unwrap();

        let client = h.client.clone();
        let call = tokio::spawn(async move { client.unsubscribe_channels(strings(&["a"])).await });
        let command = socket.next_command().await;
        assert_eq!(
            command,
            json!({"type": "unsubscribe", "subscriptionType": "channel", "channels": ["a"]})
        );
        socket.confirm(&command);
        call.await.unwrap().unwrap();

        assert_eq!(h.client.subscriptions().channels(), strings(&["b"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_require_connection() {
        let h = Harness::new();
        let err = h.client.subscribe_channels(strings(&["a"])).await.unwrap_err();
        assert_eq!(err, RealtimeError::NotConnected);
        assert_eq!(h.client.pending_confirmations(), 0);
    }
}

// =============================================================================
// Event dispatch
// =============================================================================

mod events {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_panicking_listener_does_not_starve_others() {
        let mut h = Harness::new();
        let socket = h.connect().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        h.client.on_event(|_| panic!("listener bug"));
        h.client.on_event(move |event| {
            let _ = tx.send(event.clone());
        });

        for i in 0..3 {
            socket.send(json!({
                "type": "event",
                "data": {
                    "id": format!("evt_{i}"),
                    "tenant_id": "t_1",
                    "channelId": "ch_1",
                    "canonicalType": "message",
                    "event_type": "sms.received",
                    "direction": "inbound",
                    "payload": {"body": "hello"},
                    "timestamp": "2024-05-01T12:00:00Z",
                    "processedAt": "2024-05-01T12:00:02Z"
                }
            }));
        }

        for i in 0..3 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.id, format!("evt_{i}"));
            assert_eq!(event.tenant_id, "t_1");
            assert_eq!(event.channel_id, "ch_1");
            assert_eq!(event.direction, EventDirection::Inbound);
        }
        assert!(h.client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_epoch_millis_timestamps_are_delivered() {
        let mut h = Harness::new();
        let socket = h.connect().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        h.client.on_event(move |event| {
            let _ = tx.send(event.clone());
        });

        socket.send(json!({
            "type": "event",
            "data": {
                "id": "evt_ms",
                "channelId": "ch_1",
                "direction": null,
                "timestamp": 1714564800000i64,
                "processedAt": 1714564802000i64
            }
        }));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.id, "evt_ms");
        assert_eq!(event.direction, EventDirection::Unknown);
        assert_eq!(event.timestamp.timestamp_millis(), 1714564800000);
        assert_eq!(event.processed_at.timestamp_millis(), 1714564802000);
        assert!(h.errors.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_listener_stops_receiving() {
        let mut h = Harness::new();
        let socket = h.connect().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = h.client.on_event(move |event| {
            let _ = tx.send(event.id.clone());
        });

        socket.send(json!({"type": "event", "data": {"id": "evt_1"}}));
        assert_eq!(rx.recv().await.unwrap(), "evt_1");

        assert!(handle.remove());
        socket.send(json!({"type": "event", "data": {"id": "evt_2"}}));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_all_handlers() {
        let mut h = Harness::new();
        let socket = h.connect().await;
        h.client.remove_all_handlers();

        socket.close(1011, "server restart");
        h.wait_for(ConnectionState::Reconnecting).await;
        assert_eq!(h.states.lock().len(), 2);
        assert!(h.errors.lock().is_empty());
    }
}

// =============================================================================
// Reconnection
// =============================================================================

mod reconnection {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_replays_registry_after_reconnect() {
        let mut h = Harness::new();
        let mut socket = h.connect().await;

        let client = h.client.clone();
        let call = tokio::spawn(async move {
            client
                .subscribe(SubscribeOptions::new().channels(["a", "b"]).event_types(["x"]))
                .await
        });
        for _ in 0..2 {
            let command = socket.next_command().await;
            socket.confirm(&command);
        }
        call.await.unwrap().unwrap();

        drop(socket);
        let mut socket = h.sockets.recv().await.unwrap();
        assert!(h.client.is_connected());

        let first = socket.next_command().await;
        let second = socket.next_command().await;
        assert_eq!(
            first,
            json!({"type": "subscribe", "subscriptionType": "channel", "channels": ["a", "b"]})
        );
        assert_eq!(
            second,
            json!({"type": "subscribe", "subscriptionType": "event_type", "eventTypes": ["x"]})
        );
        socket.confirm(&first);
        socket.confirm(&second);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(socket.drain_commands().is_empty());
        assert_eq!(h.client.pending_confirmations(), 0);
        assert_eq!(h.client.reconnect_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_resubscribe_is_reported_and_others_complete() {
        let mut h = Harness::new();
        let mut socket = h.connect().await;

        let client = h.client.clone();
        let call = tokio::spawn(async move {
            client
                .subscribe(SubscribeOptions::new().channels(["a"]).event_types(["x"]))
                .await
        });
        for _ in 0..2 {
            let command = socket.next_command().await;
            socket.confirm(&command);
        }
        call.await.unwrap().unwrap();

        drop(socket);
        let mut socket = h.sockets.recv().await.unwrap();
        let channel = socket.next_command().await;
        let event_type = socket.next_command().await;
        socket.reply(&channel, "subscription_error", Some("Channel archived"));
        socket.confirm(&event_type);
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(h
            .errors
            .lock()
            .contains(&RealtimeError::SubscriptionRejected("Channel archived".to_string())));
        assert!(h.client.is_connected());
        assert_eq!(h.client.pending_confirmations(), 0);
        assert_eq!(h.client.subscriptions().channels(), strings(&["a"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_and_budget_is_enforced() {
        let mut h = Harness::with(|b| b.max_reconnect_attempts(3));
        let socket = h.connect().await;

        h.transport.set_failing(true);
        let closed_at = Instant::now();
        drop(socket);
        tokio::time::sleep(Duration::from_secs(120)).await;

        let attempts = h.transport.attempts();
        assert_eq!(attempts.len(), 4);
        assert_eq!(attempts[1] - closed_at, Duration::from_secs(1));
        assert_eq!(attempts[2] - attempts[1], Duration::from_secs(2));
        assert_eq!(attempts[3] - attempts[2], Duration::from_secs(4));

        assert_eq!(h.client.state(), ConnectionState::Disconnected);
        assert_eq!(h.client.reconnect_attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_reconnect_resets_counter() {
        let mut h = Harness::new();
        let socket = h.connect().await;

        h.transport.set_failing(true);
        drop(socket);
        // Attempts at 1s and 3s fail; the third is armed for 7s.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(h.client.reconnect_attempts(), 3);
        assert_eq!(h.client.state(), ConnectionState::Reconnecting);

        h.transport.set_failing(false);
        let _socket = h.sockets.recv().await.unwrap();
        h.wait_for(ConnectionState::Connected).await;
        assert_eq!(h.client.reconnect_attempts(), 0);
        assert_eq!(h.transport.attempts().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_connect_cancels_pending_timer() {
        let mut h = Harness::new();
        let socket = h.connect().await;

        socket.close(1001, "going away");
        h.wait_for(ConnectionState::Reconnecting).await;

        h.client.connect().await.unwrap();
        let _socket = h.sockets.recv().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.transport.attempts().len(), 2);
        assert!(h.client.is_connected());
    }
}

// =============================================================================
// Disconnect
// =============================================================================

mod disconnect {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_sends_normal_close() {
        let mut h = Harness::new();
        let mut socket = h.connect().await;

        h.client.disconnect().await;
        assert_eq!(
            socket.outbound.recv().await,
            Some(OutboundFrame::Close {
                code: 1000,
                reason: "Client disconnect".to_string()
            })
        );
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reconnect_after_disconnect_even_with_stale_close() {
        let mut h = Harness::new();
        let socket = h.connect().await;

        h.client.disconnect().await;
        socket.close(1006, "late close");
        drop(socket);
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(h.transport.attempts().len(), 1);
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_while_reconnecting_cancels_timer() {
        let mut h = Harness::new();
        let socket = h.connect().await;

        drop(socket);
        h.wait_for(ConnectionState::Reconnecting).await;
        h.client.disconnect().await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(h.transport.attempts().len(), 1);
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_stays_disabled_after_disconnect() {
        let mut h = Harness::new();
        let _first = h.connect().await;
        h.client.disconnect().await;

        let second = h.connect().await;
        drop(second);
        h.wait_for(ConnectionState::Disconnected).await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(h.transport.attempts().len(), 2);
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_is_idempotent() {
        let h = Harness::new();
        h.client.disconnect().await;
        h.client.disconnect().await;
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
        assert!(h.states.lock().is_empty());
    }
}
