//! Message types for the Switchboard realtime protocol.
//!
//! This module contains the outbound subscription commands, the inbound
//! frames, the normalized [`RealtimeEvent`] and the client configuration.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::network::DEFAULT_REALTIME_URL;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Realtime client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// WebSocket endpoint; the access token is appended as `token=`
    pub url: String,
    /// Whether to reconnect after an unexpected close
    pub auto_reconnect: bool,
    /// Base delay for reconnect backoff
    pub reconnect_interval: Duration,
    /// Ceiling for reconnect backoff
    pub max_reconnect_interval: Duration,
    /// Reconnect attempts before giving up. 0 means unlimited
    pub max_reconnect_attempts: u32,
    /// Interval between WebSocket pings while connected
    pub heartbeat_interval: Duration,
    /// How long a subscription command waits for its confirmation
    pub confirmation_timeout: Duration,
    /// Upper bound for opening the socket
    pub connect_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REALTIME_URL.to_string(),
            auto_reconnect: true,
            reconnect_interval: Duration::from_millis(1000),
            max_reconnect_interval: Duration::from_millis(30_000),
            max_reconnect_attempts: 10,
            heartbeat_interval: Duration::from_secs(30),
            confirmation_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// CONNECTION STATE
// ============================================================================

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// REQUEST TYPES (Client → Server)
// ============================================================================

/// Subscription command action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Subscribe,
    Unsubscribe,
}

/// What a subscription command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    All,
    Channel,
    EventType,
}

/// Outbound subscribe/unsubscribe command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCommand {
    #[serde(rename = "type")]
    pub action: Action,
    pub subscription_type: SubscriptionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_types: Option<Vec<String>>,
}

impl SubscriptionCommand {
    /// Command targeting every event for the tenant
    pub fn all(action: Action) -> Self {
        Self {
            action,
            subscription_type: SubscriptionType::All,
            channels: None,
            event_types: None,
        }
    }

    /// Command targeting a batch of channel IDs
    pub fn channels(action: Action, channels: Vec<String>) -> Self {
        Self {
            action,
            subscription_type: SubscriptionType::Channel,
            channels: Some(channels),
            event_types: None,
        }
    }

    /// Command targeting a batch of event types
    pub fn event_types(action: Action, event_types: Vec<String>) -> Self {
        Self {
            action,
            subscription_type: SubscriptionType::EventType,
            channels: None,
            event_types: Some(event_types),
        }
    }

    /// Key used to match this command with its confirmation
    pub fn key(&self) -> (Action, SubscriptionType) {
        (self.action, self.subscription_type)
    }

    /// Items carried by the command, whichever list is populated
    pub fn items(&self) -> &[String] {
        self.channels
            .as_deref()
            .or(self.event_types.as_deref())
            .unwrap_or(&[])
    }
}

/// Options for the combined `subscribe` / `unsubscribe` calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub channels: Option<Vec<String>>,
    pub event_types: Option<Vec<String>>,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = Some(channels.into_iter().map(Into::into).collect());
        self
    }

    pub fn event_types<I, S>(mut self, event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_types = Some(event_types.into_iter().map(Into::into).collect());
        self
    }

    /// Channel list, if present and non-empty
    pub(crate) fn requested_channels(&self) -> Option<&Vec<String>> {
        self.channels.as_ref().filter(|c| !c.is_empty())
    }

    /// Event-type list, if present and non-empty
    pub(crate) fn requested_event_types(&self) -> Option<&Vec<String>> {
        self.event_types.as_ref().filter(|t| !t.is_empty())
    }
}

// ============================================================================
// RESPONSE TYPES (Server → Client)
// ============================================================================

/// Raw inbound frame, before routing by `type`
#[derive(Debug, Clone, Deserialize)]
pub struct RawFrame {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Frame types understood by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Connected,
    SubscriptionConfirmed,
    SubscriptionError,
    Event,
    Unknown,
}

impl From<&str> for FrameType {
    fn from(s: &str) -> Self {
        match s {
            "connected" => Self::Connected,
            "subscription_confirmed" => Self::SubscriptionConfirmed,
            "subscription_error" => Self::SubscriptionError,
            "event" => Self::Event,
            _ => Self::Unknown,
        }
    }
}

/// Handshake frame sent by the server after the socket opens
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedFrame {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Server acknowledgment (or rejection) of a subscription command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionConfirmation {
    pub action: Action,
    pub subscription_type: SubscriptionType,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubscriptionConfirmation {
    pub fn key(&self) -> (Action, SubscriptionType) {
        (self.action, self.subscription_type)
    }
}

/// Direction of an event relative to the tenant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventDirection {
    Inbound,
    Outbound,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Derived annotations attached by upstream processing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub entities: Vec<serde_json::Value>,
}

/// `data` of an `event` frame as it appears on the wire.
///
/// The server has shipped both casings; camelCase wins when both are present.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEventData {
    pub id: String,
    #[serde(default, rename = "tenantId")]
    pub tenant_id_camel: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default, rename = "channelId")]
    pub channel_id_camel: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default, rename = "canonicalType")]
    pub canonical_type_camel: Option<String>,
    #[serde(default)]
    pub canonical_type: Option<String>,
    #[serde(default, rename = "eventType")]
    pub event_type_camel: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_direction")]
    pub direction: EventDirection,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub enrichment: Option<Enrichment>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, rename = "processedAt", deserialize_with = "lenient_timestamp")]
    pub processed_at_camel: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub processed_at: Option<DateTime<Utc>>,
}

/// RFC 3339 strings or epoch milliseconds. Anything else counts as absent.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => DateTime::parse_from_rfc3339(&text)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Some(serde_json::Value::Number(n)) => {
            n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis)
        }
        _ => None,
    })
}

fn lenient_direction<'de, D>(deserializer: D) -> Result<EventDirection, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| EventDirection::deserialize(v).ok())
        .unwrap_or_default())
}

/// Normalized domain event delivered to event listeners
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeEvent {
    pub id: String,
    pub tenant_id: String,
    pub channel_id: String,
    /// Platform-normalized category (e.g. `message`, `call`)
    pub canonical_type: String,
    /// Event name as emitted by the originating channel
    pub event_type: String,
    pub direction: EventDirection,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,
    pub timestamp: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl RealtimeEvent {
    /// Normalize a wire event. Missing timestamps default to now.
    pub fn from_raw(raw: RawEventData, metadata: Option<serde_json::Value>) -> Self {
        let now = Utc::now();
        let timestamp = raw.timestamp.unwrap_or(now);
        Self {
            id: raw.id,
            tenant_id: raw.tenant_id_camel.or(raw.tenant_id).unwrap_or_default(),
            channel_id: raw.channel_id_camel.or(raw.channel_id).unwrap_or_default(),
            canonical_type: raw
                .canonical_type_camel
                .or(raw.canonical_type)
                .unwrap_or_default(),
            event_type: raw.event_type_camel.or(raw.event_type).unwrap_or_default(),
            direction: raw.direction,
            payload: raw.payload,
            enrichment: raw.enrichment,
            timestamp,
            processed_at: raw.processed_at_camel.or(raw.processed_at).unwrap_or(now),
            metadata,
        }
    }
}
