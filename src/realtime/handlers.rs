//! Inbound frame routing.
//!
//! Parses raw text frames, resolves subscription confirmations and forwards
//! normalized events to the dispatcher.

use std::sync::Arc;

use serde::Deserialize;

use crate::realtime::dispatcher::EventDispatcher;
use crate::realtime::error::RealtimeError;
use crate::realtime::subscriptions::PendingConfirmations;
use crate::realtime::types::{
    ConnectedFrame, FrameType, RawEventData, RawFrame, RealtimeEvent, SubscriptionConfirmation,
};

const FALLBACK_SUBSCRIPTION_ERROR: &str = "Subscription failed";

/// Handles incoming realtime frames
#[derive(Debug, Clone)]
pub struct MessageHandler {
    dispatcher: Arc<EventDispatcher>,
    pending: Arc<PendingConfirmations>,
}

impl MessageHandler {
    pub fn new(dispatcher: Arc<EventDispatcher>, pending: Arc<PendingConfirmations>) -> Self {
        Self { dispatcher, pending }
    }

    /// Handle one text frame. Never fails; problems surface as error notifications.
    pub fn handle_message(&self, text: &str) {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return self.malformed("frame", e),
        };
        let raw = match RawFrame::deserialize(&value) {
            Ok(raw) => raw,
            Err(e) => return self.malformed("frame", e),
        };

        match FrameType::from(raw.type_.as_str()) {
            FrameType::Connected => {
                let frame = ConnectedFrame::deserialize(&value).unwrap_or_default();
                tracing::debug!(
                    client_id = frame.client_id.as_deref().unwrap_or(""),
                    tenant_id = frame.tenant_id.as_deref().unwrap_or(""),
                    "Realtime handshake received"
                );
            }
            FrameType::SubscriptionConfirmed => match SubscriptionConfirmation::deserialize(&value) {
                Ok(confirmation) => self.handle_confirmed(confirmation),
                Err(e) => self.malformed("subscription confirmation", e),
            },
            FrameType::SubscriptionError => match SubscriptionConfirmation::deserialize(&value) {
                Ok(confirmation) => self.handle_rejected(confirmation),
                Err(e) => self.malformed("subscription error", e),
            },
            FrameType::Event => match RawEventData::deserialize(&raw.data) {
                Ok(data) => {
                    let event = RealtimeEvent::from_raw(data, raw.metadata);
                    self.dispatcher.emit_event(&event);
                }
                Err(e) => self.malformed("event", e),
            },
            FrameType::Unknown => {
                tracing::debug!(frame_type = %raw.type_, "Ignoring unknown frame type");
            }
        }
    }

    fn handle_confirmed(&self, confirmation: SubscriptionConfirmation) {
        let key = confirmation.key();
        if !self.pending.confirm(confirmation) {
            tracing::debug!(
                action = ?key.0,
                subscription_type = ?key.1,
                "Dropping unmatched subscription confirmation"
            );
        }
    }

    fn handle_rejected(&self, confirmation: SubscriptionConfirmation) {
        let key = confirmation.key();
        let message = confirmation
            .error
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| FALLBACK_SUBSCRIPTION_ERROR.to_string());
        if !self
            .pending
            .reject(key, RealtimeError::SubscriptionRejected(message))
        {
            tracing::debug!(
                action = ?key.0,
                subscription_type = ?key.1,
                "Dropping unmatched subscription error"
            );
        }
    }

    fn malformed(&self, what: &str, err: serde_json::Error) {
        tracing::warn!("Failed to parse {}: {}", what, err);
        self.dispatcher
            .emit_error(&RealtimeError::MalformedFrame(format!("{}: {}", what, err)));
    }
}
