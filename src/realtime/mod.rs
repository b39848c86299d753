//! Realtime subscription client for Switchboard.
//!
//! A persistent WebSocket connection that authenticates with a short-lived
//! token, multiplexes subscribe/unsubscribe commands with per-command
//! confirmations, reconnects with bounded exponential backoff and restores
//! subscriptions after every reconnect.
//!
//! # Example
//!
//! ```rust,ignore
//! use switchboard::realtime::*;
//!
//! let client = RealtimeClient::builder()
//!     .token_fetcher(StaticTokenFetcher::new(token))
//!     .max_reconnect_attempts(0)
//!     .build()?;
//!
//! client.on_state_change(|state| println!("state: {state}"));
//! client.on_event(|event| println!("{}: {}", event.canonical_type, event.payload));
//!
//! client.connect().await?;
//! client
//!     .subscribe(SubscribeOptions::new().channels(["ch_1"]).event_types(["message.created"]))
//!     .await?;
//! ```

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod subscriptions;
pub mod transport;
pub mod types;

pub use client::{RealtimeClient, RealtimeClientBuilder};
pub use dispatcher::{ErrorListener, EventDispatcher, EventListener, ListenerHandle, StateListener};
pub use error::{RealtimeError, RealtimeResult};
pub use handlers::MessageHandler;
pub use subscriptions::{PendingConfirmation, PendingConfirmations, SubscriptionRegistry};
#[cfg(feature = "tungstenite")]
pub use transport::TungsteniteTransport;
pub use transport::{FrameSink, FrameStream, InboundFrame, OutboundFrame, Transport, TransportFactory};
pub use types::*;

pub use crate::auth::{ApiTokenFetcher, StaticTokenFetcher, TokenFetcher};
