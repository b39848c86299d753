//! # Switchboard Rust SDK
//!
//! A Rust SDK for the Switchboard communications platform.
//!
//! ## Modules
//!
//! - [`api`]: REST request engine with retries and typed errors
//! - [`realtime`]: persistent WebSocket subscription client
//! - [`auth`]: realtime access token fetchers
//!
//! Plus shared modules:
//! - [`shared`]: backoff policy used by both layers
//! - [`network`]: default endpoints
//!
//! ## Quick Start - REST API
//!
//! ```rust,ignore
//! use switchboard::SwitchboardClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SwitchboardClient::new("sk_live_...")?;
//!
//!     let channels: serde_json::Value = client.api().get("/v1/channels").await?;
//!     println!("{channels}");
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Quick Start - Realtime
//!
//! ```rust,ignore
//! use switchboard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SwitchboardClient::new("sk_live_...")?;
//!     let realtime = client.realtime()?;
//!
//!     realtime.on_event(|event| {
//!         println!("[{}] {} {}", event.channel_id, event.canonical_type, event.payload);
//!     });
//!     realtime.on_error(|error| eprintln!("realtime error: {error}"));
//!
//!     realtime.connect().await?;
//!     realtime.subscribe_channels(vec!["ch_123".to_string()]).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     realtime.disconnect().await;
//!     Ok(())
//! }
//! ```

// ============================================================================
// MODULES
// ============================================================================

/// Shared utilities used across all SDK modules.
pub mod shared;

/// Network URL constants (API and realtime endpoints).
pub mod network;

/// REST request engine.
pub mod api;

/// Realtime access token fetchers.
pub mod auth;

/// Realtime subscription client.
pub mod realtime;

/// Top-level client bundling the REST engine and realtime factory.
pub mod client;

pub use client::{SwitchboardClient, SwitchboardClientBuilder};

// ============================================================================
// PRELUDE
// ============================================================================

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use switchboard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::{SwitchboardClient, SwitchboardClientBuilder};

    // API module exports
    pub use crate::api::{ApiClient, ApiClientBuilder, ApiError, ApiResult, ErrorBody, RequestOptions};

    // Auth
    pub use crate::auth::{ApiTokenFetcher, StaticTokenFetcher, TokenFetcher};

    // Network constants
    pub use crate::network::{DEFAULT_API_URL, DEFAULT_REALTIME_URL};

    // Shared
    pub use crate::shared::BackoffPolicy;

    // Realtime module exports
    pub use crate::realtime::{
        ConnectionState, EventDirection, Enrichment, ListenerHandle, RealtimeClient,
        RealtimeClientBuilder, RealtimeConfig, RealtimeError, RealtimeEvent, RealtimeResult,
        SubscribeOptions, SubscriptionConfirmation, SubscriptionRegistry, TransportFactory,
    };
    #[cfg(feature = "tungstenite")]
    pub use crate::realtime::TungsteniteTransport;
}
