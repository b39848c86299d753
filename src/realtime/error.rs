//! Realtime-specific error types for the Switchboard SDK.

use thiserror::Error;

use crate::api::ApiError;

/// Realtime-specific errors.
///
/// `Clone` so a single failure can be handed to every waiting `connect()`
/// caller and to every error listener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    /// No open socket, or state is not `Connected`
    #[error("Not connected to realtime server")]
    NotConnected,

    /// Connect attempt failed before the socket opened
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Socket closed by the peer or the network
    #[error("Connection closed: code {code}, reason: {reason}")]
    ConnectionClosed { code: u16, reason: String },

    /// Realtime token could not be obtained
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No confirmation arrived for a subscription command in time
    #[error("Subscription confirmation timed out")]
    SubscriptionTimeout,

    /// Server answered a subscription command with `subscription_error`
    #[error("Subscription rejected: {0}")]
    SubscriptionRejected(String),

    /// Inbound frame could not be parsed
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Caller passed arguments that cannot form a command
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Writing to the socket failed
    #[error("Failed to send message: {0}")]
    SendFailed(String),

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// WebSocket protocol error
    #[error("WebSocket protocol error: {0}")]
    Protocol(String),
}

/// Result type alias for realtime operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;

impl From<ApiError> for RealtimeError {
    fn from(err: ApiError) -> Self {
        RealtimeError::AuthenticationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        RealtimeError::MalformedFrame(err.to_string())
    }
}

#[cfg(feature = "tungstenite")]
impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::ConnectionClosed | Error::AlreadyClosed => RealtimeError::NotConnected,
            Error::Io(e) => RealtimeError::ConnectionFailed(e.to_string()),
            Error::Protocol(e) => RealtimeError::Protocol(e.to_string()),
            Error::Url(e) => RealtimeError::ConnectionFailed(format!("Invalid URL: {}", e)),
            Error::Http(resp) => {
                RealtimeError::ConnectionFailed(format!("HTTP error: {:?}", resp.status()))
            }
            Error::HttpFormat(e) => RealtimeError::ConnectionFailed(e.to_string()),
            other => RealtimeError::Protocol(other.to_string()),
        }
    }
}
