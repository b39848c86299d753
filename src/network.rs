//! Network URL constants for the Switchboard SDK.

/// Default REST API base URL for Switchboard.
pub const DEFAULT_API_URL: &str = "https://api.switchboard.dev";

/// Default realtime WebSocket URL for Switchboard.
pub const DEFAULT_REALTIME_URL: &str = "wss://realtime.switchboard.dev/v1/realtime";

/// Path of the endpoint that exchanges an API key for a realtime access token.
pub const REALTIME_AUTH_PATH: &str = "/v1/realtime/auth";
