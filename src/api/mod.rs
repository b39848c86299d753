//! REST API module for Switchboard.
//!
//! The [`ApiClient`] is a thin, typed request engine. It attaches the bearer
//! credential, retries 5xx/429 responses and transport failures with
//! exponential backoff, honors `Retry-After`, and classifies error responses
//! into [`ApiError`].
//!
//! # Client Configuration
//!
//! ```rust,ignore
//! use switchboard::api::ApiClient;
//! use std::time::Duration;
//!
//! let client = ApiClient::builder("sk_live_...")
//!     .base_url("https://api.switchboard.dev")
//!     .timeout(Duration::from_secs(10))
//!     .max_retries(5)
//!     .header("X-Request-Source", "billing-worker")
//!     .build()?;
//! ```
//!
//! # Error Handling
//!
//! ```rust,ignore
//! use switchboard::api::ApiError;
//!
//! match client.get::<serde_json::Value>("/v1/channels/ch_missing").await {
//!     Ok(channel) => println!("{channel}"),
//!     Err(ApiError::NotFound(body)) => println!("No such channel: {}", body.message),
//!     Err(ApiError::RateLimited { retry_after, .. }) => println!("Slow down: {:?}", retry_after),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```

pub mod client;
pub mod error;

pub use client::{ApiClient, ApiClientBuilder, RequestOptions};
pub use error::{ApiError, ApiResult, ErrorBody};
