//! Shared utilities used by both the REST and realtime layers.

pub mod backoff;

pub use backoff::BackoffPolicy;
