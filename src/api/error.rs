//! API error types for the Switchboard REST client.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// API-specific error type for the Switchboard REST client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request payload or parameters (400)
    #[error("Validation error: {0}")]
    Validation(ErrorBody),

    /// Missing or invalid API key (401)
    #[error("Authentication failed: {0}")]
    Authentication(ErrorBody),

    /// Authenticated but not allowed (403)
    #[error("Permission denied: {0}")]
    Authorization(ErrorBody),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(ErrorBody),

    /// Too many requests (429)
    #[error("Rate limited (retry after {retry_after:?}): {body}")]
    RateLimited {
        body: ErrorBody,
        retry_after: Option<Duration>,
    },

    /// Server-side error (5xx)
    #[error("Server error {status}: {body}")]
    Server {
        status: u16,
        body: ErrorBody,
        retry_after: Option<Duration>,
    },

    /// Any other non-success status
    #[error("Unexpected status {status}: {body}")]
    Api { status: u16, body: ErrorBody },

    /// The request did not complete within its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure (connection refused, DNS, TLS, ...)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON deserialization error
    #[error("Deserialization error: {0}")]
    Deserialize(String),

    /// Invalid parameter provided by the caller
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Map a non-success status and its parsed body into the error taxonomy.
    pub fn from_status(status: StatusCode, body: ErrorBody, retry_after: Option<Duration>) -> Self {
        match status {
            StatusCode::BAD_REQUEST => ApiError::Validation(body),
            StatusCode::UNAUTHORIZED => ApiError::Authentication(body),
            StatusCode::FORBIDDEN => ApiError::Authorization(body),
            StatusCode::NOT_FOUND => ApiError::NotFound(body),
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited { body, retry_after },
            _ if status.is_server_error() => ApiError::Server {
                status: status.as_u16(),
                body,
                retry_after,
            },
            _ => ApiError::Api {
                status: status.as_u16(),
                body,
            },
        }
    }

    /// HTTP status code associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Validation(_) => Some(400),
            ApiError::Authentication(_) => Some(401),
            ApiError::Authorization(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Server { status, .. } | ApiError::Api { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the request engine retries this kind of failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited { .. }
                | ApiError::Server { .. }
                | ApiError::Timeout(_)
                | ApiError::Network(_)
        )
    }

    /// Server-supplied `Retry-After` hint carried by 429 and 5xx errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after, .. } | ApiError::Server { retry_after, .. } => {
                *retry_after
            }
            _ => None,
        }
    }

    /// The parsed error body, for status-classified errors.
    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            ApiError::Validation(body)
            | ApiError::Authentication(body)
            | ApiError::Authorization(body)
            | ApiError::NotFound(body)
            | ApiError::RateLimited { body, .. }
            | ApiError::Server { body, .. }
            | ApiError::Api { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Error details returned by the API.
///
/// The wire shape is `{ "error": { "code": ..., "message": ..., "details": ... } }`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

impl ErrorBody {
    /// Build an error body from plain text (non-JSON responses).
    pub fn from_text(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            details: None,
        }
    }

    /// Parse a response body, falling back to the status reason text.
    pub fn parse(status: StatusCode, text: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(text) {
            Ok(envelope) if !envelope.error.message.is_empty() => envelope.error,
            Ok(envelope) => Self {
                message: status_text(status),
                ..envelope.error
            },
            Err(_) => Self::from_text(status_text(status)),
        }
    }
}

impl std::fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
