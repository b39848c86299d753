//! Realtime access tokens.
//!
//! The realtime socket does not accept the long-lived API key. Before every
//! connect attempt the client asks a [`TokenFetcher`] for a short-lived token
//! and appends it to the socket URL.
//!
//! # Flow
//!
//! 1. `POST /v1/realtime/auth` with the API key as bearer credential
//! 2. Extract `token` from the JSON response
//! 3. Connect to `wss://.../v1/realtime?token=<token>`

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Deserialize;

use crate::api::{ApiClient, RequestOptions};
use crate::network::REALTIME_AUTH_PATH;
use crate::realtime::error::{RealtimeError, RealtimeResult};

/// Supplies access tokens to the realtime client.
pub trait TokenFetcher: Send + Sync {
    /// Fetch a token valid for one connect attempt.
    fn fetch_token(&self) -> BoxFuture<'_, RealtimeResult<String>>;
}

/// Response from the realtime auth endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Fetches tokens from `POST /v1/realtime/auth` through the REST engine.
#[derive(Debug, Clone)]
pub struct ApiTokenFetcher {
    api: ApiClient,
}

impl ApiTokenFetcher {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Request a token. Retries and error mapping are the engine's.
    pub async fn request_token(&self) -> RealtimeResult<String> {
        let response: TokenResponse = self
            .api
            .request(RequestOptions::post(REALTIME_AUTH_PATH))
            .await?;

        let token = response.token.trim();
        if token.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "Server returned an empty realtime token".to_string(),
            ));
        }
        Ok(token.to_string())
    }
}

impl TokenFetcher for ApiTokenFetcher {
    fn fetch_token(&self) -> BoxFuture<'_, RealtimeResult<String>> {
        self.request_token().boxed()
    }
}

/// Hands out a token obtained elsewhere.
#[derive(Debug, Clone)]
pub struct StaticTokenFetcher {
    token: String,
}

impl StaticTokenFetcher {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenFetcher for StaticTokenFetcher {
    fn fetch_token(&self) -> BoxFuture<'_, RealtimeResult<String>> {
        let token = self.token.trim();
        let result = if token.is_empty() {
            Err(RealtimeError::AuthenticationFailed(
                "Realtime token cannot be empty".to_string(),
            ))
        } else {
            Ok(token.to_string())
        };
        futures_util::future::ready(result).boxed()
    }
}
