//! Top-level Switchboard client.
//!
//! Bundles the REST engine with a token fetcher bound to it, and builds
//! realtime clients that authenticate through that fetcher.

use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiClient, ApiClientBuilder, ApiResult};
use crate::auth::{ApiTokenFetcher, TokenFetcher};
use crate::realtime::{RealtimeClient, RealtimeClientBuilder, RealtimeConfig, RealtimeResult};

/// Builder for [`SwitchboardClient`].
#[derive(Debug, Clone)]
pub struct SwitchboardClientBuilder {
    api: ApiClientBuilder,
    realtime: RealtimeConfig,
}

impl SwitchboardClientBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api: ApiClientBuilder::new(api_key),
            realtime: RealtimeConfig::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.api = self.api.base_url(url);
        self
    }

    pub fn realtime_url(mut self, url: impl Into<String>) -> Self {
        self.realtime.url = url.into();
        self
    }

    /// REST request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.api = self.api.timeout(timeout);
        self
    }

    /// REST retries after the first attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.api = self.api.max_retries(max_retries);
        self
    }

    /// Template for every realtime client built by [`SwitchboardClient::realtime`].
    pub fn realtime_config(mut self, config: RealtimeConfig) -> Self {
        self.realtime = config;
        self
    }

    pub fn build(self) -> ApiResult<SwitchboardClient> {
        let api = self.api.build()?;
        let token_fetcher = Arc::new(ApiTokenFetcher::new(api.clone()));
        Ok(SwitchboardClient {
            api,
            token_fetcher,
            realtime: self.realtime,
        })
    }
}

/// Entry point for the Switchboard SDK.
///
/// # Example
///
/// ```rust,ignore
/// use switchboard::SwitchboardClient;
///
/// let client = SwitchboardClient::new("sk_live_...")?;
/// let channels: serde_json::Value = client.api().get("/v1/channels").await?;
///
/// let realtime = client.realtime()?;
/// realtime.connect().await?;
/// realtime.subscribe_all().await?;
/// ```
#[derive(Debug, Clone)]
pub struct SwitchboardClient {
    api: ApiClient,
    token_fetcher: Arc<ApiTokenFetcher>,
    realtime: RealtimeConfig,
}

impl SwitchboardClient {
    pub fn new(api_key: impl Into<String>) -> ApiResult<Self> {
        SwitchboardClientBuilder::new(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> SwitchboardClientBuilder {
        SwitchboardClientBuilder::new(api_key)
    }

    /// The REST request engine.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Token fetcher bound to this client's API key.
    pub fn token_fetcher(&self) -> Arc<dyn TokenFetcher> {
        self.token_fetcher.clone()
    }

    /// Builder pre-wired with this client's token fetcher and realtime config.
    ///
    /// Use it to inject a custom transport or tweak settings per connection.
    pub fn realtime_builder(&self) -> RealtimeClientBuilder {
        RealtimeClient::builder()
            .config(self.realtime.clone())
            .shared_token_fetcher(self.token_fetcher())
    }

    /// A new realtime client using the bundled transport. Does not connect.
    pub fn realtime(&self) -> RealtimeResult<RealtimeClient> {
        self.realtime_builder().build()
    }
}
