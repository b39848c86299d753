//! Switchboard REST request engine.
//!
//! [`ApiClient`] issues authenticated JSON requests against the Switchboard
//! REST API. Resource wrappers sit on top of [`ApiClient::request`]; the
//! engine itself owns retries, timeouts and error classification.
//!
//! # Example
//!
//! ```rust,ignore
//! use switchboard::api::{ApiClient, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::builder("sk_live_...").build()?;
//!
//!     let channels: serde_json::Value = client.get("/v1/channels").await?;
//!     println!("{channels}");
//!
//!     let opts = RequestOptions::post("/v1/messages")
//!         .json(&serde_json::json!({ "channelId": "ch_1", "text": "hi" }))?;
//!     let sent: serde_json::Value = client.request(opts).await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::error::{ApiError, ApiResult, ErrorBody};
use crate::network::DEFAULT_API_URL;
use crate::shared::BackoffPolicy;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the first attempt.
const DEFAULT_MAX_RETRIES: u32 = 3;

const DEFAULT_USER_AGENT: &str = concat!("switchboard-rust/", env!("CARGO_PKG_VERSION"));

/// A single logical request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub query: Vec<(String, String)>,
    /// Overrides the client-wide timeout for this request only.
    pub timeout: Option<Duration>,
    /// Merged over the default headers; later values win.
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
            timeout: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> ApiResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidParameter(format!("Unserializable body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append a query parameter only when a value is present.
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Builder for configuring [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    user_agent: String,
    default_headers: Vec<(String, String)>,
    backoff: BackoffPolicy,
}

impl ApiClientBuilder {
    /// Create a new builder with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: Vec::new(),
            backoff: BackoffPolicy::http(),
        }
    }

    /// Set the base URL (trailing slashes are trimmed).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of retries after the first attempt (0 disables retries).
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Backoff between attempts when the server gives no `Retry-After`.
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Add a default header to all requests.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Build the client.
    pub fn build(self) -> ApiResult<ApiClient> {
        if self.api_key.trim().is_empty() {
            return Err(ApiError::InvalidParameter("API key cannot be empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            header_value(&format!("Bearer {}", self.api_key.trim()))?,
        );
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(reqwest::header::USER_AGENT, header_value(&self.user_agent)?);
        merge_headers(&mut headers, &self.default_headers)?;

        let http_client = Client::builder().pool_max_idle_per_host(10).build()?;

        Ok(ApiClient {
            http_client,
            base_url: self.base_url,
            headers,
            timeout: self.timeout,
            max_retries: self.max_retries,
            backoff: self.backoff,
        })
    }
}

/// Switchboard REST request engine.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: String,
    headers: HeaderMap,
    timeout: Duration,
    max_retries: u32,
    backoff: BackoffPolicy,
}

impl ApiClient {
    /// Create a client against the default base URL.
    pub fn new(api_key: impl Into<String>) -> ApiResult<Self> {
        ApiClientBuilder::new(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder::new(api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    // =========================================================================
    // Convenience verbs
    // =========================================================================

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(RequestOptions::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.request(RequestOptions::post(path).json(body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.request(RequestOptions::put(path).json(body)?).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.request(RequestOptions::patch(path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(RequestOptions::delete(path)).await
    }

    // =========================================================================
    // Engine
    // =========================================================================

    /// Execute one logical request, retrying 5xx/429 and transport failures.
    ///
    /// A `204 No Content` response decodes from JSON `null`, so callers asking
    /// for `()`, `Option<T>` or `serde_json::Value` get an empty result.
    pub async fn request<T: DeserializeOwned>(&self, opts: RequestOptions) -> ApiResult<T> {
        let url = self.build_url(&opts.path, &opts.query)?;
        let mut headers = self.headers.clone();
        merge_headers(&mut headers, &opts.headers)?;
        let timeout = opts.timeout.unwrap_or(self.timeout);

        let mut attempt = 0u32;

        loop {
            let mut builder = self
                .http_client
                .request(opts.method.clone(), &url)
                .headers(headers.clone());
            if let Some(body) = &opts.body {
                builder = builder.json(body);
            }

            // The deadline covers the body read too, not just the headers.
            let error = match tokio::time::timeout(timeout, execute::<T>(builder)).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => error,
                Err(_elapsed) => ApiError::Timeout(timeout),
            };

            let delay = match &error {
                ApiError::RateLimited { .. } | ApiError::Server { .. } => {
                    // A zero delay (e.g. `Retry-After: 0`) surfaces the error.
                    match self.backoff.retry_delay(attempt, error.retry_after()) {
                        delay if delay.is_zero() => return Err(error),
                        delay => delay,
                    }
                }
                ApiError::Network(_) | ApiError::Timeout(_) => self.backoff.delay_for_attempt(attempt),
                _ => return Err(error),
            };

            if attempt >= self.max_retries {
                return Err(error);
            }

            tracing::debug!(
                attempt = attempt + 1,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                status = ?error.status(),
                error = %error,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Build the absolute URL for `path` plus encoded query parameters.
    fn build_url(&self, path: &str, query: &[(String, String)]) -> ApiResult<String> {
        let path = path.trim_start_matches('/');
        let mut url = format!("{}/{}", self.base_url, path);
        if !query.is_empty() {
            let encoded = serde_urlencoded::to_string(query)
                .map_err(|e| ApiError::InvalidParameter(format!("Invalid query: {}", e)))?;
            url.push('?');
            url.push_str(&encoded);
        }
        Ok(url)
    }

}

/// Send one attempt and read its body. Non-success statuses become typed errors.
async fn execute<T: DeserializeOwned>(builder: reqwest::RequestBuilder) -> ApiResult<T> {
    let response = builder.send().await?;
    let status = response.status();
    if status.is_success() {
        decode_success(status, response).await
    } else {
        Err(parse_error_response(response).await)
    }
}

async fn decode_success<T: DeserializeOwned>(status: StatusCode, response: Response) -> ApiResult<T> {
    if status == StatusCode::NO_CONTENT {
        return serde_json::from_value(serde_json::Value::Null)
            .map_err(|e| ApiError::Deserialize(format!("Empty response: {}", e)));
    }

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return serde_json::from_value(serde_json::Value::Null)
            .map_err(|e| ApiError::Deserialize(format!("Empty response: {}", e)));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::Deserialize(format!("Failed to deserialize response: {}", e)))
}

/// Parse an error response into an ApiError.
async fn parse_error_response(response: Response) -> ApiError {
    let status = response.status();
    let retry_after = parse_retry_after(response.headers());

    let body = match response.text().await {
        Ok(text) => ErrorBody::parse(status, &text),
        Err(e) => {
            tracing::warn!("Failed to read error response body: {}", e);
            ErrorBody::parse(status, "")
        }
    };

    ApiError::from_status(status, body, retry_after)
}

/// `Retry-After` in whole seconds. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn header_value(value: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ApiError::InvalidParameter(format!("Invalid header value: {}", e)))
}

fn merge_headers(headers: &mut HeaderMap, extra: &[(String, String)]) -> ApiResult<()> {
    for (name, value) in extra {
        let header_name = HeaderName::try_from(name.as_str())
            .map_err(|e| ApiError::InvalidParameter(format!("Invalid header name '{}': {}", name, e)))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            ApiError::InvalidParameter(format!("Invalid header value for '{}': {}", name, e))
        })?;
        headers.insert(header_name, header_value);
    }
    Ok(())
}
