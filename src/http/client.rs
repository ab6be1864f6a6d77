//! HTTP client with retry and throttle handling
//!
//! One call to [`HttpClient::fetch`] performs one logical request: it
//! re-issues the identical request on 429 (waiting as the server asks) and
//! on transient failures (with backoff), and returns the response body only
//! once it has been read completely.

use super::rate_limit::{retry_after, RateLimiter, RateLimiterConfig, ThrottlePolicy};
use crate::error::{is_retryable_status, Error, Result};
use crate::types::BackoffType;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for relative paths
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Retries for transient failures (timeouts, connection errors, 5xx)
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Reaction to 429 responses
    pub throttle: ThrottlePolicy,
    /// Client-side pacing
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: Vec<(String, String)>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            backoff_type: BackoffType::Exponential,
            throttle: ThrottlePolicy::default(),
            rate_limit: None,
            default_headers: Vec::new(),
            user_agent: format!("recordings-export/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries for transient failures
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set the 429 policy
    pub fn throttle(mut self, policy: ThrottlePolicy) -> Self {
        self.config.throttle = policy;
        self
    }

    /// Enable client-side pacing
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable client-side pacing
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((key.into(), value.into()));
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
///
/// Query parameters keep their insertion order so a retried request is
/// byte-for-byte the same URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestConfig {
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Bearer token for the Authorization header
    pub bearer: Option<String>,
    /// Override timeout for this request
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Authenticate with a bearer token
    #[must_use]
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Something that happened while a request was being retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryNotice {
    /// The server answered 429; the same request will be sent after `wait`
    Throttled {
        /// Consecutive 429s for this request so far
        attempt: u32,
        wait: Duration,
        /// Whether the wait came from Retry-After
        server_hint: bool,
    },
    /// A transient failure; the same request will be sent after `delay`
    Retrying {
        attempt: u32,
        delay: Duration,
        reason: String,
    },
}

/// A fully read response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The URL that was requested, query included
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    /// Parse the body as JSON
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body)
            .map_err(|e| Error::decode(format!("response body is not valid JSON: {e}")))
    }
}

/// HTTP client with retry and throttle handling
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Check if client-side pacing is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// GET without retry notifications
    pub async fn get(&self, url: &str, config: &RequestConfig) -> Result<HttpResponse> {
        self.fetch(url, config, &|_| {}).await
    }

    /// GET `url`, retrying the identical request until it succeeds, fails
    /// for good, or a retry budget runs out.
    ///
    /// 401/403 are returned as [`Error::Auth`] at once. Other 4xx statuses
    /// are not retried.
    pub async fn fetch(
        &self,
        url: &str,
        config: &RequestConfig,
        notify: &(dyn Fn(&RetryNotice) + Sync),
    ) -> Result<HttpResponse> {
        let full_url = self.build_url(url);
        let timeout = config.timeout.unwrap_or(self.config.timeout);
        let throttle = &self.config.throttle;

        let mut throttled = 0u32;
        let mut failures = 0u32;

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let req = self.build_request(&full_url, config, timeout);
            debug!(url = %full_url, "GET");

            let err = match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    let requested = response.url().to_string();
                    let headers = response.headers().clone();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        throttled += 1;
                        let hint = retry_after(&headers);
                        let wait = throttle.wait_for(hint, throttled);
                        if throttled > throttle.max_retries {
                            return Err(Error::RateLimited {
                                retry_after_seconds: wait.as_secs(),
                                attempts: throttled,
                            });
                        }
                        debug!(
                            "Rate limited (429), attempt {}/{}, waiting {:?}",
                            throttled, throttle.max_retries, wait
                        );
                        notify(&RetryNotice::Throttled {
                            attempt: throttled,
                            wait,
                            server_hint: hint.is_some(),
                        });
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    match response.text().await {
                        Ok(body) => {
                            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
                            {
                                return Err(Error::auth(status.as_u16(), error_message(&body)));
                            }
                            if status.is_client_error() || status.is_server_error() {
                                let err = Error::http_status(status.as_u16(), error_message(&body));
                                if !is_retryable_status(status.as_u16()) {
                                    return Err(err);
                                }
                                err
                            } else {
                                debug!(status = status.as_u16(), url = %requested, "Request succeeded");
                                return Ok(HttpResponse {
                                    url: requested,
                                    status: status.as_u16(),
                                    headers,
                                    body,
                                });
                            }
                        }
                        Err(e) => Error::Http(e),
                    }
                }
                Err(e) if e.is_timeout() => Error::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                },
                Err(e) => Error::Http(e),
            };

            if !err.is_retryable() {
                return Err(err);
            }

            // a transient failure breaks any run of 429s
            throttled = 0;
            failures += 1;
            if failures > self.config.max_retries {
                return Err(err);
            }

            let delay = self.calculate_backoff(failures - 1);
            debug!(
                "Request failed ({}), attempt {}/{}, retrying in {:?}",
                err,
                failures,
                self.config.max_retries,
                delay
            );
            notify(&RetryNotice::Retrying {
                attempt: failures,
                delay,
                reason: err.to_string(),
            });
            tokio::time::sleep(delay).await;
        }
    }

    fn build_request(&self, url: &str, config: &RequestConfig, timeout: Duration) -> RequestBuilder {
        let mut req = self.client.get(url).timeout(timeout);

        for (key, value) in self.config.default_headers.iter().chain(&config.headers) {
            req = req.header(key.as_str(), value.as_str());
        }

        if !config.query.is_empty() {
            req = req.query(&config.query);
        }

        if let Some(ref token) = config.bearer {
            req = req.bearer_auth(token);
        }

        req
    }

    /// Resolve `path` against the base URL; absolute URLs pass through
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff.saturating_mul(attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.config.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Pull a human-readable message out of an error body.
///
/// Webex errors look like `{"message": "...", "trackingId": "..."}`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}
