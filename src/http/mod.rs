//! HTTP client module
//!
//! Provides the HTTP client used for every page request.
//!
//! # Features
//!
//! - **Throttle handling**: 429 responses are retried after Retry-After
//!   (or a growing default wait), up to a per-request budget
//! - **Transient retries**: timeouts, connection failures and 5xx with backoff
//! - **Pacing**: optional token bucket limiter using governor
//! - **Auth classification**: 401/403 surface as [`crate::Error::Auth`]

mod client;
mod rate_limit;

pub use client::{
    HttpClient, HttpClientConfig, HttpClientConfigBuilder, HttpResponse, RequestConfig,
    RetryNotice,
};
pub use rate_limit::{parse_retry_after, retry_after, RateLimiter, RateLimiterConfig, ThrottlePolicy};
