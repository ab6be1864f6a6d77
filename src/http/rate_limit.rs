//! Client-side request pacing and server throttle policy
//!
//! Pacing uses the governor crate for token bucket rate limiting so the
//! client stays under the server's limits. When the server still answers
//! 429, [`ThrottlePolicy`] decides how long to wait before re-issuing the
//! same request.

use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use reqwest::header::HeaderMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for client-side pacing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per second
    pub requests_per_second: u32,
    /// Burst size (max tokens in bucket)
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 5,
            burst_size: 1,
        }
    }
}

impl RateLimiterConfig {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }
}

/// Token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter; zero values are treated as one.
    pub fn new(config: &RateLimiterConfig) -> Self {
        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rps).allow_burst(burst);

        Self {
            limiter: Arc::new(Governor::direct(quota)),
        }
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}

/// How to react to 429 Too Many Requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottlePolicy {
    /// Consecutive 429s tolerated for one request before giving up
    pub max_retries: u32,
    /// Wait used when the server sends no Retry-After
    pub default_wait: Duration,
    /// Upper bound for any single wait
    pub max_wait: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            default_wait: Duration::from_secs(5),
            max_wait: Duration::from_secs(300),
        }
    }
}

impl ThrottlePolicy {
    /// Wait before retry number `consecutive` (1-based) of the same request.
    ///
    /// A server hint wins; otherwise the default doubles per consecutive
    /// throttle. Both are capped at `max_wait`.
    pub fn wait_for(&self, server_hint: Option<Duration>, consecutive: u32) -> Duration {
        let wait = server_hint.unwrap_or_else(|| {
            let factor = 2u32.saturating_pow(consecutive.saturating_sub(1));
            self.default_wait.saturating_mul(factor)
        });
        wait.min(self.max_wait)
    }
}

/// Read the Retry-After header (delta-seconds or HTTP-date).
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| parse_retry_after(s, Utc::now()))
}

/// Parse a Retry-After value relative to `now`. Dates in the past mean zero.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod rate_limit_tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_rate_limiter_config_default() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.requests_per_second, 5);
        assert_eq!(config.burst_size, 1);
    }

    #[tokio::test]
    async fn test_rate_limiter_burst_is_immediate() {
        let limiter = RateLimiter::new(&RateLimiterConfig::new(1, 3));
        let start = std::time::Instant::now();
        for _ in 0..3 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_rate_limiter_zero_config_does_not_panic() {
        let limiter = RateLimiter::new(&RateLimiterConfig::new(0, 0));
        limiter.wait().await;
    }

    #[test]
    fn test_throttle_policy_prefers_server_hint() {
        let policy = ThrottlePolicy::default();
        assert_eq!(
            policy.wait_for(Some(Duration::from_secs(7)), 4),
            Duration::from_secs(7)
        );
        assert_eq!(
            policy.wait_for(Some(Duration::from_secs(3600)), 1),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_throttle_policy_default_grows_and_caps() {
        let policy = ThrottlePolicy {
            max_retries: 10,
            default_wait: Duration::from_secs(5),
            max_wait: Duration::from_secs(30),
        };
        assert_eq!(policy.wait_for(None, 1), Duration::from_secs(5));
        assert_eq!(policy.wait_for(None, 2), Duration::from_secs(10));
        assert_eq!(policy.wait_for(None, 3), Duration::from_secs(20));
        assert_eq!(policy.wait_for(None, 4), Duration::from_secs(30));
        assert_eq!(policy.wait_for(None, 40), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let now = Utc::now();
        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 0 ", now), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(60))
        );

        let later = Utc.with_ymd_and_hms(2015, 10, 21, 8, 0, 0).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", later),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert("retry-after", HeaderValue::from_static("9"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(9)));
    }
}
