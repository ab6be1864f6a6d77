//! Export configuration
//!
//! Every field has a default matching the Webex converged recordings API,
//! so an empty YAML document (or no file at all) is a valid configuration.
//! Command-line flags override individual values after loading.

use crate::decode::JsonDecoder;
use crate::engine::{FetchConfig, MAX_PAGE_SIZE};
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClientConfig, RateLimiterConfig, ThrottlePolicy};
use crate::output::ExportOptions;
use crate::pagination::{
    CursorPaginator, LinkHeaderPaginator, NextUrlPaginator, OffsetPaginator, Paginator,
};
use crate::types::BackoffType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://webexapis.com/v1";

/// Default output file name
pub const DEFAULT_OUTPUT: &str = "converged_recordings.csv";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete export configuration, loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// API root; relative endpoints are resolved against it
    pub base_url: String,

    /// Listing endpoint
    pub endpoint: String,

    /// Records per page
    pub page_size: usize,

    /// Query parameter carrying the page size
    pub page_size_param: String,

    /// Query parameter carrying the window start
    pub from_param: String,

    /// Query parameter carrying the window end
    pub to_param: String,

    /// Where the records array sits in the response body
    pub records_path: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Continuation strategy
    pub pagination: PaginationDefinition,

    /// Output file settings
    pub output: OutputDefinition,

    /// Transient failure retries
    pub retry: RetryDefinition,

    /// 429 handling
    pub throttle: ThrottleDefinition,

    /// Optional client-side pacing
    pub rate_limit: Option<RateLimitDefinition>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint: "admin/convergedRecordings".to_string(),
            page_size: MAX_PAGE_SIZE,
            page_size_param: "max".to_string(),
            from_param: "from".to_string(),
            to_param: "to".to_string(),
            records_path: "items".to_string(),
            timeout_secs: 60,
            pagination: PaginationDefinition::default(),
            output: OutputDefinition::default(),
            retry: RetryDefinition::default(),
            throttle: ThrottleDefinition::default(),
            rate_limit: None,
        }
    }
}

// ============================================================================
// Nested Definitions
// ============================================================================

/// How the next page is located
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationDefinition {
    /// `Link: <url>; rel="next"` response header
    LinkHeader {
        #[serde(default = "default_rel")]
        rel: String,
    },

    /// Next page URL in the response body
    NextUrl { path: String },

    /// Opaque cursor in the body, sent back as a query parameter
    Cursor { param: String, path: String },

    /// Numeric offset query parameter
    Offset { param: String },
}

impl Default for PaginationDefinition {
    fn default() -> Self {
        Self::LinkHeader { rel: default_rel() }
    }
}

fn default_rel() -> String {
    "next".to_string()
}

/// Output file settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputDefinition {
    pub path: PathBuf,
    /// Columns written first, in this order
    pub pinned_columns: Vec<String>,
}

impl Default for OutputDefinition {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_OUTPUT),
            pinned_columns: Vec::new(),
        }
    }
}

/// Retry settings for transient failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryDefinition {
    pub max_retries: u32,
    pub backoff: BackoffType,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryDefinition {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffType::Exponential,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

/// 429 handling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleDefinition {
    /// Consecutive 429s tolerated for one request
    pub max_retries: u32,
    /// Wait when the server gives no Retry-After
    pub default_wait_secs: u64,
    /// Upper bound for any single wait
    pub max_wait_secs: u64,
}

impl Default for ThrottleDefinition {
    fn default() -> Self {
        let policy = ThrottlePolicy::default();
        Self {
            max_retries: policy.max_retries,
            default_wait_secs: policy.default_wait.as_secs(),
            max_wait_secs: policy.max_wait.as_secs(),
        }
    }
}

/// Client-side pacing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDefinition {
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_burst() -> u32 {
    1
}

// ============================================================================
// Loading and Validation
// ============================================================================

impl ExportConfig {
    /// Load and validate a YAML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // an empty document deserializes as unit, not as an empty mapping
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and required fields
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.base_url)?;

        if self.endpoint.trim().is_empty() {
            return Err(Error::invalid_value("endpoint", "cannot be empty"));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::invalid_value(
                "page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }

        for (field, value) in [
            ("page_size_param", &self.page_size_param),
            ("from_param", &self.from_param),
            ("to_param", &self.to_param),
        ] {
            if value.trim().is_empty() {
                return Err(Error::invalid_value(field, "cannot be empty"));
            }
        }

        if self.timeout_secs == 0 {
            return Err(Error::invalid_value("timeout_secs", "must be at least 1"));
        }

        match &self.pagination {
            PaginationDefinition::LinkHeader { rel } if rel.trim().is_empty() => {
                return Err(Error::invalid_value("pagination.rel", "cannot be empty"));
            }
            PaginationDefinition::NextUrl { path } if path.trim().is_empty() => {
                return Err(Error::invalid_value("pagination.path", "cannot be empty"));
            }
            PaginationDefinition::Cursor { param, path }
                if param.trim().is_empty() || path.trim().is_empty() =>
            {
                return Err(Error::config(
                    "cursor pagination needs both a param and a path",
                ));
            }
            PaginationDefinition::Offset { param } if param.trim().is_empty() => {
                return Err(Error::invalid_value("pagination.param", "cannot be empty"));
            }
            _ => {}
        }

        if self.output.path.as_os_str().is_empty() {
            return Err(Error::invalid_value("output.path", "cannot be empty"));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(Error::invalid_value(
                "retry.initial_backoff_ms",
                "cannot exceed retry.max_backoff_ms",
            ));
        }

        if self.throttle.default_wait_secs > self.throttle.max_wait_secs {
            return Err(Error::invalid_value(
                "throttle.default_wait_secs",
                "cannot exceed throttle.max_wait_secs",
            ));
        }

        if let Some(rate) = &self.rate_limit {
            if rate.requests_per_second == 0 || rate.burst == 0 {
                return Err(Error::invalid_value(
                    "rate_limit",
                    "requests_per_second and burst must be at least 1",
                ));
            }
        }

        Ok(())
    }

    // ========================================================================
    // Builders
    // ========================================================================

    /// HTTP client settings
    pub fn http_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(self.base_url.clone())
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_retries(self.retry.max_retries)
            .backoff(
                self.retry.backoff,
                Duration::from_millis(self.retry.initial_backoff_ms),
                Duration::from_millis(self.retry.max_backoff_ms),
            )
            .throttle(ThrottlePolicy {
                max_retries: self.throttle.max_retries,
                default_wait: Duration::from_secs(self.throttle.default_wait_secs),
                max_wait: Duration::from_secs(self.throttle.max_wait_secs),
            })
            .header("Accept", "application/json");

        if let Some(rate) = &self.rate_limit {
            builder = builder.rate_limit(RateLimiterConfig::new(rate.requests_per_second, rate.burst));
        }

        builder.build()
    }

    /// Listing request settings
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig::new()
            .with_endpoint(self.endpoint.clone())
            .with_page_size(self.page_size)
            .with_page_size_param(self.page_size_param.clone())
            .with_window_params(self.from_param.clone(), self.to_param.clone())
    }

    /// The configured continuation strategy
    pub fn paginator(&self) -> Box<dyn Paginator> {
        match &self.pagination {
            PaginationDefinition::LinkHeader { rel } => Box::new(LinkHeaderPaginator::new(rel.clone())),
            PaginationDefinition::NextUrl { path } => Box::new(NextUrlPaginator::new(path.clone())),
            PaginationDefinition::Cursor { param, path } => {
                Box::new(CursorPaginator::new(param.clone(), path.clone()))
            }
            PaginationDefinition::Offset { param } => {
                Box::new(OffsetPaginator::new(param.clone(), self.page_size))
            }
        }
    }

    pub fn decoder(&self) -> JsonDecoder {
        JsonDecoder::new(self.records_path.clone())
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions::new().with_pinned_columns(self.output.pinned_columns.clone())
    }
}
