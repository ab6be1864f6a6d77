//! Error types for recordings-export
//!
//! Every public API returns `Result<T, Error>`. Request-level failures are
//! wrapped in [`Error::Transport`] by the fetch engine so the caller always
//! learns which page ended the run.

use thiserror::Error;

/// The main error type for recordings-export
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid time window: {message}")]
    InvalidWindow { message: String },

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Access token is required")]
    MissingCredential,

    #[error(
        "Authentication failed (HTTP {status}): {message}; check that the access token is valid \
         and has the spark-admin:recordings_read or spark-compliance:recordings_read scope"
    )]
    Auth { status: u16, message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited {attempts} times in a row (last retry-after {retry_after_seconds}s)")]
    RateLimited {
        retry_after_seconds: u64,
        attempts: u32,
    },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Pagination error: {message}")]
    Pagination { message: String },

    /// A page request failed for good; the run is aborted.
    #[error("Failed to fetch page {page}: {source}")]
    Transport {
        page: usize,
        #[source]
        source: Box<Error>,
    },

    // ============================================================================
    // Output Errors
    // ============================================================================
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Output error: {message}")]
    Output { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(status: u16, message: impl Into<String>) -> Self {
        Self::Auth {
            status,
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a pagination error
    pub fn pagination(message: impl Into<String>) -> Self {
        Self::Pagination {
            message: message.into(),
        }
    }

    /// Create an invalid window error
    pub fn invalid_window(message: impl Into<String>) -> Self {
        Self::InvalidWindow {
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Wrap a request-level error with the page it happened on.
    ///
    /// Auth errors pass through untouched so callers can match on them.
    pub fn at_page(self, page: usize) -> Self {
        match self {
            Error::Auth { .. } | Error::Transport { .. } => self,
            other => Error::Transport {
                page,
                source: Box::new(other),
            },
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Error::RateLimited { .. } | Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Check if this error is an authentication failure
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth { .. })
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(
        status,
        429 | 500 | 502 | 503 | 504 | 520 | 521 | 522 | 523 | 524
    )
}

/// Result type alias for recordings-export
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
