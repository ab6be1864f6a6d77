//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use reqwest::header::HeaderMap;
use serde_json::Value;

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available
    Continue {
        /// Query parameters to add/replace on the base request
        query_params: Vec<(String, String)>,
        /// A complete URL to request instead of the base request
        url: Option<String>,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Create a continuation with a single parameter
    pub fn with_param(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Continue {
            query_params: vec![(key.into(), value.into())],
            url: None,
        }
    }

    /// Create a continuation with a new URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self::Continue {
            query_params: Vec::new(),
            url: Some(url.into()),
        }
    }

    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue { .. })
    }
}

/// State carried between pages of one listing run
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Records skipped so far (offset pagination)
    pub offset: u64,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the offset past `amount` records
    pub fn add_offset(&mut self, amount: u64) {
        self.offset += amount;
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync {
    /// Query parameters for the first request
    fn initial_params(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Process a successful response and determine if there's a next page
    fn process_response(
        &self,
        body: &Value,
        headers: &HeaderMap,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage;
}

/// Extract a scalar at a dotted path as a string (`$.` prefix optional).
///
/// Null, missing, and non-scalar values yield `None`.
pub fn extract_jsonpath(value: &Value, path: &str) -> Option<String> {
    match crate::decode::lookup(value, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
