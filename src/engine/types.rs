//! Engine types
//!
//! Progress events, fetch configuration, statistics and the final result.

use crate::types::Record;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

/// Progress reported while pages are being fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A page was decoded and its records appended
    Page {
        /// 1-based page index
        page: usize,
        /// Records on this page
        records: usize,
        /// Records accumulated so far
        total: usize,
    },
    /// The server throttled the request for `page`; waiting before retrying it
    Throttled {
        page: usize,
        attempt: u32,
        wait: Duration,
    },
    /// A transient failure on `page`; retrying the same request
    Retrying {
        page: usize,
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    /// The listing is complete
    Finished { pages: usize, total: usize },
}

/// Receives progress events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &Event) {
        match event {
            Event::Page {
                page,
                records,
                total,
            } => info!(page, records, total, "Fetched page {page}: {records} records ({total} total)"),
            Event::Throttled {
                page,
                attempt,
                wait,
            } => warn!(
                page,
                attempt,
                "Rate limited (429) on page {page}; waiting {:.1}s before retrying",
                wait.as_secs_f64()
            ),
            Event::Retrying {
                page,
                attempt,
                delay,
                reason,
            } => warn!(
                page,
                attempt,
                "Request for page {page} failed ({reason}); retrying in {delay:?}"
            ),
            Event::Finished { pages, total } => {
                info!(pages, total, "Listing complete: {total} records in {pages} pages");
            }
        }
    }
}

/// Records events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events so far
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Configuration for the listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Listing endpoint (absolute URL or path relative to the client base URL)
    pub endpoint: String,
    /// Records requested per page
    pub page_size: usize,
    /// Query parameter carrying the page size
    pub page_size_param: String,
    /// Query parameter carrying the window start
    pub from_param: String,
    /// Query parameter carrying the window end
    pub to_param: String,
    /// Additional fixed query parameters
    pub extra_query: Vec<(String, String)>,
}

/// Largest page the converged recordings endpoint accepts
pub const MAX_PAGE_SIZE: usize = 100;

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: "admin/convergedRecordings".to_string(),
            page_size: MAX_PAGE_SIZE,
            page_size_param: "max".to_string(),
            from_param: "from".to_string(),
            to_param: "to".to_string(),
            extra_query: Vec::new(),
        }
    }
}

impl FetchConfig {
    /// Create a new fetch config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set page size
    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Set the page size parameter name
    #[must_use]
    pub fn with_page_size_param(mut self, param: impl Into<String>) -> Self {
        self.page_size_param = param.into();
        self
    }

    /// Set the window parameter names
    #[must_use]
    pub fn with_window_params(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_param = from.into();
        self.to_param = to.into();
        self
    }

    /// Add a fixed query parameter
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_query.push((key.into(), value.into()));
        self
    }
}

/// Statistics from a fetch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Pages fetched
    pub pages: usize,
    /// Records accumulated
    pub records: usize,
    /// 429 responses waited out
    pub throttled: usize,
    /// Transient failures retried
    pub retried: usize,
    /// Records whose `id` had already been seen
    pub duplicate_ids: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Every record of the listing, in arrival order
#[derive(Debug, Clone, Default)]
pub struct ExportResult {
    records: Vec<Record>,
    stats: FetchStats,
}

impl ExportResult {
    pub fn new(records: Vec<Record>, stats: FetchStats) -> Self {
        Self { records, stats }
    }

    /// Build a result from records alone
    pub fn from_records(records: Vec<Record>) -> Self {
        let stats = FetchStats {
            records: records.len(),
            ..FetchStats::default()
        };
        Self { records, stats }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Total record count
    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }
}
