//! Query time window
//!
//! The export always covers a single trailing interval ending "now". The
//! window is computed once per run so every page queries the same range.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};

/// Length of the trailing window, in days.
pub const WINDOW_DAYS: i64 = 30;

/// Timestamp format the listing endpoint expects.
const QUERY_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A half-open UTC time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting empty or inverted ranges.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(Error::invalid_window(format!(
                "start {} is not before end {}",
                start.format(QUERY_FORMAT),
                end.format(QUERY_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    /// The trailing [`WINDOW_DAYS`] window ending now.
    pub fn trailing() -> Self {
        Self::trailing_from(Utc::now())
    }

    /// The trailing [`WINDOW_DAYS`] window ending at `now`.
    pub fn trailing_from(now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(WINDOW_DAYS),
            end: now,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Start formatted for the query string.
    pub fn start_param(&self) -> String {
        self.start.format(QUERY_FORMAT).to_string()
    }

    /// End formatted for the query string.
    pub fn end_param(&self) -> String {
        self.end.format(QUERY_FORMAT).to_string()
    }

    /// Re-check the ordering invariant.
    pub fn validate(&self) -> Result<()> {
        Self::new(self.start, self.end).map(|_| ())
    }
}
