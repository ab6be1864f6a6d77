//! Pagination strategy implementations
//!
//! Each strategy handles a specific continuation pattern. None of them ever
//! advance on anything but a successfully parsed page.

use super::types::{extract_jsonpath, NextPage, PaginationState, Paginator};
use reqwest::header::HeaderMap;
use serde_json::Value;

// ============================================================================
// Link Header Pagination
// ============================================================================

/// Link header pagination (RFC 5988)
///
/// Extracts next page URL from the Link header. This is what the Webex
/// listing endpoints use.
/// Format: `Link: <https://webexapis.com/v1/...&cursor=abc>; rel="next"`
#[derive(Debug, Clone)]
pub struct LinkHeaderPaginator {
    /// Rel value to follow (default: "next")
    pub rel: String,
}

impl Default for LinkHeaderPaginator {
    fn default() -> Self {
        Self {
            rel: "next".to_string(),
        }
    }
}

impl LinkHeaderPaginator {
    pub fn new(rel: impl Into<String>) -> Self {
        Self { rel: rel.into() }
    }
}

impl Paginator for LinkHeaderPaginator {
    fn process_response(
        &self,
        _body: &Value,
        headers: &HeaderMap,
        _records_count: usize,
        _state: &mut PaginationState,
    ) -> NextPage {
        // servers may send several Link headers
        let next = headers
            .get_all(reqwest::header::LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|link| parse_link_header(link, &self.rel));

        match next {
            Some(url) => NextPage::with_url(url),
            None => NextPage::Done,
        }
    }
}

/// Parse a Link header and extract the URL for the given rel
pub fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    // Link header format: <url>; rel="next", <url>; rel="prev"
    for part in header.split(',') {
        let part = part.trim();
        let mut url = None;
        let mut rels: Vec<&str> = Vec::new();

        for segment in part.split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(stripped) = segment.strip_prefix("rel=") {
                let rel_value = stripped.trim_matches('"').trim_matches('\'');
                rels.extend(rel_value.split_whitespace());
            }
        }

        if let Some(u) = url {
            if rels.iter().any(|r| r.eq_ignore_ascii_case(target_rel)) && !u.trim().is_empty() {
                return Some(u.trim().to_string());
            }
        }
    }

    None
}

// ============================================================================
// Next URL Pagination
// ============================================================================

/// Next URL pagination (URL in response body)
///
/// Common patterns:
/// - `{ "next": "https://api.example.com/items?page=2" }`
/// - `{ "links": { "next": "..." } }`
#[derive(Debug, Clone)]
pub struct NextUrlPaginator {
    /// Path to the next URL in the response
    pub path: String,
}

impl NextUrlPaginator {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Paginator for NextUrlPaginator {
    fn process_response(
        &self,
        body: &Value,
        _headers: &HeaderMap,
        _records_count: usize,
        _state: &mut PaginationState,
    ) -> NextPage {
        match extract_jsonpath(body, &self.path) {
            Some(next_url) if !next_url.is_empty() => NextPage::with_url(next_url),
            _ => NextPage::Done,
        }
    }
}

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Cursor-based pagination
///
/// Reads an opaque token from the response body and sends it back as a
/// query parameter, e.g. `?cursor=abc123`. A missing, null or empty token
/// ends the listing.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Query parameter name for cursor
    pub cursor_param: String,
    /// Path to the cursor in the response
    pub cursor_path: String,
}

impl CursorPaginator {
    pub fn new(cursor_param: impl Into<String>, cursor_path: impl Into<String>) -> Self {
        Self {
            cursor_param: cursor_param.into(),
            cursor_path: cursor_path.into(),
        }
    }
}

impl Paginator for CursorPaginator {
    fn process_response(
        &self,
        body: &Value,
        _headers: &HeaderMap,
        _records_count: usize,
        _state: &mut PaginationState,
    ) -> NextPage {
        match extract_jsonpath(body, &self.cursor_path) {
            Some(cursor) if !cursor.is_empty() => NextPage::with_param(&self.cursor_param, cursor),
            _ => NextPage::Done,
        }
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset-based pagination
///
/// Sends `?offset=N` alongside the page size. A page shorter than the page
/// size is the last one.
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    /// Query parameter name for offset
    pub offset_param: String,
    /// Records requested per page
    pub page_size: usize,
}

impl OffsetPaginator {
    pub fn new(offset_param: impl Into<String>, page_size: usize) -> Self {
        Self {
            offset_param: offset_param.into(),
            page_size,
        }
    }
}

impl Paginator for OffsetPaginator {
    fn initial_params(&self) -> Vec<(String, String)> {
        vec![(self.offset_param.clone(), "0".to_string())]
    }

    fn process_response(
        &self,
        _body: &Value,
        _headers: &HeaderMap,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage {
        if records_count == 0 || records_count < self.page_size {
            return NextPage::Done;
        }

        state.add_offset(records_count as u64);
        NextPage::with_param(&self.offset_param, state.offset.to_string())
    }
}
