//! Fetch engine module
//!
//! The page loop: request, decode, accumulate, ask the pagination strategy
//! for the next request, repeat until the listing is exhausted.
//!
//! # Overview
//!
//! - `FetchEngine` - drives one complete listing run
//! - `FetchConfig` - endpoint, page size and window parameter names
//! - `Event` / `EventSink` - progress notifications
//! - `ExportResult` - every record plus `FetchStats`
//!
//! Pages are fetched strictly one after another: the request for page N+1
//! is only known once page N has been decoded.

mod types;

pub use types::{
    Event, EventSink, ExportResult, FetchConfig, FetchStats, LogSink, MemorySink, MAX_PAGE_SIZE,
};

use crate::credential::Credential;
use crate::decode::{JsonDecoder, RecordDecoder};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig, RetryNotice};
use crate::pagination::{NextPage, PaginationState, Paginator};
use crate::window::TimeWindow;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// One page request: a URL plus its ordered query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
struct PageRequest {
    url: String,
    query: Vec<(String, String)>,
}

impl PageRequest {
    /// Identity of the request, used to detect pagination loops
    fn key(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .finish();
        format!("{}?{query}", self.url)
    }
}

/// Drives a complete listing run
pub struct FetchEngine {
    client: HttpClient,
    paginator: Box<dyn Paginator>,
    decoder: Box<dyn RecordDecoder>,
    config: FetchConfig,
    sink: Arc<dyn EventSink>,
}

impl FetchEngine {
    /// Create an engine decoding `items` arrays and logging progress
    pub fn new(client: HttpClient, paginator: Box<dyn Paginator>, config: FetchConfig) -> Self {
        Self {
            client,
            paginator,
            decoder: Box::new(JsonDecoder::default()),
            config,
            sink: Arc::new(LogSink),
        }
    }

    /// Set the record decoder
    #[must_use]
    pub fn with_decoder(mut self, decoder: Box<dyn RecordDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Set where progress events go
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch every record in `window`.
    ///
    /// Returns the records in page order, then in-page order. Fails with
    /// [`Error::Auth`] on 401/403 and with [`Error::Transport`] naming the
    /// page when a request cannot be completed; nothing is returned for a
    /// partial listing.
    pub async fn fetch_all(
        &self,
        credential: &Credential,
        window: &TimeWindow,
    ) -> Result<ExportResult> {
        window.validate()?;
        if self.config.page_size == 0 {
            return Err(Error::invalid_value("page_size", "must be at least 1"));
        }

        let start = Instant::now();
        let base_query = self.base_query(window);
        // absolute, so it compares equal to a continuation URL naming the same page
        let endpoint_url = self.client.build_url(&self.config.endpoint);
        let mut request = PageRequest {
            url: endpoint_url.clone(),
            query: merge_query(base_query.clone(), self.paginator.initial_params()),
        };

        let mut state = PaginationState::new();
        let mut records = Vec::new();
        let mut seen_requests = HashSet::new();
        let mut seen_ids = HashSet::new();
        let mut stats = FetchStats::default();
        let throttled = AtomicUsize::new(0);
        let retried = AtomicUsize::new(0);
        let mut page = 0usize;

        loop {
            page += 1;

            if !seen_requests.insert(request.key()) {
                return Err(Error::pagination(format!(
                    "continuation repeats an earlier request ({})",
                    request.key()
                ))
                .at_page(page));
            }

            let req_config = RequestConfig {
                query: request.query.clone(),
                bearer: Some(credential.token().to_string()),
                ..RequestConfig::default()
            };

            let sink = &self.sink;
            let notify = |notice: &RetryNotice| match notice {
                RetryNotice::Throttled { attempt, wait, .. } => {
                    throttled.fetch_add(1, Ordering::Relaxed);
                    sink.emit(&Event::Throttled {
                        page,
                        attempt: *attempt,
                        wait: *wait,
                    });
                }
                RetryNotice::Retrying {
                    attempt,
                    delay,
                    reason,
                } => {
                    retried.fetch_add(1, Ordering::Relaxed);
                    sink.emit(&Event::Retrying {
                        page,
                        attempt: *attempt,
                        delay: *delay,
                        reason: reason.clone(),
                    });
                }
            };

            let response = self
                .client
                .fetch(&request.url, &req_config, &notify)
                .await
                .map_err(|e| e.at_page(page))?;

            let body = response.json().map_err(|e| e.at_page(page))?;
            let page_records = self.decoder.decode(&body).map_err(|e| e.at_page(page))?;
            let count = page_records.len();

            for record in &page_records {
                if let Some(id) = record.id() {
                    if !seen_ids.insert(id.clone()) {
                        stats.duplicate_ids += 1;
                        warn!(page, id = %id, "Record id already seen on an earlier page");
                    }
                }
            }

            records.extend(page_records);
            stats.pages += 1;
            self.sink.emit(&Event::Page {
                page,
                records: count,
                total: records.len(),
            });

            let next =
                self.paginator
                    .process_response(&body, &response.headers, count, &mut state);

            match next {
                NextPage::Done => break,
                NextPage::Continue { query_params, url } => {
                    request = match url {
                        Some(next_url) => PageRequest {
                            url: resolve_url(&response.url, &next_url)
                                .map_err(|e| e.at_page(page))?,
                            query: Vec::new(),
                        },
                        None => PageRequest {
                            url: endpoint_url.clone(),
                            query: merge_query(base_query.clone(), query_params),
                        },
                    };
                    debug!(next = %request.key(), "Continuing to next page");
                }
            }
        }

        stats.records = records.len();
        stats.throttled = throttled.into_inner();
        stats.retried = retried.into_inner();
        stats.duration_ms = start.elapsed().as_millis() as u64;

        self.sink.emit(&Event::Finished {
            pages: stats.pages,
            total: stats.records,
        });

        Ok(ExportResult::new(records, stats))
    }

    /// Window, page size and fixed parameters; constant across pages
    fn base_query(&self, window: &TimeWindow) -> Vec<(String, String)> {
        let mut query = vec![
            (self.config.from_param.clone(), window.start_param()),
            (self.config.to_param.clone(), window.end_param()),
            (
                self.config.page_size_param.clone(),
                self.config.page_size.to_string(),
            ),
        ];
        query.extend(self.config.extra_query.iter().cloned());
        query
    }
}

/// Replace parameters already present, append the rest, keeping order.
fn merge_query(
    mut base: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
) -> Vec<(String, String)> {
    for (key, value) in overrides {
        match base.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => base.push((key, value)),
        }
    }
    base
}

/// Resolve a continuation URL against the URL of the page that produced it.
fn resolve_url(current: &str, next: &str) -> Result<String> {
    let base = Url::parse(current)?;
    Ok(base.join(next)?.to_string())
}

#[cfg(test)]
mod tests;
