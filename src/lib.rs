// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # recordings-export
//!
//! Export every converged call recording from the last 30 days to a CSV
//! file.
//!
//! The listing endpoint is paginated and rate limited. The fetch engine
//! follows continuation links page by page, waits out 429 responses and
//! re-sends the identical request, and only hands back a result once the
//! listing is complete. The exporter then writes one row per record.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use recordings_export::{
//!     export, Credential, FetchEngine, HttpClient, HttpClientConfig, LinkHeaderPaginator,
//!     FetchConfig, TimeWindow,
//! };
//!
//! let client = HttpClient::with_config(
//!     HttpClientConfig::builder()
//!         .base_url("https://webexapis.com/v1")
//!         .build(),
//! )?;
//! let engine = FetchEngine::new(
//!     client,
//!     Box::new(LinkHeaderPaginator::default()),
//!     FetchConfig::default(),
//! );
//!
//! let credential = Credential::new(token)?;
//! let result = engine.fetch_all(&credential, &TimeWindow::trailing()).await?;
//! let count = export(&result, "converged_recordings.csv")?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────────────────────────────┐   ┌──────────┐
//! │Credential│──▶│ FetchEngine                         │──▶│ Exporter │
//! └──────────┘   │  HttpClient (429 wait, retry, pace) │   │  CSV     │
//!                │  Paginator  (link, cursor, offset)  │   └──────────┘
//!                │  Decoder    (items → Record)        │
//!                └─────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Record model and shared types
pub mod types;

/// Query time window
pub mod window;

/// Access token sources
pub mod credential;

/// HTTP client with throttle handling, retry and pacing
pub mod http;

/// Pagination strategies
pub mod pagination;

/// Response decoding
pub mod decode;

/// Page loop
pub mod engine;

/// CSV output
pub mod output;

/// YAML configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::ExportConfig;
pub use credential::{Credential, CredentialProvider};
pub use engine::{Event, EventSink, ExportResult, FetchConfig, FetchEngine, FetchStats};
pub use http::{HttpClient, HttpClientConfig};
pub use output::{export, CsvExporter, ExportOptions};
pub use pagination::{LinkHeaderPaginator, Paginator};
pub use window::TimeWindow;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
