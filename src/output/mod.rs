//! Output module
//!
//! Turns an [`ExportResult`](crate::engine::ExportResult) into a CSV file.
//!
//! # Overview
//!
//! - [`columns`] derives the header: pinned columns, then every other key in
//!   the order it was first seen
//! - [`CsvExporter`] writes the header and one row per record to a temporary
//!   file next to the destination and renames it into place; with no
//!   columns at all the header falls back to [`IDENTITY_COLUMN`]

mod columns;
mod writer;

pub use columns::columns;
pub use writer::{export, CsvExporter, ExportOptions, IDENTITY_COLUMN};
