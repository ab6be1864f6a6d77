//! CSV file writer

use super::columns::columns;
use crate::engine::ExportResult;
use crate::error::{Error, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Header used when no record has any field and nothing is pinned
pub const IDENTITY_COLUMN: &str = "id";

/// Options for the CSV exporter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Columns placed first, in this order
    pub pinned_columns: Vec<String>,
    /// Field delimiter
    pub delimiter: Option<u8>,
}

impl ExportOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the leading columns
    #[must_use]
    pub fn with_pinned_columns(mut self, columns: Vec<String>) -> Self {
        self.pinned_columns = columns;
        self
    }

    /// Set the field delimiter
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }
}

/// Writes export results as CSV
#[derive(Debug, Clone, Default)]
pub struct CsvExporter {
    options: ExportOptions,
}

impl CsvExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ExportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Write `result` to `path`, replacing any existing file.
    ///
    /// The file only appears at `path` once it has been written completely;
    /// on error an existing file is left untouched. Returns the number of
    /// records written.
    pub fn export(&self, result: &ExportResult, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        if path.is_dir() {
            return Err(Error::output(format!(
                "{} is a directory, not a file path",
                path.display()
            )));
        }
        let mut header = columns(result.records(), &self.options.pinned_columns);
        // always at least one column, so every record gets a line
        if header.is_empty() {
            header.push(IDENTITY_COLUMN.to_string());
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        debug!(tmp = %tmp.path().display(), "Writing CSV to temporary file");

        let rows = self.write_rows(result, &header, tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        info!(
            path = %path.display(),
            rows,
            columns = header.len(),
            "Wrote {rows} records to {}",
            path.display()
        );
        Ok(rows)
    }

    fn write_rows<W: Write>(
        &self,
        result: &ExportResult,
        header: &[String],
        out: W,
    ) -> Result<usize> {
        let mut builder = csv::WriterBuilder::new();
        if let Some(delimiter) = self.options.delimiter {
            builder.delimiter(delimiter);
        }
        let mut wtr = builder.from_writer(out);

        wtr.write_record(header)?;
        let mut rows = 0;
        for record in result.records() {
            wtr.write_record(header.iter().map(|column| record.cell(column)))?;
            rows += 1;
        }
        wtr.flush()?;
        Ok(rows)
    }
}

/// Write `result` to `path` with default options.
pub fn export(result: &ExportResult, path: impl AsRef<Path>) -> Result<usize> {
    CsvExporter::new().export(result, path)
}
