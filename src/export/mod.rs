//! Interchange-format export of a record collection.
//!
//! [`export`] renders a [`ResultSet`] as a downloadable payload: raw bytes
//! plus the MIME type and file extension a caller needs to offer it as a file.

mod csv_writer;
mod ris;
mod xlsx;

use std::fmt;
use std::str::FromStr;

use crate::models::{Record, ResultSet};

pub use csv_writer::to_csv;
pub use ris::to_ris;
pub use xlsx::to_xlsx;

/// Column headers shared by the tabular formats
pub const COLUMNS: [&str; 12] = [
    "title",
    "authors",
    "journal",
    "year",
    "doi",
    "pmid",
    "pmcid",
    "open_access",
    "source_url",
    "pdf_url",
    "abstract",
    "source",
];

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Ris,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Csv, ExportFormat::Xlsx, ExportFormat::Ris];

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ExportFormat::Ris => "application/x-research-info-systems",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Ris => "ris",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            "ris" => Ok(ExportFormat::Ris),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Rendered export, ready to be offered as a download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub extension: &'static str,
}

impl ExportPayload {
    /// Suggested file name for a download
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.extension)
    }
}

/// Errors raised while rendering an export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown export format: {0}")]
    UnknownFormat(String),
}

/// Render `records` in `format`
pub fn export(records: &ResultSet, format: ExportFormat) -> Result<ExportPayload, ExportError> {
    let bytes = match format {
        ExportFormat::Csv => to_csv(records)?,
        ExportFormat::Xlsx => to_xlsx(records)?,
        ExportFormat::Ris => to_ris(records).into_bytes(),
    };

    tracing::debug!(format = %format, records = records.len(), bytes = bytes.len(), "export rendered");

    Ok(ExportPayload {
        bytes,
        mime_type: format.mime_type(),
        extension: format.extension(),
    })
}

/// One table row in [`COLUMNS`] order
pub(crate) fn row(record: &Record) -> [String; 12] {
    let text = |field: &Option<String>| field.clone().unwrap_or_default();
    let open_access = match record.open_access.as_bool() {
        Some(true) => "true".to_string(),
        Some(false) => "false".to_string(),
        None => String::new(),
    };

    [
        text(&record.title),
        record.authors_joined(),
        text(&record.journal),
        text(&record.year),
        text(&record.doi),
        text(&record.pmid),
        text(&record.pmcid),
        open_access,
        text(&record.source_url),
        text(&record.pdf_url),
        text(&record.abstract_text),
        record.source.map(|s| s.id().to_string()).unwrap_or_default(),
    ]
}
