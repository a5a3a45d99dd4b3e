//! CSV rendering.

use super::{row, ExportError, COLUMNS};
use crate::models::ResultSet;

/// Render records as UTF-8 CSV with a header row and no index column
pub fn to_csv(records: &ResultSet) -> Result<Vec<u8>, ExportError> {
    let mut wtr = ::csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    wtr.write_record(COLUMNS)?;
    for record in records {
        wtr.write_record(row(record))?;
    }

    wtr.flush()?;
    wtr.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}
