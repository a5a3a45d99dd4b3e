//! Excel rendering as a minimal Office Open XML package.
//!
//! The workbook holds a single `Results` sheet. Text is written as inline
//! strings, so no shared-string table or styles part is needed.

use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{row, ExportError, COLUMNS};
use crate::models::ResultSet;

pub const SHEET_NAME: &str = "Results";

/// Excel refuses cells longer than this
const MAX_CELL_CHARS: usize = 32_767;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

fn workbook_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        SHEET_NAME
    )
}

/// Spreadsheet column letters for a zero-based index (`0` -> `A`, `26` -> `AA`)
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Drop characters XML 1.0 cannot carry and cap the length Excel accepts
fn cell_text(value: &str) -> String {
    value
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c >= ' ')
        .take(MAX_CELL_CHARS)
        .collect()
}

fn push_cell(xml: &mut String, reference: &str, value: &str, numeric: bool) {
    if value.is_empty() {
        return;
    }
    if numeric && value.len() <= 9 && value.bytes().all(|b| b.is_ascii_digit()) {
        xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, value));
    } else {
        xml.push_str(&format!(
            r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
            reference,
            escape(cell_text(value).as_str())
        ));
    }
}

fn sheet_xml(records: &ResultSet) -> String {
    let columns: Vec<String> = (0..COLUMNS.len()).map(column_name).collect();
    let year_column = COLUMNS.iter().position(|c| *c == "year");

    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    xml.push_str(r#"<row r="1">"#);
    for (col, header) in columns.iter().zip(COLUMNS) {
        push_cell(&mut xml, &format!("{}1", col), header, false);
    }
    xml.push_str("</row>");

    for (idx, record) in records.iter().enumerate() {
        let line = idx + 2;
        xml.push_str(&format!(r#"<row r="{}">"#, line));
        for (pos, (col, value)) in columns.iter().zip(row(record)).enumerate() {
            push_cell(&mut xml, &format!("{}{}", col, line), &value, Some(pos) == year_column);
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Render records as an `.xlsx` workbook
pub fn to_xlsx(records: &ResultSet) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("_rels/.rels", ROOT_RELS.to_string()),
            ("xl/workbook.xml", workbook_xml()),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
            ("xl/worksheets/sheet1.xml", sheet_xml(records)),
        ];

        for (name, body) in parts {
            zip.start_file(name, options)?;
            zip.write_all(body.as_bytes())?;
        }
        zip.finish()?;
    }
    Ok(buf)
}
