//! CSV table I/O for category databases.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;

use super::error::{LibraryError, Result};

/// Column holding the canonical row identifier.
pub const IPN_COLUMN: &str = "IPN";

/// One CSV record keyed by header.
pub type Row = BTreeMap<String, String>;

/// Rows keyed by IPN.
pub type RowMap = BTreeMap<String, Row>;

/// A category table as read from disk or from a git blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Index rows by IPN. Rows without an IPN are skipped; on duplicates the
    /// first row wins.
    pub fn by_ipn(&self) -> RowMap {
        let mut map = RowMap::new();
        for row in &self.rows {
            let ipn = row_ipn(row);
            if ipn.is_empty() {
                continue;
            }
            map.entry(ipn.to_string()).or_insert_with(|| row.clone());
        }
        map
    }
}

/// Trimmed IPN of a row, empty when the column is missing.
pub fn row_ipn(row: &Row) -> &str {
    row.get(IPN_COLUMN).map(|v| v.trim()).unwrap_or("")
}

/// Parse CSV text with a header line.
///
/// Short records are padded with empty values so every row carries every header.
pub fn parse_table(text: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(LibraryError::Csv)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(LibraryError::Csv)?;
        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }

    Ok(Table { headers, rows })
}

/// Load a CSV table from disk.
pub fn load_table(path: &Path) -> Result<Table> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_table(&text)
}

/// Write a CSV table, replacing the file atomically.
pub fn save_table(path: &Path, headers: &[String], rows: &[Row]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| LibraryError::InvalidPath(path.to_path_buf()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
        writer.write_record(headers).map_err(LibraryError::Csv)?;
        for row in rows {
            writer
                .write_record(headers.iter().map(|h| row.get(h).map(String::as_str).unwrap_or("")))
                .map_err(LibraryError::Csv)?;
        }
        writer.flush()?;
    }
    tmp.persist(path)
        .map_err(|e| LibraryError::Io(e.error))?;
    Ok(())
}
