//! Header-keyed flat rows: the untyped layer every source file goes through.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::SourceError;

/// Lower-cased header name -> trimmed cell value.
pub type FlatRecord = BTreeMap<String, String>;

/// A decoded CSV file: normalized header names plus one map per data row.
#[derive(Debug, Clone, Default)]
pub struct FlatTable {
    pub headers: Vec<String>,
    pub rows: Vec<FlatRecord>,
    /// 1-based source line of each entry in `rows`.
    pub lines: Vec<usize>,
}

impl FlatTable {
    /// Rows paired with the source line they started on.
    pub fn numbered_rows(&self) -> impl Iterator<Item = (usize, &FlatRecord)> {
        self.lines.iter().copied().zip(self.rows.iter())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Fail on the first column in `required` the header does not carry.
    pub fn require(&self, required: &[&str]) -> Result<(), SourceError> {
        for col in required {
            if !self.has_column(col) {
                return Err(SourceError::MissingHeader((*col).to_string()));
            }
        }
        Ok(())
    }
}

/// Decode CSV text with a header row.
///
/// Short rows are padded with nothing (missing trailing cells simply have no
/// entry); rows whose cells are all blank are skipped. An empty input yields an
/// empty table.
pub fn read_flat_records<R: Read>(rdr: R) -> Result<FlatTable, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(rdr);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();

    let mut rows = Vec::new();
    let mut lines = Vec::new();
    for rec in reader.records() {
        let rec = rec?;
        if rec.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let line = rec.position().map_or(rows.len() + 2, |p| p.line() as usize);

        let mut row = FlatRecord::new();
        for (name, cell) in headers.iter().zip(rec.iter()) {
            if name.is_empty() {
                continue;
            }
            row.insert(name.clone(), cell.to_string());
        }
        rows.push(row);
        lines.push(line);
    }

    Ok(FlatTable {
        headers,
        rows,
        lines,
    })
}

pub fn read_flat_records_from_path(path: &Path) -> Result<FlatTable, SourceError> {
    let file = File::open(path)
        .map_err(|e| SourceError::Io(format!("open '{}': {e}", path.display())))?;
    read_flat_records(file)
}

fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_ascii_lowercase()
}
