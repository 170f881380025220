use std::fs;
use std::path::Path;

use crate::domain::TableFormat;
use crate::error::NeidError;

/// A result table read back from disk, as written by a query call. Rows and
/// values are kept as trimmed strings; the download manager only ever needs
/// the file name/path columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn read(path: &Path, format: TableFormat) -> Result<Self, NeidError> {
        let content = fs::read_to_string(path).map_err(|err| {
            NeidError::Table(format!("read {}: {err}", path.display()))
        })?;
        Self::parse(&content, format)
    }

    pub fn parse(content: &str, format: TableFormat) -> Result<Self, NeidError> {
        match format {
            TableFormat::Ipac => parse_ipac(content),
            TableFormat::Csv | TableFormat::Tsv => {
                parse_delimited(content, format.delimiter().unwrap())
            }
            TableFormat::Votable => Err(NeidError::Table(
                "votable tables cannot be read back; request ipac, csv, or tsv".to_string(),
            )),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive column lookup; the archive is not consistent about
    /// column-name casing across data levels.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
    }

    pub fn value(&self, row: usize, column: usize) -> &str {
        &self.rows[row][column]
    }
}

fn parse_delimited(content: &str, delimiter: u8) -> Result<ResultTable, NeidError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let columns = reader
        .headers()
        .map_err(|err| NeidError::Table(err.to_string()))?
        .iter()
        .map(|name| name.trim().to_string())
        .collect::<Vec<_>>();
    if columns.is_empty() {
        return Err(NeidError::Table("table has no columns".to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| NeidError::Table(err.to_string()))?;
        let mut row = record
            .iter()
            .map(|value| value.trim().to_string())
            .collect::<Vec<_>>();
        row.resize(columns.len(), String::new());
        rows.push(row);
    }
    Ok(ResultTable { columns, rows })
}

/// IPAC fixed-width format: `\`-prefixed keyword lines, then pipe-delimited
/// header lines (names, types, units, nulls), then data rows aligned to the
/// pipe positions of the header.
fn parse_ipac(content: &str) -> Result<ResultTable, NeidError> {
    let mut boundaries: Vec<usize> = Vec::new();
    let mut columns: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for line in content.lines() {
        if line.starts_with('\\') {
            continue;
        }
        if line.starts_with('|') {
            if columns.is_empty() {
                boundaries = line
                    .bytes()
                    .enumerate()
                    .filter(|(_, byte)| *byte == b'|')
                    .map(|(index, _)| index)
                    .collect();
                columns = slice_fields(line, &boundaries);
            }
            // subsequent header lines carry types/units/nulls
            continue;
        }
        if columns.is_empty() {
            if line.trim().is_empty() {
                continue;
            }
            return Err(NeidError::Table(
                "data row before the column header line".to_string(),
            ));
        }
        if line.trim().is_empty() {
            continue;
        }
        rows.push(slice_fields(line, &boundaries));
    }

    if columns.is_empty() {
        return Err(NeidError::Table("no column header line found".to_string()));
    }
    Ok(ResultTable { columns, rows })
}

fn slice_fields(line: &str, boundaries: &[usize]) -> Vec<String> {
    let bytes = line.as_bytes();
    boundaries
        .windows(2)
        .map(|pair| {
            let start = (pair[0] + 1).min(bytes.len());
            let end = pair[1].min(bytes.len());
            String::from_utf8_lossy(&bytes[start..end]).trim().to_string()
        })
        .collect()
}
