//! In-memory string tables: CSV load/store, cell coercion and output schema.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

const TIMESTAMP_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const NAIVE_TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("required column '{column}' is missing; available columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
    #[error("row {row}: cannot parse '{value}' in column '{column}' as a timestamp")]
    InvalidTimestamp {
        row: usize,
        column: String,
        value: String,
    },
    #[error("column '{column}' has {found} values, table has {expected} rows")]
    ColumnLength {
        column: String,
        found: usize,
        expected: usize,
    },
    #[error("invalid output path: {0}")]
    InvalidOutputPath(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub columns: Vec<String>,
    pub fingerprint: String,
}

/// Header row plus string cells, one `Vec<String>` per record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn read_path(path: &Path) -> Result<Self, TableError> {
        let file = fs::File::open(path)?;
        let table = Self::from_reader(file)?;
        info!(
            component = "table",
            event = "table.load",
            path = %path.display(),
            rows = table.len(),
            columns = table.headers.len()
        );
        Ok(table)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, TableError> {
        self.column_index(name)
            .ok_or_else(|| TableError::MissingColumn {
                column: name.to_string(),
                available: self.headers.clone(),
            })
    }

    /// Cell text by row and column index; short records read as empty cells.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|record| record.get(column))
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn column_values(&self, name: &str) -> Result<Vec<&str>, TableError> {
        let idx = self.require_column(name)?;
        Ok((0..self.len()).map(|row| self.cell(row, idx)).collect())
    }

    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<String>,
    ) -> Result<(), TableError> {
        let name = name.into();
        if values.len() != self.rows.len() {
            return Err(TableError::ColumnLength {
                column: name,
                found: values.len(),
                expected: self.rows.len(),
            });
        }
        self.headers.push(name);
        for (record, value) in self.rows.iter_mut().zip(values) {
            record.push(value);
        }
        Ok(())
    }

    /// New table with the named columns, in the given order.
    pub fn select(&self, columns: &[&str]) -> Result<Self, TableError> {
        let indices = columns
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>, _>>()?;

        let rows = (0..self.len())
            .map(|row| {
                indices
                    .iter()
                    .map(|&idx| self.cell(row, idx).to_string())
                    .collect()
            })
            .collect();

        Ok(Self {
            headers: columns.iter().map(|name| (*name).to_string()).collect(),
            rows,
        })
    }

    pub fn output_schema(&self) -> OutputSchema {
        OutputSchema {
            columns: self.headers.clone(),
            fingerprint: schema_fingerprint(&self.headers),
        }
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), TableError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for record in &self.rows {
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes to a temporary sibling file first so a failed run never leaves partial output.
    pub fn write_path_atomic(&self, path: &Path) -> Result<(), TableError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| TableError::InvalidOutputPath(path.to_path_buf()))?;
        let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

        {
            let mut file = fs::File::create(&tmp_path)?;
            self.to_writer(&mut file)?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, path)?;
        debug!(
            component = "table",
            event = "table.write",
            path = %path.display(),
            rows = self.len()
        );
        Ok(())
    }
}

/// Numeric view of a cell: empty, unparseable and non-finite text is missing.
pub fn coerce_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// True when a non-empty cell was lost by [`coerce_numeric`].
pub fn is_coercion_failure(raw: &str) -> bool {
    !raw.trim().is_empty() && coerce_numeric(raw).is_none()
}

/// Parses ISO-8601-ish timestamps. Offsets are normalized to UTC; bare dates read as midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.naive_utc());
    }
    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parses every cell of `column`, failing on the first bad timestamp.
pub fn parse_timestamp_column(
    table: &CsvTable,
    column: &str,
) -> Result<Vec<NaiveDateTime>, TableError> {
    let idx = table.require_column(column)?;
    (0..table.len())
        .map(|row| {
            let raw = table.cell(row, idx);
            parse_timestamp(raw).ok_or_else(|| TableError::InvalidTimestamp {
                row,
                column: column.to_string(),
                value: raw.to_string(),
            })
        })
        .collect()
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_OUTPUT_FORMAT).to_string()
}

/// Shortest round-trip form (`20.0`, `20.666666666666668`); missing is an empty cell.
pub fn format_float(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:?}"),
        None => String::new(),
    }
}

pub fn format_bool(value: bool) -> String {
    let text = if value { "True" } else { "False" };
    text.to_string()
}

pub fn schema_fingerprint(columns: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("columns:{};", columns.len()));
    for column in columns {
        hasher.update(column.as_bytes());
        hasher.update(b";");
    }
    hex::encode(hasher.finalize())
}
