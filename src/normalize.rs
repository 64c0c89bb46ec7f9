//! Grouped drift removal and z-score normalization.
//!
//! Readings are sorted by timestamp (stable), split by group key, and each
//! group is processed on its own: forward fill with a group-median fallback,
//! a trailing rolling mean as the drift estimate, detrending, then a
//! population z-score of the detrended signal. Groups are merged back on
//! `(timestamp, source_row)`, so output rows are in timestamp order.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::impute::{impute, ImputeReport, FORWARD_THEN_MEDIAN};
use crate::stats::{max_abs, rolling_mean, standardize_with_scale};
use crate::table::{
    coerce_numeric, format_float, format_timestamp, is_coercion_failure, parse_timestamp_column,
    CsvTable, TableError,
};

pub const DEFAULT_ROLL_WINDOW: usize = 6;

pub const RAW_SUFFIX: &str = "_raw";
pub const ROLL_MEAN_SUFFIX: &str = "_roll_mean";
pub const DETRENDED_SUFFIX: &str = "_detrended";
pub const Z_SUFFIX: &str = "_z";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    pub timestamp_column: String,
    pub group_key: String,
    pub value_columns: Vec<String>,
    pub window_size: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            timestamp_column: "timestamp".to_string(),
            group_key: "sensor_id".to_string(),
            value_columns: vec!["temperature".to_string(), "humidity".to_string()],
            window_size: DEFAULT_ROLL_WINDOW,
        }
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("invalid normalize config: {0}")]
    InvalidConfig(String),
    #[error("reading from row {source_row} has {found} values, expected {expected}")]
    ValueArity {
        source_row: usize,
        found: usize,
        expected: usize,
    },
    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub source_row: usize,
    pub timestamp: NaiveDateTime,
    pub group_id: String,
    pub values: Vec<Option<f64>>,
}

/// Derived values for one value column of one row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnOutcome {
    pub raw: Option<f64>,
    pub imputed: Option<f64>,
    pub rolling_mean: Option<f64>,
    pub detrended: Option<f64>,
    pub z_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub source_row: usize,
    pub timestamp: NaiveDateTime,
    pub group_id: String,
    pub columns: Vec<ColumnOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegenerateGroup {
    pub group_id: String,
    pub column: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub input_rows: u64,
    pub output_rows: u64,
    pub groups: u64,
    pub coerced_cells: u64,
    pub forward_filled: u64,
    pub median_filled: u64,
    pub unimputable_cells: u64,
    pub degenerate_groups: Vec<DegenerateGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub timestamp_column: String,
    pub value_columns: Vec<String>,
    pub rows: Vec<NormalizedRow>,
    pub report: NormalizeReport,
}

impl NormalizedTable {
    /// Column names appended by [`NormalizedTable::to_table`], in order.
    pub fn derived_headers(&self) -> Vec<String> {
        let mut headers = Vec::with_capacity(self.value_columns.len() * 4);
        for suffix in [RAW_SUFFIX, ROLL_MEAN_SUFFIX, DETRENDED_SUFFIX, Z_SUFFIX] {
            for column in &self.value_columns {
                headers.push(format!("{column}{suffix}"));
            }
        }
        headers
    }

    /// Joins the normalized rows back onto their source records.
    ///
    /// Value columns carry the imputed value and the timestamp column is
    /// rendered canonically; every other source column passes through.
    pub fn to_table(&self, source: &CsvTable) -> Result<CsvTable, TableError> {
        let timestamp_idx = source.require_column(&self.timestamp_column)?;
        let value_idx = self
            .value_columns
            .iter()
            .map(|column| source.require_column(column))
            .collect::<Result<Vec<_>, _>>()?;

        let mut headers = source.headers().to_vec();
        headers.extend(self.derived_headers());

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut fields: Vec<String> = (0..source.headers().len())
                    .map(|idx| source.cell(row.source_row, idx).to_string())
                    .collect();
                fields[timestamp_idx] = format_timestamp(&row.timestamp);
                for (outcome, &idx) in row.columns.iter().zip(&value_idx) {
                    fields[idx] = format_float(outcome.imputed);
                }
                fields.extend(row.columns.iter().map(|c| format_float(c.raw)));
                fields.extend(row.columns.iter().map(|c| format_float(c.rolling_mean)));
                fields.extend(row.columns.iter().map(|c| format_float(c.detrended)));
                fields.extend(row.columns.iter().map(|c| format_float(Some(c.z_score))));
                fields
            })
            .collect();

        Ok(CsvTable::new(headers, rows))
    }
}

/// Normalizes every value column of `table` per group.
///
/// Fails before any computation when a configured column is absent. An empty
/// table yields an empty result.
pub fn normalize(
    table: &CsvTable,
    config: &NormalizeConfig,
) -> Result<NormalizedTable, NormalizeError> {
    validate_config(config)?;

    let group_idx = table.require_column(&config.group_key)?;
    let value_idx = config
        .value_columns
        .iter()
        .map(|column| table.require_column(column))
        .collect::<Result<Vec<_>, _>>()?;
    let timestamps = parse_timestamp_column(table, &config.timestamp_column)?;

    info!(
        component = "normalize",
        event = "normalize.start",
        rows = table.len(),
        group_key = %config.group_key,
        value_columns = ?config.value_columns,
        window_size = config.window_size
    );

    let mut coerced_cells = 0u64;
    for (column, &idx) in config.value_columns.iter().zip(&value_idx) {
        let failures = (0..table.len())
            .filter(|&row| is_coercion_failure(table.cell(row, idx)))
            .count();
        if failures > 0 {
            warn!(
                component = "normalize",
                event = "normalize.coercion",
                column = %column,
                cells = failures
            );
            coerced_cells += failures as u64;
        }
    }

    let readings: Vec<Reading> = timestamps
        .into_iter()
        .enumerate()
        .map(|(row, timestamp)| Reading {
            source_row: row,
            timestamp,
            group_id: table.cell(row, group_idx).to_string(),
            values: value_idx
                .iter()
                .map(|&idx| coerce_numeric(table.cell(row, idx)))
                .collect(),
        })
        .collect();

    let mut normalized = normalize_readings(&readings, config)?;
    normalized.report.coerced_cells = coerced_cells;
    Ok(normalized)
}

/// Same as [`normalize`] for already-typed readings.
pub fn normalize_readings(
    readings: &[Reading],
    config: &NormalizeConfig,
) -> Result<NormalizedTable, NormalizeError> {
    validate_config(config)?;
    let width = config.value_columns.len();
    if let Some(bad) = readings.iter().find(|r| r.values.len() != width) {
        return Err(NormalizeError::ValueArity {
            source_row: bad.source_row,
            found: bad.values.len(),
            expected: width,
        });
    }

    let mut order: Vec<&Reading> = readings.iter().collect();
    order.sort_by_key(|reading| reading.timestamp);

    let mut partitions: BTreeMap<&str, Vec<&Reading>> = BTreeMap::new();
    for reading in order {
        partitions
            .entry(reading.group_id.as_str())
            .or_default()
            .push(reading);
    }

    let mut report = NormalizeReport {
        input_rows: readings.len() as u64,
        groups: partitions.len() as u64,
        ..NormalizeReport::default()
    };

    let mut rows = Vec::with_capacity(readings.len());
    for (group_id, members) in &partitions {
        let outcome = normalize_partition(group_id, members, config);
        report.forward_filled += outcome.impute.forward_filled;
        report.median_filled += outcome.impute.median_filled;
        report.unimputable_cells += outcome.impute.still_missing;

        for column_idx in outcome.degenerate_columns {
            let column = &config.value_columns[column_idx];
            warn!(
                component = "normalize",
                event = "normalize.group.degenerate",
                group_id = %group_id,
                column = %column,
                rows = members.len()
            );
            report.degenerate_groups.push(DegenerateGroup {
                group_id: (*group_id).to_string(),
                column: column.clone(),
                rows: members.len(),
            });
        }
        if outcome.impute.still_missing > 0 {
            warn!(
                component = "normalize",
                event = "normalize.group.unimputable",
                group_id = %group_id,
                cells = outcome.impute.still_missing
            );
        }

        rows.extend(outcome.rows);
    }

    rows.sort_by_key(|row| (row.timestamp, row.source_row));
    report.output_rows = rows.len() as u64;

    info!(
        component = "normalize",
        event = "normalize.finish",
        input_rows = report.input_rows,
        output_rows = report.output_rows,
        groups = report.groups,
        forward_filled = report.forward_filled,
        median_filled = report.median_filled,
        degenerate_groups = report.degenerate_groups.len()
    );

    Ok(NormalizedTable {
        timestamp_column: config.timestamp_column.clone(),
        value_columns: config.value_columns.clone(),
        rows,
        report,
    })
}

fn validate_config(config: &NormalizeConfig) -> Result<(), NormalizeError> {
    if config.window_size == 0 {
        return Err(NormalizeError::InvalidConfig(
            "window_size must be >= 1".to_string(),
        ));
    }
    if config.value_columns.is_empty() {
        return Err(NormalizeError::InvalidConfig(
            "at least one value column is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for column in &config.value_columns {
        if !seen.insert(column.as_str()) {
            return Err(NormalizeError::InvalidConfig(format!(
                "value column '{column}' is listed twice"
            )));
        }
        if *column == config.group_key || *column == config.timestamp_column {
            return Err(NormalizeError::InvalidConfig(format!(
                "value column '{column}' is also the group key or timestamp column"
            )));
        }
    }

    Ok(())
}

struct PartitionOutcome {
    rows: Vec<NormalizedRow>,
    impute: ImputeReport,
    degenerate_columns: Vec<usize>,
}

/// Members must already be in timestamp order.
fn normalize_partition(
    group_id: &str,
    members: &[&Reading],
    config: &NormalizeConfig,
) -> PartitionOutcome {
    let width = config.value_columns.len();
    let mut columns: Vec<Vec<ColumnOutcome>> = Vec::with_capacity(width);
    let mut impute_total = ImputeReport::default();
    let mut degenerate_columns = Vec::new();

    for column_idx in 0..width {
        let raw: Vec<Option<f64>> = members.iter().map(|r| r.values[column_idx]).collect();

        let mut imputed = raw.clone();
        impute_total.merge(&impute(&mut imputed, &FORWARD_THEN_MEDIAN));

        let rolled = rolling_mean(&imputed, config.window_size);
        let detrended: Vec<Option<f64>> = imputed
            .iter()
            .zip(&rolled)
            .map(|(value, roll)| match (value, roll) {
                (Some(v), Some(r)) => Some(v - r),
                _ => None,
            })
            .collect();

        let standardized = standardize_with_scale(&detrended, max_abs(&imputed));
        if standardized.degenerate {
            degenerate_columns.push(column_idx);
        }
        debug!(
            component = "normalize",
            event = "normalize.group.stats",
            group_id = %group_id,
            column = %config.value_columns[column_idx],
            mean = ?standardized.mean,
            std = ?standardized.std
        );

        columns.push(
            (0..members.len())
                .map(|i| ColumnOutcome {
                    raw: raw[i],
                    imputed: imputed[i],
                    rolling_mean: rolled[i],
                    detrended: detrended[i],
                    z_score: standardized.scores[i],
                })
                .collect(),
        );
    }

    let rows = members
        .iter()
        .enumerate()
        .map(|(i, reading)| NormalizedRow {
            source_row: reading.source_row,
            timestamp: reading.timestamp,
            group_id: reading.group_id.clone(),
            columns: columns.iter().map(|column| column[i]).collect(),
        })
        .collect();

    PartitionOutcome {
        rows,
        impute: impute_total,
        degenerate_columns,
    }
}
