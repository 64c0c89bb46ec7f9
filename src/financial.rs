//! Single-series financial preprocessing: returns, log volume and IQR outliers.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::impute::{impute, ImputeReport, FORWARD_BACKWARD_MEDIAN};
use crate::stats::{present, quantile_linear};
use crate::table::{
    coerce_numeric, format_bool, format_float, format_timestamp, is_coercion_failure,
    parse_timestamp_column, CsvTable, TableError,
};

pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialConfig {
    pub date_column: String,
    pub price_column: String,
    pub volume_column: String,
    pub return_periods: Vec<usize>,
    pub iqr_multiplier: f64,
}

impl Default for FinancialConfig {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            price_column: "closing_price".to_string(),
            volume_column: "volume".to_string(),
            return_periods: vec![1, 7],
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
        }
    }
}

#[derive(Debug, Error)]
pub enum FinancialError {
    #[error("invalid financial config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    /// Strict on both sides: a value sitting exactly on a bound is not an outlier.
    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialReport {
    pub rows: u64,
    pub coerced_cells: u64,
    pub price_imputation: ImputeReport,
    pub volume_imputation: ImputeReport,
    pub bounds: Option<IqrBounds>,
    pub outliers: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinancialOutput {
    pub table: CsvTable,
    pub report: FinancialReport,
}

/// `(v[i] - v[i-k]) / v[i-k]`; missing for the first `k` rows and for
/// missing operands.
///
/// A zero base yields missing as well, not the `inf` that a conventional
/// `pct_change` reports there; returns are never infinite.
pub fn pct_change(values: &[Option<f64>], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if periods == 0 || i < periods {
                return None;
            }
            match (values[i], values[i - periods]) {
                (Some(current), Some(base)) if base != 0.0 => Some((current - base) / base),
                _ => None,
            }
        })
        .collect()
}

/// `ln(1 + x)` for `x > -1`, otherwise missing.
pub fn log1p(value: f64) -> Option<f64> {
    if value > -1.0 {
        Some(value.ln_1p())
    } else {
        None
    }
}

pub fn iqr_bounds(values: &[f64], multiplier: f64) -> Option<IqrBounds> {
    let q1 = quantile_linear(values, 0.25)?;
    let q3 = quantile_linear(values, 0.75)?;
    let iqr = q3 - q1;
    Some(IqrBounds {
        q1,
        q3,
        iqr,
        lower: q1 - multiplier * iqr,
        upper: q3 + multiplier * iqr,
    })
}

/// Flags computed once over the whole column; missing cells are never outliers.
pub fn flag_outliers(values: &[Option<f64>], multiplier: f64) -> (Vec<bool>, Option<IqrBounds>) {
    let bounds = iqr_bounds(&present(values), multiplier);
    let flags = values
        .iter()
        .map(|value| match (value, bounds) {
            (Some(v), Some(b)) => b.is_outlier(*v),
            _ => false,
        })
        .collect();
    (flags, bounds)
}

/// Sorts by date, imputes price and volume, then derives returns, log volume
/// and the outlier flag.
pub fn preprocess_financial(
    table: &CsvTable,
    config: &FinancialConfig,
) -> Result<FinancialOutput, FinancialError> {
    validate_config(config)?;

    let price_idx = table.require_column(&config.price_column)?;
    let volume_idx = table.require_column(&config.volume_column)?;
    let dates = parse_timestamp_column(table, &config.date_column)?;

    info!(
        component = "financial",
        event = "financial.start",
        rows = table.len(),
        return_periods = ?config.return_periods
    );

    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by_key(|&row| dates[row]);

    let (mut price, price_coerced) =
        sorted_numeric_column(table, &order, &config.price_column, price_idx);
    let (mut volume, volume_coerced) =
        sorted_numeric_column(table, &order, &config.volume_column, volume_idx);
    let coerced_cells = price_coerced + volume_coerced;

    let price_imputation = impute(&mut price, &FORWARD_BACKWARD_MEDIAN);
    let volume_imputation = impute(&mut volume, &FORWARD_BACKWARD_MEDIAN);

    let returns: Vec<(usize, Vec<Option<f64>>)> = config
        .return_periods
        .iter()
        .map(|&k| (k, pct_change(&price, k)))
        .collect();
    let volume_log: Vec<Option<f64>> = volume.iter().map(|v| v.and_then(log1p)).collect();
    let (outlier_flags, bounds) = flag_outliers(&price, config.iqr_multiplier);
    let outliers = outlier_flags.iter().filter(|flag| **flag).count() as u64;

    info!(
        component = "financial",
        event = "financial.outliers",
        q1 = ?bounds.map(|b| b.q1),
        q3 = ?bounds.map(|b| b.q3),
        lower = ?bounds.map(|b| b.lower),
        upper = ?bounds.map(|b| b.upper),
        outliers
    );

    let mut headers = vec![
        config.date_column.clone(),
        config.price_column.clone(),
        config.volume_column.clone(),
        format!("{}_log", config.volume_column),
    ];
    headers.extend(returns.iter().map(|(k, _)| return_column_name(*k)));
    headers.push("is_outlier".to_string());

    let rows = order
        .iter()
        .enumerate()
        .map(|(pos, &row)| {
            let mut fields = vec![
                format_timestamp(&dates[row]),
                format_float(price[pos]),
                format_float(volume[pos]),
                format_float(volume_log[pos]),
            ];
            fields.extend(returns.iter().map(|(_, series)| format_float(series[pos])));
            fields.push(format_bool(outlier_flags[pos]));
            fields
        })
        .collect();

    let report = FinancialReport {
        rows: table.len() as u64,
        coerced_cells,
        price_imputation,
        volume_imputation,
        bounds,
        outliers,
    };

    info!(
        component = "financial",
        event = "financial.finish",
        rows = report.rows,
        outliers = report.outliers
    );

    Ok(FinancialOutput {
        table: CsvTable::new(headers, rows),
        report,
    })
}

fn sorted_numeric_column(
    table: &CsvTable,
    order: &[usize],
    name: &str,
    idx: usize,
) -> (Vec<Option<f64>>, u64) {
    let failures = order
        .iter()
        .filter(|&&row| is_coercion_failure(table.cell(row, idx)))
        .count() as u64;
    if failures > 0 {
        warn!(
            component = "financial",
            event = "financial.coercion",
            column = %name,
            cells = failures
        );
    }
    let values = order
        .iter()
        .map(|&row| coerce_numeric(table.cell(row, idx)))
        .collect();
    (values, failures)
}

pub fn return_column_name(periods: usize) -> String {
    format!("ret_{periods}d")
}

fn validate_config(config: &FinancialConfig) -> Result<(), FinancialError> {
    if config.return_periods.iter().any(|&k| k == 0) {
        return Err(FinancialError::InvalidConfig(
            "return_periods entries must be > 0".to_string(),
        ));
    }
    if !config.iqr_multiplier.is_finite() || config.iqr_multiplier < 0.0 {
        return Err(FinancialError::InvalidConfig(
            "iqr_multiplier must be a finite non-negative number".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pct_change_leaves_warmup_and_zero_base_missing() {
        let values = [Some(100.0), Some(110.0), Some(0.0), Some(5.0), None];
        let ret = pct_change(&values, 1);
        assert_eq!(ret[0], None);
        assert!((ret[1].unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(ret[2], Some(-1.0));
        assert_eq!(ret[3], None);
        assert_eq!(ret[4], None);

        assert_eq!(pct_change(&values, 7), vec![None; 5]);
    }

    #[test]
    fn log1p_is_undefined_at_or_below_minus_one() {
        assert_eq!(log1p(0.0), Some(0.0));
        assert!((log1p(std::f64::consts::E - 1.0).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(log1p(-1.0), None);
        assert_eq!(log1p(-3.0), None);
    }

    #[test]
    fn iqr_flags_only_the_spike() {
        let values: Vec<Option<f64>> = [10.0, 12.0, 9.0, 100.0, 11.0]
            .into_iter()
            .map(Some)
            .collect();
        let (flags, bounds) = flag_outliers(&values, DEFAULT_IQR_MULTIPLIER);
        let bounds = bounds.unwrap();
        assert_eq!(bounds.q1, 10.0);
        assert_eq!(bounds.q3, 12.0);
        assert_eq!(bounds.upper, 15.0);
        assert_eq!(flags, vec![false, false, false, true, false]);
    }

    #[test]
    fn upper_bound_itself_is_not_an_outlier() {
        let mut values: Vec<Option<f64>> = (0..=8).map(|v| Some(v as f64)).collect();
        values.push(Some(13.5));
        let (flags, bounds) = flag_outliers(&values, DEFAULT_IQR_MULTIPLIER);
        assert_eq!(bounds.unwrap().upper, 13.5);
        assert!(!flags[9]);

        values[9] = Some(14.5);
        let (flags, bounds) = flag_outliers(&values, DEFAULT_IQR_MULTIPLIER);
        assert_eq!(bounds.unwrap().upper, 13.5);
        assert!(flags[9]);
    }

    #[test]
    fn empty_column_has_no_bounds() {
        let (flags, bounds) = flag_outliers(&[None, None], DEFAULT_IQR_MULTIPLIER);
        assert_eq!(flags, vec![false, false]);
        assert!(bounds.is_none());
    }
}
