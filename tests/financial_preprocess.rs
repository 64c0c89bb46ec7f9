use std::path::Path;

use tsprep::{preprocess_financial, CsvTable, FinancialConfig, FinancialError, TableError};

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "actual={actual} expected={expected}"
    );
}

fn fixture() -> CsvTable {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/financial_data.csv");
    CsvTable::read_path(&path).expect("fixture should load")
}

fn column(table: &CsvTable, name: &str) -> Vec<String> {
    table
        .column_values(name)
        .unwrap()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[test]
fn rows_are_sorted_by_date_with_expected_columns() {
    let out = preprocess_financial(&fixture(), &FinancialConfig::default()).unwrap();
    assert_eq!(
        out.table.headers(),
        [
            "date",
            "closing_price",
            "volume",
            "volume_log",
            "ret_1d",
            "ret_7d",
            "is_outlier"
        ]
    );
    assert_eq!(
        column(&out.table, "date"),
        vec![
            "2024-01-01 00:00:00",
            "2024-01-02 00:00:00",
            "2024-01-03 00:00:00",
            "2024-01-04 00:00:00",
            "2024-01-05 00:00:00",
        ]
    );
    assert_eq!(
        column(&out.table, "closing_price"),
        vec!["10.0", "12.0", "9.0", "100.0", "11.0"]
    );
}

#[test]
fn only_the_price_spike_is_flagged() {
    let out = preprocess_financial(&fixture(), &FinancialConfig::default()).unwrap();
    assert_eq!(
        column(&out.table, "is_outlier"),
        vec!["False", "False", "False", "True", "False"]
    );

    let bounds = out.report.bounds.unwrap();
    assert_close(bounds.q1, 10.0);
    assert_close(bounds.q3, 12.0);
    assert_close(bounds.upper, 15.0);
    assert_eq!(out.report.outliers, 1);
}

#[test]
fn volume_gap_is_forward_filled_before_log() {
    let out = preprocess_financial(&fixture(), &FinancialConfig::default()).unwrap();
    assert_eq!(out.report.volume_imputation.forward_filled, 1);
    assert_eq!(column(&out.table, "volume")[1], "1000.0");

    let logs = column(&out.table, "volume_log");
    assert_close(logs[1].parse().unwrap(), 1001.0_f64.ln());
}

#[test]
fn returns_leave_warmup_rows_empty() {
    let out = preprocess_financial(&fixture(), &FinancialConfig::default()).unwrap();
    let ret_1d = column(&out.table, "ret_1d");
    assert_eq!(ret_1d[0], "");
    assert_close(ret_1d[1].parse().unwrap(), 0.2);
    assert_close(ret_1d[2].parse().unwrap(), -0.25);
    assert_close(ret_1d[4].parse().unwrap(), -0.89);

    assert!(column(&out.table, "ret_7d").iter().all(String::is_empty));
}

#[test]
fn custom_return_periods_name_their_columns() {
    let cfg = FinancialConfig {
        return_periods: vec![2],
        ..FinancialConfig::default()
    };
    let out = preprocess_financial(&fixture(), &cfg).unwrap();
    let ret_2d = column(&out.table, "ret_2d");
    assert_eq!(ret_2d[..2], ["", ""]);
    assert_close(ret_2d[2].parse().unwrap(), -0.1);
}

#[test]
fn zero_return_period_is_rejected() {
    let cfg = FinancialConfig {
        return_periods: vec![0],
        ..FinancialConfig::default()
    };
    let err = preprocess_financial(&fixture(), &cfg).unwrap_err();
    assert!(matches!(err, FinancialError::InvalidConfig(_)));
}

#[test]
fn missing_price_column_is_a_schema_error() {
    let table = CsvTable::from_reader("date,volume\n2024-01-01,5\n".as_bytes()).unwrap();
    let err = preprocess_financial(&table, &FinancialConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        FinancialError::Table(TableError::MissingColumn { .. })
    ));
}
