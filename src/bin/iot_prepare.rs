use tsprep::{
    append_encodings, init_logging, iot_prepare_config_from_env, log_run_finish, log_run_start,
    logging_config_from_env, normalize, CsvTable, DETRENDED_SUFFIX, RAW_SUFFIX, ROLL_MEAN_SUFFIX,
    Z_SUFFIX,
};

const PIPELINE: &str = "iot_prepare";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging = logging_config_from_env();
    init_logging(&logging)?;
    let cfg = iot_prepare_config_from_env();
    log_run_start(PIPELINE, &cfg.input, &logging);

    let source = CsvTable::read_path(&cfg.input)?;
    let normalized = normalize(&source, &cfg.normalize)?;
    let mut prepared = normalized.to_table(&source)?;

    let group_key = cfg.normalize.group_key.as_str();
    let label_column = format!("{}_label", group_prefix(group_key));
    let one_hot_columns =
        append_encodings(&mut prepared, group_key, &label_column, group_prefix(group_key))?;

    let mut columns: Vec<String> = vec![
        cfg.normalize.timestamp_column.clone(),
        group_key.to_string(),
        label_column,
    ];
    let values = &cfg.normalize.value_columns;
    columns.extend(values.iter().map(|c| format!("{c}{RAW_SUFFIX}")));
    columns.extend(values.iter().cloned());
    for suffix in [ROLL_MEAN_SUFFIX, DETRENDED_SUFFIX, Z_SUFFIX] {
        columns.extend(values.iter().map(|c| format!("{c}{suffix}")));
    }
    columns.extend(one_hot_columns);

    let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();
    let output = prepared.select(&column_refs)?;
    output.write_path_atomic(&cfg.output)?;

    let schema = output.output_schema();
    log_run_finish(PIPELINE, &cfg.output, output.len(), &schema.fingerprint);

    println!(
        "IoT preparation done | input={} output={} rows={} groups={} window={}",
        cfg.input.display(),
        cfg.output.display(),
        output.len(),
        normalized.report.groups,
        cfg.normalize.window_size
    );
    println!("{}", serde_json::to_string_pretty(&normalized.report)?);
    println!("{}", serde_json::to_string_pretty(&schema)?);

    Ok(())
}

/// `sensor_id` encodes as `sensor_label` and `sensor_<id>` columns.
fn group_prefix(group_key: &str) -> &str {
    group_key.strip_suffix("_id").unwrap_or(group_key)
}
