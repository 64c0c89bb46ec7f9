use tsprep::{
    financial_prepare_config_from_env, init_logging, log_run_finish, log_run_start,
    logging_config_from_env, preprocess_financial, CsvTable,
};

const PIPELINE: &str = "financial_preprocess";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging = logging_config_from_env();
    init_logging(&logging)?;
    let cfg = financial_prepare_config_from_env();
    log_run_start(PIPELINE, &cfg.input, &logging);

    let source = CsvTable::read_path(&cfg.input)?;
    let out = preprocess_financial(&source, &cfg.financial)?;
    out.table.write_path_atomic(&cfg.output)?;

    let schema = out.table.output_schema();
    log_run_finish(PIPELINE, &cfg.output, out.table.len(), &schema.fingerprint);

    println!(
        "Financial preprocessing done | input={} output={} rows={} outliers={}",
        cfg.input.display(),
        cfg.output.display(),
        out.report.rows,
        out.report.outliers
    );
    println!("{}", serde_json::to_string_pretty(&out.report)?);
    println!("{}", serde_json::to_string_pretty(&schema)?);

    Ok(())
}
