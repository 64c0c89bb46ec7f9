use tsprep::{
    clean_social_posts, init_logging, log_run_finish, log_run_start, logging_config_from_env,
    social_clean_config_from_env, CsvTable,
};

const PIPELINE: &str = "social_clean";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging = logging_config_from_env();
    init_logging(&logging)?;
    let cfg = social_clean_config_from_env();
    log_run_start(PIPELINE, &cfg.input, &logging);

    let source = CsvTable::read_path(&cfg.input)?;
    let out = clean_social_posts(&source, &cfg.social)?;
    out.table.write_path_atomic(&cfg.output)?;

    let schema = out.table.output_schema();
    log_run_finish(PIPELINE, &cfg.output, out.table.len(), &schema.fingerprint);

    let report = &out.report;
    println!(
        "Social cleaning done | input={} output={} original={} duplicates={} spam={} final={} retention={:.2}%",
        cfg.input.display(),
        cfg.output.display(),
        report.original_rows,
        report.duplicates_removed,
        report.spam_removed,
        report.final_rows,
        report.retention_rate
    );
    println!("{}", serde_json::to_string_pretty(report)?);
    println!("{}", serde_json::to_string_pretty(&schema)?);

    Ok(())
}
