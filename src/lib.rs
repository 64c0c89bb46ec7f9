//! tsprep: batch preparation of tabular time series.
//!
//! Implemented pipelines:
//! - grouped sensor normalization (impute, rolling detrend, per-group z-score)
//! - single-series financial preprocessing (returns, log volume, IQR outliers)
//! - social-media post cleaning (text, hashtags, engagement, spam)

mod config;
mod encoding;
mod financial;
mod impute;
mod normalize;
mod observability;
mod social;
pub mod stats;
mod table;
mod text;

pub use config::{
    financial_prepare_config_from_env, iot_prepare_config_from_env, social_clean_config_from_env,
    FinancialPrepareConfig, IotPrepareConfig, SocialCleanConfig,
};
pub use encoding::{append_encodings, label_encode, one_hot};
pub use financial::{
    flag_outliers, iqr_bounds, log1p, pct_change, preprocess_financial, return_column_name,
    FinancialConfig, FinancialError, FinancialOutput, FinancialReport, IqrBounds,
    DEFAULT_IQR_MULTIPLIER,
};
pub use impute::{
    count_missing, impute, ImputeReport, ImputeStrategy, FORWARD_BACKWARD_MEDIAN,
    FORWARD_THEN_MEDIAN,
};
pub use normalize::{
    normalize, normalize_readings, ColumnOutcome, DegenerateGroup, NormalizeConfig,
    NormalizeError, NormalizeReport, NormalizedRow, NormalizedTable, Reading,
    DEFAULT_ROLL_WINDOW, DETRENDED_SUFFIX, RAW_SUFFIX, ROLL_MEAN_SUFFIX, Z_SUFFIX,
};
pub use observability::{
    init_logging, log_run_finish, log_run_start, logging_config_from_env, LogFormat,
    LoggingConfig, LoggingInitError,
};
pub use social::{
    clean_social_posts, engagement_rate, engagement_score, SocialCleanOutput, SocialConfig,
    SocialError, SocialReport, SOCIAL_OUTPUT_COLUMNS,
};
pub use table::{
    coerce_numeric, format_bool, format_float, format_timestamp, parse_timestamp,
    parse_timestamp_column, schema_fingerprint, CsvTable, OutputSchema, TableError,
};
pub use text::{
    clean_text, english_stopwords, extract_hashtags, is_spam, remove_stopwords, standardize_text,
};
