//! Run configuration for the pipeline binaries, read from `TSPREP_*`
//! environment variables. Unset, blank or invalid values fall back to defaults.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::financial::FinancialConfig;
use crate::normalize::NormalizeConfig;
use crate::social::SocialConfig;

pub const IOT_INPUT_ENV: &str = "TSPREP_IOT_INPUT";
pub const IOT_OUTPUT_ENV: &str = "TSPREP_IOT_OUTPUT";
pub const ROLL_WINDOW_ENV: &str = "TSPREP_ROLL_WINDOW";
pub const FINANCIAL_INPUT_ENV: &str = "TSPREP_FINANCIAL_INPUT";
pub const FINANCIAL_OUTPUT_ENV: &str = "TSPREP_FINANCIAL_OUTPUT";
pub const SOCIAL_INPUT_ENV: &str = "TSPREP_SOCIAL_INPUT";
pub const SOCIAL_OUTPUT_ENV: &str = "TSPREP_SOCIAL_OUTPUT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IotPrepareConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub normalize: NormalizeConfig,
}

impl Default for IotPrepareConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("iot_sensor.csv"),
            output: PathBuf::from("iot_sensor_prepared.csv"),
            normalize: NormalizeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialPrepareConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub financial: FinancialConfig,
}

impl Default for FinancialPrepareConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("financial_data.csv"),
            output: PathBuf::from("financial_data_preprocessed.csv"),
            financial: FinancialConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialCleanConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub social: SocialConfig,
}

impl Default for SocialCleanConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("social_media.csv"),
            output: PathBuf::from("social_media_cleaned.csv"),
            social: SocialConfig::default(),
        }
    }
}

pub fn iot_prepare_config_from_env() -> IotPrepareConfig {
    let mut config = IotPrepareConfig::default();
    if let Some(path) = env_path(IOT_INPUT_ENV) {
        config.input = path;
    }
    if let Some(path) = env_path(IOT_OUTPUT_ENV) {
        config.output = path;
    }
    if let Some(window) = env::var(ROLL_WINDOW_ENV)
        .ok()
        .and_then(|raw| parse_window(&raw))
    {
        config.normalize.window_size = window;
    }
    config
}

pub fn financial_prepare_config_from_env() -> FinancialPrepareConfig {
    let mut config = FinancialPrepareConfig::default();
    if let Some(path) = env_path(FINANCIAL_INPUT_ENV) {
        config.input = path;
    }
    if let Some(path) = env_path(FINANCIAL_OUTPUT_ENV) {
        config.output = path;
    }
    config
}

pub fn social_clean_config_from_env() -> SocialCleanConfig {
    let mut config = SocialCleanConfig::default();
    if let Some(path) = env_path(SOCIAL_INPUT_ENV) {
        config.input = path;
    }
    if let Some(path) = env_path(SOCIAL_OUTPUT_ENV) {
        config.output = path;
    }
    config
}

fn env_path(key: &str) -> Option<PathBuf> {
    let raw = env::var(key).ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

fn parse_window(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|w| *w > 0)
}

#[cfg(test)]
pub(crate) mod test_env {
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    pub(crate) fn with_env_vars<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
        let _guard = env_lock().lock().expect("env lock should not be poisoned");
        let previous: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(key, _)| ((*key).to_string(), env::var(key).ok()))
            .collect();

        for (key, value) in vars {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        let output = f();

        for (key, value) in previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::test_env::with_env_vars;
    use super::*;

    #[test]
    fn iot_defaults_when_env_missing() {
        let cfg = with_env_vars(
            &[
                (IOT_INPUT_ENV, None),
                (IOT_OUTPUT_ENV, None),
                (ROLL_WINDOW_ENV, None),
            ],
            iot_prepare_config_from_env,
        );

        assert_eq!(cfg, IotPrepareConfig::default());
        assert_eq!(cfg.normalize.window_size, 6);
    }

    #[test]
    fn iot_paths_and_window_from_env() {
        let cfg = with_env_vars(
            &[
                (IOT_INPUT_ENV, Some("data/in.csv")),
                (IOT_OUTPUT_ENV, Some(" data/out.csv ")),
                (ROLL_WINDOW_ENV, Some("3")),
            ],
            iot_prepare_config_from_env,
        );

        assert_eq!(cfg.input, PathBuf::from("data/in.csv"));
        assert_eq!(cfg.output, PathBuf::from("data/out.csv"));
        assert_eq!(cfg.normalize.window_size, 3);
    }

    #[test]
    fn invalid_window_and_blank_paths_fall_back() {
        for window in ["0", "-2", "six"] {
            let cfg = with_env_vars(
                &[
                    (IOT_INPUT_ENV, Some("   ")),
                    (IOT_OUTPUT_ENV, None),
                    (ROLL_WINDOW_ENV, Some(window)),
                ],
                iot_prepare_config_from_env,
            );
            assert_eq!(cfg, IotPrepareConfig::default(), "window={window}");
        }
    }

    #[test]
    fn financial_and_social_paths_from_env() {
        let (financial, social) = with_env_vars(
            &[
                (FINANCIAL_INPUT_ENV, Some("prices.csv")),
                (FINANCIAL_OUTPUT_ENV, None),
                (SOCIAL_INPUT_ENV, None),
                (SOCIAL_OUTPUT_ENV, Some("posts_clean.csv")),
            ],
            || {
                (
                    financial_prepare_config_from_env(),
                    social_clean_config_from_env(),
                )
            },
        );

        assert_eq!(financial.input, PathBuf::from("prices.csv"));
        assert_eq!(
            financial.output,
            PathBuf::from("financial_data_preprocessed.csv")
        );
        assert_eq!(social.input, PathBuf::from("social_media.csv"));
        assert_eq!(social.output, PathBuf::from("posts_clean.csv"));
    }
}
