/// Configuration loading and environment overrides
///
/// Environment variables are read exactly once, here, and folded into the
/// explicit `Config`; services never consult the environment themselves.
use super::schemas::Config;
use crate::errors::RiskResult;
use crate::logger::{self, LogTag};
use std::path::Path;

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/riskrouter.toml";

/// Load configuration from a TOML file
///
/// A missing file yields defaults. Parse failures and invalid sections are
/// returned as errors so the caller refuses to start.
pub fn load_config_from_path(path: impl AsRef<Path>) -> RiskResult<Config> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str::<Config>(&contents)?
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path.display()),
        );
        Config::default()
    };

    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Apply `CORRELATION_*` / `VOL_OF_VOL_*` overrides from the process environment
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply safe-fallback overrides from an arbitrary lookup
///
/// Absent or malformed values keep the configured value.
pub fn apply_overrides_from<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = parse_override::<f64>(&lookup, "CORRELATION_SAFE_VALUE") {
        config.correlation.safe_correlation_value = v;
    }
    if let Some(v) = parse_override::<usize>(&lookup, "CORRELATION_MIN_POINTS") {
        config.correlation.min_data_points = v;
    }
    if let Some(v) = parse_override::<f64>(&lookup, "VOL_OF_VOL_SAFE_VALUE") {
        config.vol_of_vol.safe_vol_of_vol_value = v;
    }
    if let Some(v) = parse_override::<usize>(&lookup, "VOL_OF_VOL_MIN_POINTS") {
        config.vol_of_vol.min_data_points = v;
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => {
            logger::info(LogTag::Config, &format!("{} override applied: {}", key, raw.trim()));
            Some(value)
        }
        Err(_) => {
            logger::warning(
                LogTag::Config,
                &format!("{}='{}' is malformed, keeping configured value", key, raw),
            );
            None
        }
    }
}
