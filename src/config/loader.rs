use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::engine::MAX_SLEEP_SECS;

use super::AppConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["swap-lander.yaml", "config/swap-lander.yaml"];

pub const RPC_URL_ENV: &str = "SWAP_LANDER_RPC_URL";
pub const MIN_AMOUNT_ENV: &str = "MIN_AMOUNT";
pub const MAX_AMOUNT_ENV: &str = "MAX_AMOUNT";
pub const TIMES_ENV: &str = "TIMES";
pub const MIN_SLEEP_ENV: &str = "MIN_SLEEP_TIME";
pub const MAX_SLEEP_ENV: &str = "MAX_SLEEP_TIME";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("environment variable {var}={value:?} is invalid: {reason}")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            return Ok(config);
        }
    }

    Ok(AppConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<AppConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: AppConfig =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(Some(config))
}

/// 用进程环境变量覆盖配置。
pub fn apply_env_overrides(config: &mut AppConfig) -> Result<(), ConfigError> {
    apply_env_overrides_with(config, |key| env::var(key).ok())
}

pub fn apply_env_overrides_with<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(url) = lookup(RPC_URL_ENV) {
        config.global.rpc_url = url.trim().to_string();
    }
    if let Some(value) = lookup(MIN_AMOUNT_ENV) {
        config.swap.min_amount = parse_env(MIN_AMOUNT_ENV, &value)?;
    }
    if let Some(value) = lookup(MAX_AMOUNT_ENV) {
        config.swap.max_amount = parse_env(MAX_AMOUNT_ENV, &value)?;
    }
    if let Some(value) = lookup(TIMES_ENV) {
        config.schedule.iterations = parse_env(TIMES_ENV, &value)?;
    }
    if let Some(value) = lookup(MIN_SLEEP_ENV) {
        config.schedule.min_sleep_secs = parse_env(MIN_SLEEP_ENV, &value)?;
    }
    if let Some(value) = lookup(MAX_SLEEP_ENV) {
        config.schedule.max_sleep_secs = parse_env(MAX_SLEEP_ENV, &value)?;
    }
    Ok(())
}

fn parse_env<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|err| ConfigError::Env {
        var,
        value: value.to_string(),
        reason: err.to_string(),
    })
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.global.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid("global.rpc_url 不能为空".into()));
        }
        if self.swap.pool.trim().is_empty() {
            return Err(ConfigError::Invalid("swap.pool 不能为空".into()));
        }
        if self.swap.slippage_bps >= 10_000 {
            return Err(ConfigError::Invalid(format!(
                "swap.slippage_bps 必须小于 10000，当前 {}",
                self.swap.slippage_bps
            )));
        }
        ensure_positive("swap.min_amount", self.swap.min_amount)?;
        ensure_positive("swap.max_amount", self.swap.max_amount)?;
        ensure_ordered(
            "swap.min_amount",
            self.swap.min_amount,
            "swap.max_amount",
            self.swap.max_amount,
        )?;
        if self.fee.estimated_compute_units == 0 {
            return Err(ConfigError::Invalid(
                "fee.estimated_compute_units 必须大于 0".into(),
            ));
        }
        if self.landing.max_attempts == 0 {
            return Err(ConfigError::Invalid("landing.max_attempts 必须大于 0".into()));
        }
        let sleep = &self.schedule;
        if !sleep.min_sleep_secs.is_finite()
            || !sleep.max_sleep_secs.is_finite()
            || sleep.min_sleep_secs < 0.0
        {
            return Err(ConfigError::Invalid(
                "schedule 休眠时间必须为非负有限数".into(),
            ));
        }
        if sleep.max_sleep_secs > MAX_SLEEP_SECS {
            return Err(ConfigError::Invalid(format!(
                "schedule.max_sleep_secs 不能超过 {MAX_SLEEP_SECS} 秒，当前 {}",
                sleep.max_sleep_secs
            )));
        }
        ensure_ordered(
            "schedule.min_sleep_secs",
            self.schedule.min_sleep_secs,
            "schedule.max_sleep_secs",
            self.schedule.max_sleep_secs,
        )?;
        Ok(())
    }
}

fn ensure_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{name} 必须为正数，当前 {value}")))
    }
}

fn ensure_ordered(min_name: &str, min: f64, max_name: &str, max: f64) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::Invalid(format!(
            "{min_name} ({min}) 不能大于 {max_name} ({max})"
        )));
    }
    Ok(())
}
