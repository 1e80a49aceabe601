pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use self::types as cfg;

pub(crate) fn default_rpc_url() -> String {
    "https://eclipse.helius-rpc.com".to_string()
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_pool() -> String {
    "BqinHKam4jX8NUYbj2LsMnBYbqFnPvggiyx4PBHPkhSo".to_string()
}

pub(crate) fn default_slippage_bps() -> u16 {
    100
}

pub(crate) fn default_min_amount() -> f64 {
    0.000001
}

pub(crate) fn default_max_amount() -> f64 {
    0.01
}

pub(crate) fn default_estimated_compute_units() -> u32 {
    100_000
}

pub(crate) fn default_target_fee_lamports() -> u64 {
    1_000
}

pub(crate) fn default_max_attempts() -> usize {
    crate::lander::DEFAULT_MAX_ATTEMPTS
}

pub(crate) fn default_confirm_wait_ms() -> u64 {
    5_000
}

pub(crate) fn default_retry_wait_ms() -> u64 {
    2_000
}

pub(crate) fn default_validity_window_blocks() -> u64 {
    crate::engine::BLOCKHASH_VALIDITY_BLOCKS
}

pub(crate) fn default_iterations() -> u32 {
    50
}

pub(crate) fn default_min_sleep_secs() -> f64 {
    1.0
}

pub(crate) fn default_max_sleep_secs() -> f64 {
    10.0
}

pub(crate) fn default_explorer_url() -> String {
    "https://eclipsescan.xyz/tx/".to_string()
}

pub(crate) fn default_prometheus_listen() -> String {
    "0.0.0.0:9898".to_string()
}

impl Default for cfg::GlobalConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            wallet: cfg::WalletConfig::default(),
            logging: cfg::LoggingConfig::default(),
        }
    }
}

impl Default for cfg::LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
            json: false,
        }
    }
}

impl Default for cfg::SwapConfig {
    fn default() -> Self {
        Self {
            pool: default_pool(),
            slippage_bps: default_slippage_bps(),
            min_amount: default_min_amount(),
            max_amount: default_max_amount(),
        }
    }
}

impl Default for cfg::FeeConfig {
    fn default() -> Self {
        Self {
            estimated_compute_units: default_estimated_compute_units(),
            target_fee_lamports: default_target_fee_lamports(),
        }
    }
}

impl Default for cfg::LandingConfig {
    fn default() -> Self {
        Self {
            commitment: cfg::CommitmentSetting::default(),
            max_attempts: default_max_attempts(),
            confirm_wait_ms: default_confirm_wait_ms(),
            retry_wait_ms: default_retry_wait_ms(),
            validity_window_blocks: default_validity_window_blocks(),
        }
    }
}

impl Default for cfg::ScheduleConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            min_sleep_secs: default_min_sleep_secs(),
            max_sleep_secs: default_max_sleep_secs(),
        }
    }
}

impl Default for cfg::BotConfig {
    fn default() -> Self {
        Self {
            prometheus: cfg::PrometheusConfig::default(),
            explorer_url: default_explorer_url(),
        }
    }
}

impl Default for cfg::PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: default_prometheus_listen(),
        }
    }
}
