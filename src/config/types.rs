use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use solana_commitment_config::CommitmentConfig;

use crate::lander::LandingSchedule;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub swap: SwapConfig,
    #[serde(default)]
    pub fee: FeeConfig,
    #[serde(default)]
    pub landing: LandingConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub bot: BotConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "super::default_rpc_url")]
    pub rpc_url: String,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// base58、JSON 数组或逗号分隔字节；为空时读取 `keypair_path`。
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub keypair_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    #[serde(default = "super::default_pool")]
    pub pool: String,
    #[serde(default = "super::default_slippage_bps")]
    pub slippage_bps: u16,
    #[serde(default = "super::default_min_amount")]
    pub min_amount: f64,
    #[serde(default = "super::default_max_amount")]
    pub max_amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "super::default_estimated_compute_units")]
    pub estimated_compute_units: u32,
    #[serde(default = "super::default_target_fee_lamports")]
    pub target_fee_lamports: u64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentSetting {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl CommitmentSetting {
    pub fn to_commitment(self) -> CommitmentConfig {
        match self {
            Self::Processed => CommitmentConfig::processed(),
            Self::Confirmed => CommitmentConfig::confirmed(),
            Self::Finalized => CommitmentConfig::finalized(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LandingConfig {
    #[serde(default)]
    pub commitment: CommitmentSetting,
    #[serde(default = "super::default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "super::default_confirm_wait_ms")]
    pub confirm_wait_ms: u64,
    #[serde(default = "super::default_retry_wait_ms")]
    pub retry_wait_ms: u64,
    #[serde(default = "super::default_validity_window_blocks")]
    pub validity_window_blocks: u64,
}

impl LandingConfig {
    pub fn schedule(&self) -> LandingSchedule {
        LandingSchedule {
            max_attempts: self.max_attempts,
            confirm_wait: Duration::from_millis(self.confirm_wait_ms),
            retry_wait: Duration::from_millis(self.retry_wait_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "super::default_iterations")]
    pub iterations: u32,
    #[serde(default = "super::default_min_sleep_secs")]
    pub min_sleep_secs: f64,
    #[serde(default = "super::default_max_sleep_secs")]
    pub max_sleep_secs: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub prometheus: PrometheusConfig,
    #[serde(default = "super::default_explorer_url")]
    pub explorer_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "super::default_prometheus_listen")]
    pub listen: String,
}
