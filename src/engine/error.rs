use anyhow::Error;
use bincode::error::EncodeError;
use solana_client::client_error::ClientError;
use thiserror::Error;

use crate::lander::LanderError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("配置缺失或非法: {0}")]
    InvalidConfig(String),
    #[error("RPC 请求失败: {0}")]
    Rpc(#[from] ClientError),
    #[error("落地层错误: {0}")]
    Lander(#[from] LanderError),
    #[error("池子数据处理失败: {0}")]
    Pool(#[from] Error),
    #[error("交易构建失败: {0}")]
    Transaction(String),
    #[error("交易签名失败: {0}")]
    Signing(String),
    #[error("序列化交易失败: {0}")]
    Encode(#[from] EncodeError),
}

pub type EngineResult<T> = Result<T, EngineError>;
