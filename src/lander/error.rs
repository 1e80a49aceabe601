use std::fmt;

use solana_client::client_error::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LanderError {
    #[error("RPC 请求失败: {0}")]
    Rpc(#[from] ClientError),
    #[error("RPC 响应非法: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Fatal(String),
}

impl LanderError {
    pub fn fatal(reason: impl fmt::Display) -> Self {
        Self::Fatal(reason.to_string())
    }

    /// 网络层错误，可在下一轮尝试中自行恢复。
    pub fn is_transient(&self) -> bool {
        matches!(self, LanderError::Rpc(_) | LanderError::InvalidResponse(_))
    }
}
