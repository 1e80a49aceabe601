use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;

use super::builder::BaseTransaction;
use super::error::EngineResult;

/// 本轮输入代币在池子中的位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    /// 以 token A 为输入，换出 token B。
    AToB,
    BToA,
}

impl SwapDirection {
    pub fn a_to_b(self) -> bool {
        matches!(self, SwapDirection::AToB)
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapDirection::AToB => f.write_str("token_a"),
            SwapDirection::BToA => f.write_str("token_b"),
        }
    }
}

/// 已决定的 swap 输入：方向与 UI 数量（未乘以精度）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub direction: SwapDirection,
    pub amount: Decimal,
}

impl SwapRequest {
    pub fn new(direction: SwapDirection, amount: Decimal) -> Self {
        Self { direction, amount }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapQuote {
    pub a_to_b: bool,
    pub amount_in: u64,
    pub estimated_amount_out: u64,
    pub minimum_amount_out: u64,
    pub input_decimals: u8,
    pub output_decimals: u8,
}

impl SwapQuote {
    pub fn estimated_amount_in_ui(&self) -> Decimal {
        atoms_to_ui(self.amount_in, self.input_decimals)
    }

    pub fn estimated_amount_out_ui(&self) -> Decimal {
        atoms_to_ui(self.estimated_amount_out, self.output_decimals)
    }

    /// 每单位输出需要付出的输入数量。
    pub fn rate(&self) -> Decimal {
        let out = self.estimated_amount_out_ui();
        if out.is_zero() {
            return Decimal::ZERO;
        }
        self.estimated_amount_in_ui()
            .checked_div(out)
            .unwrap_or(Decimal::ZERO)
    }
}

pub struct PreparedSwap {
    pub base: BaseTransaction,
    pub quote: SwapQuote,
}

/// 外部报价 + 指令构建服务。
#[async_trait]
pub trait SwapBuilder: Send + Sync {
    async fn build_swap(&self, payer: Pubkey, request: &SwapRequest) -> EngineResult<PreparedSwap>;
}

fn atoms_to_ui(amount: u64, decimals: u8) -> Decimal {
    Decimal::try_from_i128_with_scale(i128::from(amount), u32::from(decimals))
        .unwrap_or(Decimal::ZERO)
}
