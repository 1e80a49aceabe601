use solana_sdk::instruction::Instruction;

use crate::instructions::compute_budget::{
    compute_unit_limit_instruction, compute_unit_price_instruction,
};

const MICRO_LAMPORTS_PER_LAMPORT: u128 = 1_000_000;

/// 优先费参数：计划 compute unit 上限 + 期望额外支付的 lamports。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeParameters {
    estimated_compute_units: u32,
    target_fee_lamports: u64,
}

impl FeeParameters {
    /// compute unit 为 0 时返回 `None`，单价无法定义。
    pub fn new(estimated_compute_units: u32, target_fee_lamports: u64) -> Option<Self> {
        if estimated_compute_units == 0 {
            return None;
        }
        Some(Self {
            estimated_compute_units,
            target_fee_lamports,
        })
    }

    pub fn estimated_compute_units(&self) -> u32 {
        self.estimated_compute_units
    }

    pub fn target_fee_lamports(&self) -> u64 {
        self.target_fee_lamports
    }

    pub fn micro_lamports_per_unit(&self) -> u64 {
        compute_priority_fee_micro_lamports(self.estimated_compute_units, self.target_fee_lamports)
    }

    pub fn instructions(&self) -> FeeInstructions {
        compute_fee_instructions(self.estimated_compute_units, self.target_fee_lamports)
    }
}

/// 需要前置到交易最前面的两条 compute budget 指令，顺序固定为 limit → price。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeInstructions {
    pub limit: Instruction,
    pub price: Instruction,
}

impl FeeInstructions {
    pub fn to_vec(&self) -> Vec<Instruction> {
        vec![self.limit.clone(), self.price.clone()]
    }
}

pub fn compute_priority_fee_micro_lamports(compute_unit_limit: u32, target_fee_lamports: u64) -> u64 {
    if compute_unit_limit == 0 {
        return 0;
    }
    let micros = u128::from(target_fee_lamports) * MICRO_LAMPORTS_PER_LAMPORT
        / u128::from(compute_unit_limit);
    u64::try_from(micros).unwrap_or(u64::MAX)
}

pub fn compute_fee_instructions(
    estimated_compute_units: u32,
    target_fee_lamports: u64,
) -> FeeInstructions {
    let price = compute_priority_fee_micro_lamports(estimated_compute_units, target_fee_lamports);
    FeeInstructions {
        limit: compute_unit_limit_instruction(estimated_compute_units),
        price: compute_unit_price_instruction(price),
    }
}
