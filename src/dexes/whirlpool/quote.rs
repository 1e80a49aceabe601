use anyhow::{Result, anyhow, bail};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::decoder::WhirlpoolState;

/// 与报价相同的四舍五入精度。
pub const UI_AMOUNT_DECIMALS: u32 = 8;
pub const MIN_SQRT_PRICE_X64: u128 = 4_295_048_016;
pub const MAX_SQRT_PRICE_X64: u128 = 79_226_673_515_401_279_992_447_579_055;

const Q64: f64 = 18_446_744_073_709_551_616.0;
const FEE_RATE_DENOMINATOR: u64 = 1_000_000;
const BPS_DENOMINATOR: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpotQuote {
    pub amount_in: u64,
    pub estimated_amount_out: u64,
    pub minimum_amount_out: u64,
}

/// 将 UI 数量转换为最小单位。
pub fn ui_amount_to_atoms(amount: &Decimal, decimals: u8) -> Result<u64> {
    if amount <= &Decimal::ZERO {
        bail!("金额必须大于 0");
    }
    let rounded = amount.round_dp(UI_AMOUNT_DECIMALS);
    let factor = 10u64
        .checked_pow(u32::from(decimals))
        .map(Decimal::from)
        .ok_or_else(|| anyhow!("精度 {decimals} 超出可表示范围"))?;
    let scaled = rounded
        .checked_mul(factor)
        .ok_or_else(|| anyhow!("金额超出可表示范围"))?;
    let atoms = scaled
        .floor()
        .to_u64()
        .ok_or_else(|| anyhow!("金额超过 u64 最大值"))?;
    if atoms == 0 {
        bail!("金额 {amount} 在精度 {decimals} 下为 0");
    }
    Ok(atoms)
}

/// 按当前 sqrt_price 的现价估算输出，不模拟跨 tick。
pub fn quote_exact_in(
    state: &WhirlpoolState,
    amount_in: u64,
    a_to_b: bool,
    slippage_bps: u16,
) -> Result<SpotQuote> {
    if state.sqrt_price == 0 {
        bail!("Whirlpool 池 {} sqrt_price 为 0", state.address);
    }
    if state.liquidity == 0 {
        bail!("Whirlpool 池 {} 流动性为 0", state.address);
    }

    let fee = u128::from(amount_in) * u128::from(state.fee_rate) / u128::from(FEE_RATE_DENOMINATOR);
    let net_in = u128::from(amount_in).saturating_sub(fee) as f64;

    let sqrt = state.sqrt_price as f64 / Q64;
    let price = sqrt * sqrt;
    let raw_out = if a_to_b { net_in * price } else { net_in / price };
    if !raw_out.is_finite() || raw_out < 0.0 {
        bail!("Whirlpool 池 {} 报价异常: {raw_out}", state.address);
    }
    let estimated_amount_out = if raw_out >= u64::MAX as f64 {
        u64::MAX
    } else {
        raw_out.floor() as u64
    };

    let keep = BPS_DENOMINATOR.saturating_sub(u64::from(slippage_bps));
    let minimum_amount_out =
        (u128::from(estimated_amount_out) * u128::from(keep) / u128::from(BPS_DENOMINATOR)) as u64;

    Ok(SpotQuote {
        amount_in,
        estimated_amount_out,
        minimum_amount_out,
    })
}

pub fn sqrt_price_limit(a_to_b: bool) -> u128 {
    if a_to_b {
        MIN_SQRT_PRICE_X64
    } else {
        MAX_SQRT_PRICE_X64
    }
}
