use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::engine::{EngineError, EngineResult};

pub const WSOL_MINT: Pubkey = solana_sdk::pubkey!("So11111111111111111111111111111111111111112");
const SPL_TOKEN_PROGRAM: Pubkey = spl_token::ID;
const SYSTEM_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("11111111111111111111111111111111");
const SYSTEM_TRANSFER_TAG: u32 = 2;

pub fn is_wsol(mint: &Pubkey) -> bool {
    *mint == WSOL_MINT
}

/// 把原生 SOL 转入已创建的 WSOL ATA 并同步余额（转账 + sync）。
pub fn wrap_instructions(owner: &Pubkey, ata: &Pubkey, lamports: u64) -> EngineResult<Vec<Instruction>> {
    let sync = spl_token::instruction::sync_native(&SPL_TOKEN_PROGRAM, ata)
        .map_err(|err| EngineError::Transaction(format!("WSOL sync_native 构建失败: {err}")))?;
    Ok(vec![build_transfer_instruction(*owner, *ata, lamports), sync])
}

/// 关闭 WSOL ATA，余额以原生 SOL 退回 owner。
pub fn unwrap_instruction(owner: &Pubkey, ata: &Pubkey) -> EngineResult<Instruction> {
    spl_token::instruction::close_account(&SPL_TOKEN_PROGRAM, ata, owner, owner, &[])
        .map_err(|err| EngineError::Transaction(format!("WSOL close_account 构建失败: {err}")))
}

fn build_transfer_instruction(owner: Pubkey, ata: Pubkey, lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_TAG.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::new(owner, true), AccountMeta::new(ata, false)],
        data,
    }
}
