use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

pub const COMPUTE_BUDGET_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("ComputeBudget111111111111111111111111111111");

pub fn compute_unit_limit_instruction(limit: u32) -> Instruction {
    ComputeBudgetInstruction::set_compute_unit_limit(limit)
}

pub fn compute_unit_price_instruction(price_micro_lamports: u64) -> Instruction {
    ComputeBudgetInstruction::set_compute_unit_price(price_micro_lamports)
}

pub fn is_compute_budget(ix: &Instruction) -> bool {
    ix.program_id == COMPUTE_BUDGET_PROGRAM_ID
}
