use std::sync::Arc;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::engine::{
    BaseTransaction, EngineError, EngineResult, PreparedSwap, SwapBuilder, SwapQuote, SwapRequest,
};
use crate::instructions::wsol;

use super::decoder::{ORCA_WHIRLPOOL_PROGRAM_ID, WhirlpoolState, fetch_whirlpool_state};
use super::quote::{quote_exact_in, sqrt_price_limit, ui_amount_to_atoms};

const SWAP_DISCRIMINATOR: [u8; 8] = [248, 198, 158, 145, 225, 117, 135, 200];
const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");
const SYSTEM_PROGRAM_ID: Pubkey = pubkey!("11111111111111111111111111111111");

/// 通过链上 Whirlpool 池构建单池 swap。
pub struct WhirlpoolSwapBuilder {
    rpc: Arc<RpcClient>,
    pool: Pubkey,
    slippage_bps: u16,
}

impl WhirlpoolSwapBuilder {
    pub fn new(rpc: Arc<RpcClient>, pool: Pubkey, slippage_bps: u16) -> Self {
        Self {
            rpc,
            pool,
            slippage_bps,
        }
    }
}

#[async_trait]
impl SwapBuilder for WhirlpoolSwapBuilder {
    async fn build_swap(&self, payer: Pubkey, request: &SwapRequest) -> EngineResult<PreparedSwap> {
        let state = fetch_whirlpool_state(&self.rpc, self.pool).await?;
        debug!(
            target: "dexes::whirlpool",
            pool = %state.address,
            sqrt_price = state.sqrt_price,
            tick = state.tick_current_index,
            fee_rate = state.fee_rate,
            "Whirlpool 池状态已拉取"
        );
        prepare_swap(&state, payer, request, self.slippage_bps)
    }
}

pub(crate) fn prepare_swap(
    state: &WhirlpoolState,
    payer: Pubkey,
    request: &SwapRequest,
    slippage_bps: u16,
) -> EngineResult<PreparedSwap> {
    if state.uses_token_2022() {
        return Err(EngineError::Transaction(format!(
            "Whirlpool 池 {} 使用 Token-2022，暂不支持",
            state.address
        )));
    }

    let a_to_b = request.direction.a_to_b();
    let (input_decimals, output_decimals) = if a_to_b {
        (state.decimals_a, state.decimals_b)
    } else {
        (state.decimals_b, state.decimals_a)
    };
    let amount_in = ui_amount_to_atoms(&request.amount, input_decimals)?;
    let spot = quote_exact_in(state, amount_in, a_to_b, slippage_bps)?;

    let owner_a = derive_associated_token_address(&payer, &state.token_mint_a, &state.token_program);
    let owner_b = derive_associated_token_address(&payer, &state.token_mint_b, &state.token_program);

    let (input_mint, input_account) = if a_to_b {
        (state.token_mint_a, owner_a)
    } else {
        (state.token_mint_b, owner_b)
    };
    let wsol_account = if wsol::is_wsol(&state.token_mint_a) {
        Some(owner_a)
    } else if wsol::is_wsol(&state.token_mint_b) {
        Some(owner_b)
    } else {
        None
    };

    let mut instructions = vec![
        build_create_associated_token_account_idempotent(
            &payer,
            &state.token_mint_a,
            &state.token_program,
        ),
        build_create_associated_token_account_idempotent(
            &payer,
            &state.token_mint_b,
            &state.token_program,
        ),
    ];
    if wsol::is_wsol(&input_mint) {
        instructions.extend(wsol::wrap_instructions(&payer, &input_account, amount_in)?);
    }
    instructions.push(build_swap_instruction(
        state,
        payer,
        owner_a,
        owner_b,
        amount_in,
        spot.minimum_amount_out,
        a_to_b,
    ));
    if let Some(account) = wsol_account {
        instructions.push(wsol::unwrap_instruction(&payer, &account)?);
    }

    Ok(PreparedSwap {
        base: BaseTransaction::new(payer, instructions),
        quote: SwapQuote {
            a_to_b,
            amount_in: spot.amount_in,
            estimated_amount_out: spot.estimated_amount_out,
            minimum_amount_out: spot.minimum_amount_out,
            input_decimals,
            output_decimals,
        },
    })
}

fn build_swap_instruction(
    state: &WhirlpoolState,
    authority: Pubkey,
    owner_a: Pubkey,
    owner_b: Pubkey,
    amount: u64,
    other_amount_threshold: u64,
    a_to_b: bool,
) -> Instruction {
    let mut data = Vec::with_capacity(8 + 8 + 8 + 16 + 1 + 1);
    data.extend_from_slice(&SWAP_DISCRIMINATOR);
    data.extend_from_slice(&amount.to_le_bytes());
    data.extend_from_slice(&other_amount_threshold.to_le_bytes());
    data.extend_from_slice(&sqrt_price_limit(a_to_b).to_le_bytes());
    data.push(1); // amount_specified_is_input
    data.push(u8::from(a_to_b));

    let [tick_0, tick_1, tick_2] = state.tick_arrays(a_to_b);
    Instruction {
        program_id: ORCA_WHIRLPOOL_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new_readonly(state.token_program, false),
            AccountMeta::new_readonly(authority, true),
            AccountMeta::new(state.address, false),
            AccountMeta::new(owner_a, false),
            AccountMeta::new(state.token_vault_a, false),
            AccountMeta::new(owner_b, false),
            AccountMeta::new(state.token_vault_b, false),
            AccountMeta::new(tick_0, false),
            AccountMeta::new(tick_1, false),
            AccountMeta::new(tick_2, false),
            AccountMeta::new_readonly(state.oracle(), false),
        ],
        data,
    }
}

fn derive_associated_token_address(
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Pubkey {
    let seeds: [&[u8]; 3] = [owner.as_ref(), token_program.as_ref(), mint.as_ref()];
    Pubkey::find_program_address(&seeds, &ASSOCIATED_TOKEN_PROGRAM_ID).0
}

fn build_create_associated_token_account_idempotent(
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Instruction {
    let associated = derive_associated_token_address(owner, mint, token_program);
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(associated, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(*token_program, false),
        ],
        data: vec![1u8],
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;
    use crate::dexes::whirlpool::quote::MIN_SQRT_PRICE_X64;
    use crate::engine::SwapDirection;

    fn token_program() -> Pubkey {
        Pubkey::new_from_array(spl_token::ID.to_bytes())
    }

    fn pool_state() -> WhirlpoolState {
        WhirlpoolState {
            address: Pubkey::new_unique(),
            token_mint_a: Pubkey::new_unique(),
            token_mint_b: Pubkey::new_unique(),
            token_vault_a: Pubkey::new_unique(),
            token_vault_b: Pubkey::new_unique(),
            token_program: token_program(),
            decimals_a: 9,
            decimals_b: 6,
            sqrt_price: 1u128 << 64,
            liquidity: 5_000_000_000,
            tick_current_index: -3,
            tick_spacing: 64,
            fee_rate: 3_000,
        }
    }

    #[test]
    fn a_to_b_swap_layout() {
        let state = pool_state();
        let payer = Pubkey::new_unique();
        let request = SwapRequest::new(SwapDirection::AToB, Decimal::from_str("0.001").unwrap());

        let prepared = prepare_swap(&state, payer, &request, 100).unwrap();

        assert_eq!(prepared.quote.amount_in, 1_000_000);
        assert_eq!(prepared.quote.input_decimals, 9);
        assert_eq!(prepared.quote.output_decimals, 6);

        let ixs = &prepared.base.instructions;
        assert_eq!(ixs.len(), 3);
        assert_eq!(ixs[0].program_id, ASSOCIATED_TOKEN_PROGRAM_ID);
        assert_eq!(ixs[0].data, vec![1u8]);

        let swap = &ixs[2];
        assert_eq!(swap.program_id, ORCA_WHIRLPOOL_PROGRAM_ID);
        assert_eq!(swap.accounts.len(), 11);
        assert_eq!(swap.accounts[1].pubkey, payer);
        assert!(swap.accounts[1].is_signer);
        assert_eq!(swap.accounts[3].pubkey, ixs[0].accounts[1].pubkey);
        assert_eq!(swap.accounts[5].pubkey, ixs[1].accounts[1].pubkey);
        assert!(!swap.accounts[10].is_writable);

        assert_eq!(&swap.data[..8], &SWAP_DISCRIMINATOR);
        assert_eq!(u64::from_le_bytes(swap.data[8..16].try_into().unwrap()), 1_000_000);
        assert_eq!(
            u64::from_le_bytes(swap.data[16..24].try_into().unwrap()),
            prepared.quote.minimum_amount_out
        );
        assert_eq!(
            u128::from_le_bytes(swap.data[24..40].try_into().unwrap()),
            MIN_SQRT_PRICE_X64
        );
        assert_eq!(&swap.data[40..], &[1, 1]);
    }

    #[test]
    fn b_to_a_uses_token_b_decimals() {
        let state = pool_state();
        let request = SwapRequest::new(SwapDirection::BToA, Decimal::from_str("0.5").unwrap());
        let prepared = prepare_swap(&state, Pubkey::new_unique(), &request, 100).unwrap();

        assert_eq!(prepared.quote.amount_in, 500_000);
        assert!(!prepared.quote.a_to_b);
        let swap = &prepared.base.instructions[2];
        assert_eq!(swap.data[41], 0);
        assert_ne!(swap.accounts[7].pubkey, state.tick_arrays(true)[0]);
    }

    fn swap_position(ixs: &[Instruction]) -> usize {
        ixs.iter()
            .position(|ix| ix.program_id == ORCA_WHIRLPOOL_PROGRAM_ID)
            .expect("swap instruction")
    }

    #[test]
    fn native_sol_input_is_wrapped_and_closed() {
        let mut state = pool_state();
        state.token_mint_a = wsol::WSOL_MINT;
        let payer = Pubkey::new_unique();
        let request = SwapRequest::new(SwapDirection::AToB, Decimal::from_str("0.001").unwrap());

        let prepared = prepare_swap(&state, payer, &request, 100).unwrap();
        let ixs = &prepared.base.instructions;
        let wsol_ata = ixs[0].accounts[1].pubkey;

        assert_eq!(ixs.len(), 6);
        assert_eq!(swap_position(ixs), 4);
        assert_eq!(ixs[2].program_id, SYSTEM_PROGRAM_ID);
        assert_eq!(ixs[2].accounts[1].pubkey, wsol_ata);
        assert_eq!(&ixs[2].data[4..], &prepared.quote.amount_in.to_le_bytes());
        assert_eq!(ixs[3].program_id, token_program());
        assert_eq!(ixs[3].data, vec![17]);

        let close = &ixs[5];
        assert_eq!(close.program_id, token_program());
        assert_eq!(close.data, vec![9]);
        assert_eq!(close.accounts[0].pubkey, wsol_ata);
        assert_eq!(close.accounts[1].pubkey, payer);
    }

    #[test]
    fn native_sol_output_is_closed_without_wrap() {
        let mut state = pool_state();
        state.token_mint_a = wsol::WSOL_MINT;
        let payer = Pubkey::new_unique();
        let request = SwapRequest::new(SwapDirection::BToA, Decimal::from_str("0.5").unwrap());

        let prepared = prepare_swap(&state, payer, &request, 100).unwrap();
        let ixs = &prepared.base.instructions;

        assert_eq!(ixs.len(), 4);
        assert_eq!(swap_position(ixs), 2);
        assert!(ixs.iter().all(|ix| ix.program_id != SYSTEM_PROGRAM_ID));
        assert_eq!(ixs[3].data, vec![9]);
        assert_eq!(ixs[3].accounts[0].pubkey, ixs[0].accounts[1].pubkey);
    }

    #[test]
    fn token_2022_pool_is_rejected() {
        let mut state = pool_state();
        state.token_program = Pubkey::new_from_array(spl_token_2022::ID.to_bytes());
        let request = SwapRequest::new(SwapDirection::AToB, Decimal::ONE);
        assert!(matches!(
            prepare_swap(&state, Pubkey::new_unique(), &request, 100),
            Err(EngineError::Transaction(_))
        ));
    }
}
