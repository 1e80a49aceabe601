use anyhow::{Context, Result, anyhow, bail, ensure};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

use yellowstone_vixen_orca_whirlpool_parser::accounts::Whirlpool;
use yellowstone_vixen_orca_whirlpool_parser::accounts_parser::WhirlpoolProgramState;

pub const ORCA_WHIRLPOOL_PROGRAM_ID: Pubkey =
    pubkey!("whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc");

const TICK_ARRAY_SEED: &[u8] = b"tick_array";
const TICK_ARRAY_SIZE: i32 = 88;
/// SPL Mint 布局中 decimals 字段的偏移。
const MINT_DECIMALS_OFFSET: usize = 44;

/// 一次 swap 所需的池子快照。
#[derive(Debug, Clone)]
pub struct WhirlpoolState {
    pub address: Pubkey,
    pub token_mint_a: Pubkey,
    pub token_mint_b: Pubkey,
    pub token_vault_a: Pubkey,
    pub token_vault_b: Pubkey,
    pub token_program: Pubkey,
    pub decimals_a: u8,
    pub decimals_b: u8,
    pub sqrt_price: u128,
    pub liquidity: u128,
    pub tick_current_index: i32,
    pub tick_spacing: u16,
    /// 百万分之一为单位。
    pub fee_rate: u16,
}

impl WhirlpoolState {
    pub fn uses_token_2022(&self) -> bool {
        self.token_program == token_program_pubkey_2022()
    }

    pub fn oracle(&self) -> Pubkey {
        derive_oracle_address(&self.address)
    }

    /// 按交换方向排列的三个 tick array 地址。
    pub fn tick_arrays(&self, a_to_b: bool) -> [Pubkey; 3] {
        derive_tick_array_start_indexes(self.tick_current_index, self.tick_spacing, a_to_b)
            .map(|start| derive_tick_array_address(&self.address, start, &ORCA_WHIRLPOOL_PROGRAM_ID))
    }
}

pub async fn fetch_whirlpool_state(client: &RpcClient, pool: Pubkey) -> Result<WhirlpoolState> {
    let account = client
        .get_account(&pool)
        .await
        .map_err(|err| anyhow!(err))
        .with_context(|| format!("获取 Whirlpool 池 {pool} 账户失败"))?;
    ensure!(
        account.owner == ORCA_WHIRLPOOL_PROGRAM_ID,
        "Whirlpool 池 {pool} 的 owner ({}) 与预期不符",
        account.owner
    );

    let whirlpool = decode_whirlpool(&account.data)
        .with_context(|| format!("解析 Whirlpool 池 {pool} 账户数据失败"))?;

    let vault_a = to_sdk_pubkey(&whirlpool.token_vault_a)?;
    let vault_b = to_sdk_pubkey(&whirlpool.token_vault_b)?;
    let mint_a = to_sdk_pubkey(&whirlpool.token_mint_a)?;
    let mint_b = to_sdk_pubkey(&whirlpool.token_mint_b)?;

    let accounts = client
        .get_multiple_accounts(&[vault_a, vault_b, mint_a, mint_b])
        .await
        .map_err(|err| anyhow!(err))
        .with_context(|| format!("获取 Whirlpool 池 {pool} 的 vault / mint 账户"))?;

    let fetched = |index: usize, label: &str, key: &Pubkey| {
        accounts
            .get(index)
            .and_then(|acc| acc.as_ref())
            .ok_or_else(|| anyhow!("Whirlpool 池 {pool} 缺少 {label} 账户 {key}"))
    };
    let vault_a_account = fetched(0, "token_vault_a", &vault_a)?;
    let vault_b_account = fetched(1, "token_vault_b", &vault_b)?;
    let mint_a_account = fetched(2, "token_mint_a", &mint_a)?;
    let mint_b_account = fetched(3, "token_mint_b", &mint_b)?;

    if vault_a_account.owner != vault_b_account.owner {
        bail!(
            "Whirlpool 池 {pool} 出现跨不同 Token Program 的资产: {} vs {}",
            vault_a_account.owner,
            vault_b_account.owner
        );
    }

    Ok(WhirlpoolState {
        address: pool,
        token_mint_a: mint_a,
        token_mint_b: mint_b,
        token_vault_a: vault_a,
        token_vault_b: vault_b,
        token_program: vault_a_account.owner,
        decimals_a: mint_decimals(&mint_a_account.data)
            .with_context(|| format!("读取 mint {mint_a} 精度失败"))?,
        decimals_b: mint_decimals(&mint_b_account.data)
            .with_context(|| format!("读取 mint {mint_b} 精度失败"))?,
        sqrt_price: whirlpool.sqrt_price,
        liquidity: whirlpool.liquidity,
        tick_current_index: whirlpool.tick_current_index,
        tick_spacing: whirlpool.tick_spacing,
        fee_rate: whirlpool.fee_rate,
    })
}

fn decode_whirlpool(data: &[u8]) -> Result<Whirlpool> {
    match WhirlpoolProgramState::try_unpack(data)
        .map_err(|err| anyhow!("解析 Whirlpool 池账户失败: {:?}", err))?
    {
        WhirlpoolProgramState::Whirlpool(pool) => Ok(pool),
        other => bail!("账户不是 Whirlpool PoolState，实际为 {:?}", other),
    }
}

fn mint_decimals(data: &[u8]) -> Result<u8> {
    data.get(MINT_DECIMALS_OFFSET)
        .copied()
        .ok_or_else(|| anyhow!("mint 账户数据长度不足: {}", data.len()))
}

fn derive_oracle_address(pool: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"oracle", pool.as_ref()], &ORCA_WHIRLPOOL_PROGRAM_ID).0
}

fn derive_tick_array_start_indexes(curr_tick: i32, tick_spacing: u16, a_to_b: bool) -> [i32; 3] {
    let first = derive_first_tick_array_start_tick(curr_tick, tick_spacing, !a_to_b);
    let second = derive_next_start_tick(first, tick_spacing, a_to_b);
    let third = derive_next_start_tick(second, tick_spacing, a_to_b);
    [first, second, third]
}

fn derive_first_tick_array_start_tick(curr_tick: i32, tick_spacing: u16, shifted: bool) -> i32 {
    let tick = if shifted {
        curr_tick + tick_spacing as i32
    } else {
        curr_tick
    };
    derive_start_tick(tick, tick_spacing)
}

fn derive_start_tick(tick: i32, tick_spacing: u16) -> i32 {
    let ticks_per_array = TICK_ARRAY_SIZE * tick_spacing as i32;
    let rem = tick % ticks_per_array;
    if tick < 0 && rem != 0 {
        tick - rem - ticks_per_array
    } else {
        tick - rem
    }
}

fn derive_next_start_tick(start_tick: i32, tick_spacing: u16, a_to_b: bool) -> i32 {
    let ticks_per_array = TICK_ARRAY_SIZE * tick_spacing as i32;
    if a_to_b {
        start_tick - ticks_per_array
    } else {
        start_tick + ticks_per_array
    }
}

fn derive_tick_array_address(pool: &Pubkey, start_tick: i32, program_id: &Pubkey) -> Pubkey {
    let start_bytes = start_tick.to_string();
    Pubkey::find_program_address(
        &[TICK_ARRAY_SEED, pool.as_ref(), start_bytes.as_bytes()],
        program_id,
    )
    .0
}

fn to_sdk_pubkey(pk: &impl AsRef<[u8]>) -> Result<Pubkey> {
    let bytes: [u8; 32] = pk
        .as_ref()
        .try_into()
        .map_err(|_| anyhow!("pubkey 长度非法: {}", pk.as_ref().len()))?;
    Ok(Pubkey::new_from_array(bytes))
}

fn token_program_pubkey_2022() -> Pubkey {
    Pubkey::new_from_array(spl_token_2022::ID.to_bytes())
}
