use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bs58;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

use crate::config::WalletConfig;

use super::error::{EngineError, EngineResult};

pub const PRIVATE_KEY_ENV: &str = "SWAP_LANDER_PRIVATE_KEY";
const DEFAULT_KEYPAIR_RELATIVE: &str = ".config/solana/id.json";

#[derive(Clone)]
pub struct EngineIdentity {
    pub pubkey: Pubkey,
    pub signer: Arc<Keypair>,
}

impl EngineIdentity {
    pub fn from_wallet(wallet: &WalletConfig) -> EngineResult<Self> {
        let env_key = env::var(PRIVATE_KEY_ENV).ok();
        let signer = load_keypair(wallet, env_key.as_deref(), default_keypair_path())?;
        Ok(Self {
            pubkey: signer.pubkey(),
            signer,
        })
    }
}

fn default_keypair_path() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(DEFAULT_KEYPAIR_RELATIVE))
}

fn load_keypair(
    wallet: &WalletConfig,
    env_key: Option<&str>,
    default_path: Option<PathBuf>,
) -> EngineResult<Arc<Keypair>> {
    if let Some(value) = env_key.filter(|value| !value.trim().is_empty()) {
        let keypair = parse_keypair_string(value.trim()).map_err(|err| {
            EngineError::InvalidConfig(format!("环境变量 {PRIVATE_KEY_ENV} 非法: {err}"))
        })?;
        return Ok(Arc::new(keypair));
    }

    if !wallet.private_key.trim().is_empty() {
        let keypair = parse_keypair_string(wallet.private_key.trim()).map_err(|err| {
            EngineError::InvalidConfig(format!("配置 global.wallet.private_key 非法: {err}"))
        })?;
        return Ok(Arc::new(keypair));
    }

    let path = wallet.keypair_path.clone().or(default_path).ok_or_else(|| {
        EngineError::InvalidConfig("无法确定钱包文件路径，请设置 global.wallet.keypair_path".into())
    })?;
    read_keypair_file(&path).map(Arc::new)
}

fn read_keypair_file(path: &Path) -> EngineResult<Keypair> {
    if !path.exists() {
        return Err(EngineError::InvalidConfig(format!(
            "钱包文件不存在: {}",
            path.display()
        )));
    }
    let contents = fs::read_to_string(path).map_err(|err| {
        EngineError::InvalidConfig(format!("读取钱包文件 {} 失败: {err}", path.display()))
    })?;
    parse_keypair_string(&contents).map_err(|err| {
        EngineError::InvalidConfig(format!("钱包文件 {} 格式非法: {err}", path.display()))
    })
}

fn parse_keypair_string(raw: &str) -> Result<Keypair, anyhow::Error> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("keypair string empty");
    }

    if trimmed.starts_with('[') {
        let bytes: Vec<u8> = serde_json::from_str(trimmed)?;
        Ok(Keypair::try_from(bytes.as_slice())?)
    } else if trimmed.contains(',') {
        let bytes = trimmed
            .split(',')
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<u8>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Keypair::try_from(bytes.as_slice())?)
    } else {
        let data = bs58::decode(trimmed).into_vec()?;
        Ok(Keypair::try_from(data.as_slice())?)
    }
}
