use std::sync::Arc;

use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::v0::Message as V0Message;
use solana_sdk::message::{AddressLookupTableAccount, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use tracing::{debug, warn};

use crate::instructions::compute_budget::is_compute_budget;
use crate::lander::FeeInstructions;

use super::error::{EngineError, EngineResult};
use super::signer::SignedTransaction;

/// blockhash 名义有效期 150 个区块，再留 1 个区块余量。
pub const BLOCKHASH_VALIDITY_BLOCKS: u64 = 151;

/// 外部 swap 构建器产出的未签名交易素材。
#[derive(Clone)]
pub struct BaseTransaction {
    pub payer: Pubkey,
    pub instructions: Vec<Instruction>,
    pub lookup_tables: Vec<AddressLookupTableAccount>,
    /// 构建器自带的辅助签名者（例如临时账户），先于钱包签名。
    pub signers: Vec<Arc<Keypair>>,
}

impl BaseTransaction {
    pub fn new(payer: Pubkey, instructions: Vec<Instruction>) -> Self {
        Self {
            payer,
            instructions,
            lookup_tables: Vec::new(),
            signers: Vec::new(),
        }
    }
}

/// 单次 swap 尝试的交易封装，签名后 blockhash 不再变化。
#[derive(Clone)]
pub struct TransactionEnvelope {
    base_instructions: Vec<Instruction>,
    prepended_instructions: [Instruction; 2],
    recent_blockhash: Hash,
    expiration_block_height: u64,
    transaction: VersionedTransaction,
}

impl TransactionEnvelope {
    pub fn base_instructions(&self) -> &[Instruction] {
        &self.base_instructions
    }

    pub fn prepended_instructions(&self) -> &[Instruction; 2] {
        &self.prepended_instructions
    }

    pub fn recent_blockhash(&self) -> Hash {
        self.recent_blockhash
    }

    pub fn expiration_block_height(&self) -> u64 {
        self.expiration_block_height
    }

    pub fn message(&self) -> &VersionedMessage {
        &self.transaction.message
    }

    /// 最终上链的指令顺序：费用指令在前，业务指令在后。
    pub fn ordered_instructions(&self) -> Vec<Instruction> {
        let mut ordered =
            Vec::with_capacity(self.prepended_instructions.len() + self.base_instructions.len());
        ordered.extend(self.prepended_instructions.iter().cloned());
        ordered.extend(self.base_instructions.iter().cloned());
        ordered
    }

    /// 按签名者在消息中的位置填入签名，可多次调用分阶段签名。
    pub fn sign_with(&mut self, signers: &[&dyn Signer]) -> EngineResult<()> {
        if signers.is_empty() {
            return Ok(());
        }
        let message_bytes = self.transaction.message.serialize();
        let required = usize::from(self.transaction.message.header().num_required_signatures);
        let keys = self.transaction.message.static_account_keys();
        let signer_keys = keys.get(..required).unwrap_or(keys);

        for signer in signers {
            let pubkey = signer.pubkey();
            let position = signer_keys
                .iter()
                .position(|key| *key == pubkey)
                .ok_or_else(|| {
                    EngineError::Signing(format!("签名者 {pubkey} 不在交易所需签名列表中"))
                })?;
            let signature = signer
                .try_sign_message(&message_bytes)
                .map_err(|err| EngineError::Signing(format!("{pubkey} 签名失败: {err}")))?;
            self.transaction.signatures[position] = signature;
        }
        Ok(())
    }

    pub fn missing_signers(&self) -> Vec<Pubkey> {
        let keys = self.transaction.message.static_account_keys();
        self.transaction
            .signatures
            .iter()
            .zip(keys.iter())
            .filter(|(signature, _)| **signature == Signature::default())
            .map(|(_, key)| *key)
            .collect()
    }

    /// 所有签名位均已填充后转换为可广播的交易。
    pub fn into_signed(self) -> EngineResult<SignedTransaction> {
        let missing = self.missing_signers();
        if !missing.is_empty() {
            let listed = missing
                .iter()
                .map(|key| key.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(EngineError::Signing(format!("仍缺少签名: {listed}")));
        }
        SignedTransaction::new(self.transaction, self.expiration_block_height)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransactionAssembler {
    validity_window: u64,
}

impl Default for TransactionAssembler {
    fn default() -> Self {
        Self::new(BLOCKHASH_VALIDITY_BLOCKS)
    }
}

impl TransactionAssembler {
    pub fn new(validity_window: u64) -> Self {
        Self { validity_window }
    }

    pub fn assemble(
        &self,
        base: BaseTransaction,
        fees: &FeeInstructions,
        blockhash: Hash,
        current_block_height: u64,
    ) -> EngineResult<TransactionEnvelope> {
        let BaseTransaction {
            payer,
            instructions,
            lookup_tables,
            signers,
        } = base;

        if instructions.is_empty() {
            return Err(EngineError::Transaction("交易指令不能为空".into()));
        }

        let (dropped, base_instructions): (Vec<Instruction>, Vec<Instruction>) =
            instructions.into_iter().partition(is_compute_budget);
        if !dropped.is_empty() {
            warn!(
                target: "engine::builder",
                dropped = dropped.len(),
                "基础交易自带 compute budget 指令，已替换为本地费用指令"
            );
        }

        let prepended_instructions = [fees.limit.clone(), fees.price.clone()];
        let mut ordered = Vec::with_capacity(2 + base_instructions.len());
        ordered.extend(prepended_instructions.iter().cloned());
        ordered.extend(base_instructions.iter().cloned());

        let message = V0Message::try_compile(&payer, &ordered, &lookup_tables, blockhash)
            .map_err(|err| EngineError::Transaction(format!("编译 v0 消息失败: {err}")))?;
        let message = VersionedMessage::V0(message);
        let required = usize::from(message.header().num_required_signatures);
        let transaction = VersionedTransaction {
            signatures: vec![Signature::default(); required],
            message,
        };

        let expiration_block_height = current_block_height.saturating_add(self.validity_window);
        let mut envelope = TransactionEnvelope {
            base_instructions,
            prepended_instructions,
            recent_blockhash: blockhash,
            expiration_block_height,
            transaction,
        };

        if !signers.is_empty() {
            let refs: Vec<&dyn Signer> = signers
                .iter()
                .map(|signer| signer.as_ref() as &dyn Signer)
                .collect();
            envelope.sign_with(&refs)?;
        }

        debug!(
            target: "engine::builder",
            blockhash = %blockhash,
            current_block_height,
            expiration_block_height,
            auxiliary_signers = signers.len(),
            instructions = ordered.len(),
            "交易组装完成"
        );

        Ok(envelope)
    }
}
