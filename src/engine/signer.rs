use std::sync::Arc;

use async_trait::async_trait;
use bincode::config::legacy;
use bincode::serde::encode_to_vec;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;

use super::builder::TransactionEnvelope;
use super::error::{EngineError, EngineResult};

/// 已签名交易：线上字节在构造时一次性确定，重发时原样复用。
#[derive(Clone)]
pub struct SignedTransaction {
    transaction: VersionedTransaction,
    wire: Vec<u8>,
    signature: Signature,
    expiration_block_height: u64,
}

impl SignedTransaction {
    pub fn new(transaction: VersionedTransaction, expiration_block_height: u64) -> EngineResult<Self> {
        let signature = transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| EngineError::Signing("交易缺少主签名".into()))?;
        let wire = encode_to_vec(&transaction, legacy())?;
        Ok(Self {
            transaction,
            wire,
            signature,
            expiration_block_height,
        })
    }

    pub fn transaction(&self) -> &VersionedTransaction {
        &self.transaction
    }

    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn recent_blockhash(&self) -> Hash {
        *self.transaction.message.recent_blockhash()
    }

    pub fn expiration_block_height(&self) -> u64 {
        self.expiration_block_height
    }
}

/// 钱包签名边界：接收组装好的交易，返回主签名已就位的交易。
#[async_trait]
pub trait SigningAdapter: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    async fn sign(&self, envelope: TransactionEnvelope) -> EngineResult<SignedTransaction>;
}

#[derive(Clone)]
pub struct KeypairSigner {
    signer: Arc<Keypair>,
}

impl KeypairSigner {
    pub fn new(signer: Arc<Keypair>) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl SigningAdapter for KeypairSigner {
    fn pubkey(&self) -> Pubkey {
        self.signer.pubkey()
    }

    async fn sign(&self, mut envelope: TransactionEnvelope) -> EngineResult<SignedTransaction> {
        envelope.sign_with(&[self.signer.as_ref() as &dyn Signer])?;
        envelope.into_signed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::builder::{BaseTransaction, TransactionAssembler};
    use crate::lander::compute_fee_instructions;
    use solana_sdk::instruction::{AccountMeta, Instruction};

    fn envelope_for(payer: &Pubkey) -> TransactionEnvelope {
        let ix = Instruction {
            program_id: Pubkey::new_unique(),
            accounts: vec![AccountMeta::new(*payer, true)],
            data: vec![1],
        };
        TransactionAssembler::default()
            .assemble(
                BaseTransaction::new(*payer, vec![ix]),
                &compute_fee_instructions(100_000, 1_000),
                Hash::new_unique(),
                1_000,
            )
            .expect("assemble")
    }

    #[tokio::test(flavor = "current_thread")]
    async fn keypair_signer_produces_primary_signature() {
        let wallet = Arc::new(Keypair::new());
        let signer = KeypairSigner::new(wallet.clone());
        let envelope = envelope_for(&wallet.pubkey());

        let signed = signer.sign(envelope).await.expect("signed");

        assert_eq!(signed.signature(), signed.transaction().signatures[0]);
        assert_ne!(signed.signature(), Signature::default());
        assert_eq!(signed.expiration_block_height(), 1_151);
        assert!(!signed.wire().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn wire_bytes_are_deterministic() {
        let wallet = Arc::new(Keypair::new());
        let signer = KeypairSigner::new(wallet.clone());
        let envelope = envelope_for(&wallet.pubkey());

        let first = signer.sign(envelope.clone()).await.expect("signed");
        let second = signer.sign(envelope).await.expect("signed");

        assert_eq!(first.wire(), second.wire());
        assert_eq!(first.signature(), second.signature());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn wrong_wallet_cannot_sign() {
        let wallet = Keypair::new();
        let other = KeypairSigner::new(Arc::new(Keypair::new()));
        let envelope = envelope_for(&wallet.pubkey());

        assert!(other.sign(envelope).await.is_err());
    }
}
