use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_client::rpc_request::RpcRequest;
use solana_client::rpc_response::{Response as RpcResponse, RpcBlockhash};
use solana_commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::signature::Signature;
use solana_transaction_status_client_types::UiTransactionEncoding;
use tracing::{debug, info};

use crate::engine::SignedTransaction;

use super::error::LanderError;

/// 网络侧观察到的确认级别；`None` 表示节点尚未见到该签名。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfirmationLevel {
    Processed,
    Confirmed,
    Finalized,
}

impl ConfirmationLevel {
    pub fn is_confirmed_or_better(self) -> bool {
        self >= ConfirmationLevel::Confirmed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfirmationLevel::Processed => "processed",
            ConfirmationLevel::Confirmed => "confirmed",
            ConfirmationLevel::Finalized => "finalized",
        }
    }
}

impl fmt::Display for ConfirmationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureState {
    pub level: ConfirmationLevel,
    pub slot: u64,
    /// 交易已上链但执行失败时的错误描述。
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReference {
    pub blockhash: Hash,
    pub slot: u64,
    pub last_valid_block_height: u64,
}

/// 落地流程所需的最小 RPC 能力集合。
#[async_trait]
pub trait LandingRpc: Send + Sync {
    async fn latest_block_reference(&self) -> Result<BlockReference, LanderError>;

    async fn block_height(&self, min_context_slot: Option<u64>) -> Result<u64, LanderError>;

    /// 广播已签名的交易：跳过 preflight，且禁止节点侧重试。
    async fn broadcast(&self, transaction: &SignedTransaction) -> Result<Signature, LanderError>;

    async fn signature_state(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureState>, LanderError>;
}

#[derive(Clone)]
pub struct RpcLander {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
    config: RpcSendTransactionConfig,
}

impl RpcLander {
    pub fn new(client: Arc<RpcClient>, commitment: CommitmentConfig) -> Self {
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            preflight_commitment: Some(commitment.commitment),
            encoding: Some(UiTransactionEncoding::Base64),
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };
        Self {
            client,
            commitment,
            config,
        }
    }

    pub fn send_config(&self) -> &RpcSendTransactionConfig {
        &self.config
    }

    fn commitment_param(&self, min_context_slot: Option<u64>) -> Value {
        let mut config = Map::new();
        config.insert(
            "commitment".to_string(),
            Value::String(commitment_label(self.commitment).to_string()),
        );
        if let Some(slot) = min_context_slot {
            config.insert("minContextSlot".to_string(), json!(slot));
        }
        Value::Object(config)
    }
}

#[async_trait]
impl LandingRpc for RpcLander {
    async fn latest_block_reference(&self) -> Result<BlockReference, LanderError> {
        let response: RpcResponse<RpcBlockhash> = self
            .client
            .send(
                RpcRequest::GetLatestBlockhash,
                json!([self.commitment_param(None)]),
            )
            .await?;
        let blockhash = Hash::from_str(&response.value.blockhash).map_err(|err| {
            LanderError::InvalidResponse(format!(
                "blockhash {} 无法解析: {err}",
                response.value.blockhash
            ))
        })?;
        debug!(
            target: "lander::rpc",
            blockhash = %blockhash,
            slot = response.context.slot,
            last_valid_block_height = response.value.last_valid_block_height,
            "获取最新区块哈希"
        );
        Ok(BlockReference {
            blockhash,
            slot: response.context.slot,
            last_valid_block_height: response.value.last_valid_block_height,
        })
    }

    async fn block_height(&self, min_context_slot: Option<u64>) -> Result<u64, LanderError> {
        let height: u64 = self
            .client
            .send(
                RpcRequest::GetBlockHeight,
                json!([self.commitment_param(min_context_slot)]),
            )
            .await?;
        Ok(height)
    }

    async fn broadcast(&self, transaction: &SignedTransaction) -> Result<Signature, LanderError> {
        let signature = self
            .client
            .send_transaction_with_config(transaction.transaction(), self.config.clone())
            .await?;
        info!(
            target: "lander::rpc",
            signature = %signature,
            endpoint = %self.client.url(),
            skip_preflight = self.config.skip_preflight,
            max_retries = ?self.config.max_retries,
            "transaction submitted via rpc client"
        );
        Ok(signature)
    }

    async fn signature_state(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureState>, LanderError> {
        let response = self.client.get_signature_statuses(&[*signature]).await?;
        let status = response.value.into_iter().next().flatten();
        Ok(status.map(|status| {
            let level = if status.satisfies_commitment(CommitmentConfig::finalized()) {
                ConfirmationLevel::Finalized
            } else if status.satisfies_commitment(CommitmentConfig::confirmed()) {
                ConfirmationLevel::Confirmed
            } else {
                ConfirmationLevel::Processed
            };
            SignatureState {
                level,
                slot: status.slot,
                error: status.err.as_ref().map(|err| format!("{err:?}")),
            }
        }))
    }
}

pub fn commitment_label(commitment: CommitmentConfig) -> &'static str {
    if commitment == CommitmentConfig::finalized() {
        "finalized"
    } else if commitment == CommitmentConfig::confirmed() {
        "confirmed"
    } else {
        "processed"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use solana_client::client_error::Result as ClientResult;
    use solana_client::rpc_client::RpcClientConfig;
    use solana_rpc_client::rpc_sender::{RpcSender, RpcTransportStats};
    use solana_sdk::instruction::{AccountMeta, Instruction};
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::{Keypair, Signer};

    use super::*;
    use crate::engine::{BaseTransaction, TransactionAssembler};
    use crate::lander::compute_fee_instructions;

    /// 记录所有请求，并对 sendTransaction 回放固定签名。
    struct RecordingSender {
        requests: Arc<Mutex<Vec<(RpcRequest, Value)>>>,
        reply_signature: String,
    }

    #[async_trait]
    impl RpcSender for RecordingSender {
        async fn send(&self, request: RpcRequest, params: Value) -> ClientResult<Value> {
            self.requests.lock().unwrap().push((request, params));
            Ok(match request {
                RpcRequest::SendTransaction => Value::String(self.reply_signature.clone()),
                _ => Value::Null,
            })
        }

        fn get_transport_stats(&self) -> RpcTransportStats {
            RpcTransportStats::default()
        }

        fn url(&self) -> String {
            "recording://lander".to_string()
        }
    }

    fn signed_transaction() -> SignedTransaction {
        let wallet = Keypair::new();
        let payer = wallet.pubkey();
        let ix = Instruction {
            program_id: Pubkey::new_unique(),
            accounts: vec![AccountMeta::new(payer, true)],
            data: vec![7],
        };
        let mut envelope = TransactionAssembler::default()
            .assemble(
                BaseTransaction::new(payer, vec![ix]),
                &compute_fee_instructions(100_000, 1_000),
                Hash::new_unique(),
                1_000,
            )
            .unwrap();
        envelope.sign_with(&[&wallet as &dyn Signer]).unwrap();
        envelope.into_signed().unwrap()
    }

    #[test]
    fn send_config_disables_preflight_and_node_retries() {
        let lander = RpcLander::new(
            Arc::new(RpcClient::new("http://127.0.0.1:8899".to_string())),
            CommitmentConfig::confirmed(),
        );
        let config = lander.send_config();
        assert!(config.skip_preflight);
        assert_eq!(config.max_retries, Some(0));
        assert_eq!(config.encoding, Some(UiTransactionEncoding::Base64));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn broadcast_sends_wire_bytes_without_preflight_or_retries() {
        let signed = signed_transaction();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let sender = RecordingSender {
            requests: requests.clone(),
            reply_signature: signed.signature().to_string(),
        };
        let client = RpcClient::new_sender(
            sender,
            RpcClientConfig::with_commitment(CommitmentConfig::confirmed()),
        );
        let lander = RpcLander::new(Arc::new(client), CommitmentConfig::confirmed());

        let returned = lander.broadcast(&signed).await.expect("broadcast");
        assert_eq!(returned, signed.signature());

        let requests = requests.lock().unwrap();
        let (request, params) = requests
            .iter()
            .find(|(request, _)| *request == RpcRequest::SendTransaction)
            .expect("sendTransaction request");
        assert_eq!(*request, RpcRequest::SendTransaction);
        assert_eq!(params[1]["skipPreflight"], json!(true));
        assert_eq!(params[1]["maxRetries"], json!(0));
        assert_eq!(params[1]["encoding"], json!("base64"));

        let encoded = params[0].as_str().expect("encoded transaction");
        let bytes = BASE64_STANDARD.decode(encoded).expect("base64");
        assert_eq!(bytes, signed.wire());
    }

    #[test]
    fn confirmation_ordering() {
        assert!(!ConfirmationLevel::Processed.is_confirmed_or_better());
        assert!(ConfirmationLevel::Confirmed.is_confirmed_or_better());
        assert!(ConfirmationLevel::Finalized.is_confirmed_or_better());
    }

    #[test]
    fn commitment_labels() {
        assert_eq!(commitment_label(CommitmentConfig::confirmed()), "confirmed");
        assert_eq!(commitment_label(CommitmentConfig::finalized()), "finalized");
        assert_eq!(commitment_label(CommitmentConfig::processed()), "processed");
    }

    #[test]
    fn commitment_param_carries_min_context_slot() {
        let lander = RpcLander::new(
            Arc::new(RpcClient::new("http://127.0.0.1:8899".to_string())),
            CommitmentConfig::confirmed(),
        );
        assert_eq!(
            lander.commitment_param(Some(42)),
            json!({"commitment": "confirmed", "minContextSlot": 42})
        );
        assert_eq!(
            lander.commitment_param(None),
            json!({"commitment": "confirmed"})
        );
    }
}
