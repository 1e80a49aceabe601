use std::fmt;
use std::time::Duration;

use solana_sdk::signature::Signature;
use tracing::{debug, info, warn};

use crate::engine::SignedTransaction;
use crate::monitoring::events;

use super::rpc::{ConfirmationLevel, LandingRpc};

pub const DEFAULT_MAX_ATTEMPTS: usize = 10;
pub const DEFAULT_CONFIRM_WAIT: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandingSchedule {
    pub max_attempts: usize,
    /// 广播后首次查询状态前的等待。
    pub confirm_wait: Duration,
    /// 未确认时进入下一轮前的等待。
    pub retry_wait: Duration,
}

impl Default for LandingSchedule {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            confirm_wait: DEFAULT_CONFIRM_WAIT,
            retry_wait: DEFAULT_RETRY_WAIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LandingOutcome {
    Confirmed {
        level: ConfirmationLevel,
        slot: u64,
        error: Option<String>,
    },
    Expired {
        block_height: u64,
    },
    Exhausted,
}

impl LandingOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            LandingOutcome::Confirmed { .. } => "confirmed",
            LandingOutcome::Expired { .. } => "expired",
            LandingOutcome::Exhausted => "exhausted",
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, LandingOutcome::Confirmed { .. })
    }
}

impl fmt::Display for LandingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LandingOutcome::Confirmed { level, slot, error: None } => {
                write!(f, "交易已确认 ({level}, slot {slot})")
            }
            LandingOutcome::Confirmed {
                level,
                slot,
                error: Some(err),
            } => write!(f, "交易已上链但执行失败 ({level}, slot {slot}): {err}"),
            LandingOutcome::Expired { block_height } => {
                write!(f, "交易已过期 (区块高度 {block_height})")
            }
            LandingOutcome::Exhausted => f.write_str("重试次数耗尽，交易未确认"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingReport {
    pub signature: Signature,
    pub outcome: LandingOutcome,
    /// 已开始的尝试轮数（含检测到过期的那一轮）。
    pub attempts: usize,
    pub broadcasts: usize,
}

/// 单笔已签名交易的广播 / 等待 / 查询循环，终态后不再复用。
pub struct SubmissionLoop<'a, R: LandingRpc + ?Sized> {
    rpc: &'a R,
    schedule: LandingSchedule,
}

impl<'a, R: LandingRpc + ?Sized> SubmissionLoop<'a, R> {
    pub fn new(rpc: &'a R, schedule: LandingSchedule) -> Self {
        Self { rpc, schedule }
    }

    pub async fn land(&self, transaction: &SignedTransaction) -> LandingReport {
        let signature = transaction.signature();
        let expiration = transaction.expiration_block_height();
        let mut broadcasts = 0usize;

        for attempt in 0..self.schedule.max_attempts {
            let last_attempt = attempt + 1 == self.schedule.max_attempts;

            match self.rpc.block_height(None).await {
                Ok(height) if height >= expiration => {
                    info!(
                        target: "lander::submission",
                        signature = %signature,
                        attempt,
                        block_height = height,
                        expiration,
                        "交易已过期，停止广播"
                    );
                    return self.finish(
                        signature,
                        LandingOutcome::Expired {
                            block_height: height,
                        },
                        attempt + 1,
                        broadcasts,
                    );
                }
                Ok(height) => {
                    debug!(
                        target: "lander::submission",
                        signature = %signature,
                        attempt,
                        blocks_left = expiration - height,
                        "交易仍在有效期内"
                    );
                }
                Err(err) => {
                    warn!(
                        target: "lander::submission",
                        signature = %signature,
                        attempt,
                        transient = err.is_transient(),
                        error = %err,
                        "读取区块高度失败，本轮跳过广播"
                    );
                    if !last_attempt {
                        tokio::time::sleep(self.schedule.retry_wait).await;
                    }
                    continue;
                }
            }

            broadcasts += 1;
            match self.rpc.broadcast(transaction).await {
                Ok(returned) => {
                    if returned != signature {
                        warn!(
                            target: "lander::submission",
                            expected = %signature,
                            returned = %returned,
                            "节点返回的签名与本地不一致"
                        );
                    }
                    events::landing_broadcast(attempt, true);
                }
                Err(err) => {
                    warn!(
                        target: "lander::submission",
                        signature = %signature,
                        attempt,
                        transient = err.is_transient(),
                        error = %err,
                        "广播失败，等待下一轮"
                    );
                    events::landing_broadcast(attempt, false);
                }
            }

            tokio::time::sleep(self.schedule.confirm_wait).await;

            match self.rpc.signature_state(&signature).await {
                Ok(Some(state)) if state.level.is_confirmed_or_better() => {
                    return self.finish(
                        signature,
                        LandingOutcome::Confirmed {
                            level: state.level,
                            slot: state.slot,
                            error: state.error,
                        },
                        attempt + 1,
                        broadcasts,
                    );
                }
                Ok(state) => {
                    debug!(
                        target: "lander::submission",
                        signature = %signature,
                        attempt,
                        status = state.as_ref().map(|s| s.level.as_str()).unwrap_or("absent"),
                        "交易尚未确认"
                    );
                }
                Err(err) => {
                    warn!(
                        target: "lander::submission",
                        signature = %signature,
                        attempt,
                        transient = err.is_transient(),
                        error = %err,
                        "查询签名状态失败"
                    );
                }
            }

            if !last_attempt {
                tokio::time::sleep(self.schedule.retry_wait).await;
            }
        }

        self.finish(
            signature,
            LandingOutcome::Exhausted,
            self.schedule.max_attempts,
            broadcasts,
        )
    }

    fn finish(
        &self,
        signature: Signature,
        outcome: LandingOutcome,
        attempts: usize,
        broadcasts: usize,
    ) -> LandingReport {
        let report = LandingReport {
            signature,
            outcome,
            attempts,
            broadcasts,
        };
        events::landing_outcome(&report);
        report
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use solana_sdk::hash::Hash;
    use solana_sdk::instruction::{AccountMeta, Instruction};
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::{Keypair, Signer};
    use tokio::time::Instant;

    use super::*;
    use crate::engine::{BaseTransaction, TransactionAssembler};
    use crate::lander::rpc::{BlockReference, SignatureState};
    use crate::lander::{LanderError, compute_fee_instructions};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Height(u64),
        Broadcast(Vec<u8>),
        Status,
    }

    /// 按脚本回放区块高度与签名状态的 RPC 替身。
    #[derive(Default)]
    struct ScriptedRpc {
        heights: Mutex<VecDeque<Result<u64, LanderError>>>,
        statuses: Mutex<VecDeque<Result<Option<SignatureState>, LanderError>>>,
        broadcast_failures: Mutex<VecDeque<bool>>,
        calls: Mutex<Vec<Call>>,
        signature: Mutex<Option<Signature>>,
    }

    impl ScriptedRpc {
        fn with_heights(self, heights: impl IntoIterator<Item = u64>) -> Self {
            self.heights
                .lock()
                .unwrap()
                .extend(heights.into_iter().map(Ok));
            self
        }

        fn push_height_error(&self) {
            self.heights
                .lock()
                .unwrap()
                .push_back(Err(LanderError::InvalidResponse("timeout".into())));
        }

        fn push_status(&self, status: Result<Option<SignatureState>, LanderError>) {
            self.statuses.lock().unwrap().push_back(status);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn broadcasts(&self) -> usize {
            self.calls()
                .iter()
                .filter(|call| matches!(call, Call::Broadcast(_)))
                .count()
        }
    }

    #[async_trait]
    impl LandingRpc for ScriptedRpc {
        async fn latest_block_reference(&self) -> Result<BlockReference, LanderError> {
            Ok(BlockReference {
                blockhash: Hash::new_unique(),
                slot: 1,
                last_valid_block_height: 0,
            })
        }

        async fn block_height(&self, _min_context_slot: Option<u64>) -> Result<u64, LanderError> {
            let next = self.heights.lock().unwrap().pop_front();
            let last = self
                .calls
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find_map(|call| match call {
                    Call::Height(h) => Some(*h),
                    _ => None,
                })
                .unwrap_or(0);
            let result = next.unwrap_or(Ok(last));
            if let Ok(height) = &result {
                self.calls.lock().unwrap().push(Call::Height(*height));
            }
            result
        }

        async fn broadcast(
            &self,
            transaction: &SignedTransaction,
        ) -> Result<Signature, LanderError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Broadcast(transaction.wire().to_vec()));
            let fail = self
                .broadcast_failures
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(false);
            if fail {
                return Err(LanderError::InvalidResponse("connection reset".into()));
            }
            Ok(self.signature.lock().unwrap().unwrap_or_default())
        }

        async fn signature_state(
            &self,
            _signature: &Signature,
        ) -> Result<Option<SignatureState>, LanderError> {
            self.calls.lock().unwrap().push(Call::Status);
            self.statuses.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    fn signed_at_height(height: u64) -> SignedTransaction {
        let wallet = Keypair::new();
        let ix = Instruction {
            program_id: Pubkey::new_unique(),
            accounts: vec![AccountMeta::new(wallet.pubkey(), true)],
            data: vec![9],
        };
        let mut envelope = TransactionAssembler::default()
            .assemble(
                BaseTransaction::new(wallet.pubkey(), vec![ix]),
                &compute_fee_instructions(100_000, 1_000),
                Hash::new_unique(),
                height,
            )
            .expect("assemble");
        envelope.sign_with(&[&wallet]).expect("sign");
        envelope.into_signed().expect("signed")
    }

    fn confirmed(level: ConfirmationLevel) -> Result<Option<SignatureState>, LanderError> {
        Ok(Some(SignatureState {
            level,
            slot: 77,
            error: None,
        }))
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn expires_without_broadcasting_on_the_expired_attempt() {
        let tx = signed_at_height(1_000);
        assert_eq!(tx.expiration_block_height(), 1_151);
        let rpc = ScriptedRpc::default().with_heights([1_000, 1_050, 1_151]);

        let report = SubmissionLoop::new(&rpc, LandingSchedule::default())
            .land(&tx)
            .await;

        assert_eq!(
            report.outcome,
            LandingOutcome::Expired {
                block_height: 1_151
            }
        );
        assert_eq!(report.attempts, 3);
        assert_eq!(report.broadcasts, 2);
        assert_eq!(rpc.broadcasts(), 2);
        assert_eq!(rpc.calls().last(), Some(&Call::Height(1_151)));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn confirms_on_second_poll_with_identical_bytes() {
        let tx = signed_at_height(1_000);
        let rpc = ScriptedRpc::default().with_heights([1_000, 1_001]);
        *rpc.signature.lock().unwrap() = Some(tx.signature());
        rpc.push_status(Ok(None));
        rpc.push_status(confirmed(ConfirmationLevel::Confirmed));

        let report = SubmissionLoop::new(&rpc, LandingSchedule::default())
            .land(&tx)
            .await;

        assert!(report.outcome.is_confirmed());
        assert_eq!(report.signature, tx.signature());
        assert_eq!(report.attempts, 2);
        assert_eq!(report.broadcasts, 2);
        let sent: Vec<Vec<u8>> = rpc
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Broadcast(bytes) => Some(bytes),
                _ => None,
            })
            .collect();
        assert_eq!(sent, vec![tx.wire().to_vec(), tx.wire().to_vec()]);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn finalized_counts_as_confirmed() {
        let tx = signed_at_height(10);
        let rpc = ScriptedRpc::default().with_heights([10]);
        rpc.push_status(confirmed(ConfirmationLevel::Finalized));

        let report = SubmissionLoop::new(&rpc, LandingSchedule::default())
            .land(&tx)
            .await;

        assert_eq!(
            report.outcome,
            LandingOutcome::Confirmed {
                level: ConfirmationLevel::Finalized,
                slot: 77,
                error: None
            }
        );
        assert_eq!(report.broadcasts, 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn processed_is_not_enough() {
        let tx = signed_at_height(10);
        let rpc = ScriptedRpc::default().with_heights([10, 11]);
        rpc.push_status(confirmed(ConfirmationLevel::Processed));
        rpc.push_status(confirmed(ConfirmationLevel::Confirmed));

        let report = SubmissionLoop::new(&rpc, LandingSchedule::default())
            .land(&tx)
            .await;

        assert!(report.outcome.is_confirmed());
        assert_eq!(report.attempts, 2);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn exhausts_after_exactly_ten_broadcasts() {
        let tx = signed_at_height(1_000);
        let rpc = ScriptedRpc::default().with_heights(1_000..1_010);

        let report = SubmissionLoop::new(&rpc, LandingSchedule::default())
            .land(&tx)
            .await;

        assert_eq!(report.outcome, LandingOutcome::Exhausted);
        assert_eq!(report.attempts, 10);
        assert_eq!(report.broadcasts, 10);
        assert_eq!(rpc.broadcasts(), 10);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn waits_grace_period_before_polling() {
        let tx = signed_at_height(10);
        let rpc = ScriptedRpc::default().with_heights([10]);
        rpc.push_status(confirmed(ConfirmationLevel::Confirmed));

        let started = Instant::now();
        SubmissionLoop::new(&rpc, LandingSchedule::default())
            .land(&tx)
            .await;

        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_CONFIRM_WAIT);
        assert!(elapsed < DEFAULT_CONFIRM_WAIT + DEFAULT_RETRY_WAIT);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn exhausted_run_spends_confirm_and_retry_waits() {
        let tx = signed_at_height(10);
        let rpc = ScriptedRpc::default().with_heights([10]);

        let started = Instant::now();
        SubmissionLoop::new(&rpc, LandingSchedule::default())
            .land(&tx)
            .await;

        let expected = DEFAULT_CONFIRM_WAIT * 10 + DEFAULT_RETRY_WAIT * 9;
        let elapsed = started.elapsed();
        assert!(elapsed >= expected);
        assert!(elapsed < expected + DEFAULT_RETRY_WAIT);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn transport_errors_do_not_abort_the_loop() {
        let tx = signed_at_height(100);
        let rpc = ScriptedRpc::default().with_heights([100]);
        rpc.broadcast_failures.lock().unwrap().push_back(true);
        rpc.push_status(Err(LanderError::InvalidResponse("503".into())));
        rpc.push_height_error();
        rpc.heights.lock().unwrap().push_back(Ok(101));
        rpc.push_status(confirmed(ConfirmationLevel::Confirmed));

        let report = SubmissionLoop::new(&rpc, LandingSchedule::default())
            .land(&tx)
            .await;

        assert!(report.outcome.is_confirmed());
        assert_eq!(report.attempts, 3);
        assert_eq!(report.broadcasts, 2);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn never_broadcasts_at_or_past_expiration() {
        let tx = signed_at_height(500);
        let rpc = ScriptedRpc::default().with_heights([651]);

        let report = SubmissionLoop::new(&rpc, LandingSchedule::default())
            .land(&tx)
            .await;

        assert_eq!(report.outcome, LandingOutcome::Expired { block_height: 651 });
        assert_eq!(report.attempts, 1);
        assert_eq!(rpc.broadcasts(), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn landed_with_execution_error_is_terminal() {
        let tx = signed_at_height(10);
        let rpc = ScriptedRpc::default().with_heights([10]);
        rpc.push_status(Ok(Some(SignatureState {
            level: ConfirmationLevel::Confirmed,
            slot: 12,
            error: Some("InstructionError(2, Custom(6001))".into()),
        })));

        let report = SubmissionLoop::new(&rpc, LandingSchedule::default())
            .land(&tx)
            .await;

        assert!(report.outcome.is_confirmed());
        assert_eq!(report.broadcasts, 1);
        assert!(report.outcome.to_string().contains("6001"));
    }
}
