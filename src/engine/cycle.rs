use std::sync::Arc;

use tracing::{debug, info};

use crate::lander::{FeeParameters, LandingReport, LandingRpc, LandingSchedule, SubmissionLoop};
use crate::monitoring::events;

use super::builder::TransactionAssembler;
use super::error::EngineResult;
use super::signer::SigningAdapter;
use super::swap::{SwapBuilder, SwapRequest};

/// 一次完整的 swap：报价 → 组装 → 签名 → 落地。
pub struct SwapEngine<B, R, S>
where
    B: SwapBuilder,
    R: LandingRpc,
    S: SigningAdapter,
{
    builder: B,
    rpc: Arc<R>,
    signer: S,
    assembler: TransactionAssembler,
    fees: FeeParameters,
    schedule: LandingSchedule,
    explorer_url: String,
}

impl<B, R, S> SwapEngine<B, R, S>
where
    B: SwapBuilder,
    R: LandingRpc,
    S: SigningAdapter,
{
    pub fn new(
        builder: B,
        rpc: Arc<R>,
        signer: S,
        assembler: TransactionAssembler,
        fees: FeeParameters,
        schedule: LandingSchedule,
    ) -> Self {
        Self {
            builder,
            rpc,
            signer,
            assembler,
            fees,
            schedule,
            explorer_url: String::new(),
        }
    }

    pub fn with_explorer_url(mut self, explorer_url: impl Into<String>) -> Self {
        self.explorer_url = explorer_url.into();
        self
    }

    pub async fn run_once(&self, request: &SwapRequest) -> EngineResult<LandingReport> {
        let payer = self.signer.pubkey();
        let prepared = self.builder.build_swap(payer, request).await?;
        events::swap_quote(request, &prepared.quote);

        let fee_instructions = self.fees.instructions();
        let reference = self.rpc.latest_block_reference().await?;
        let block_height = self.rpc.block_height(Some(reference.slot)).await?;

        let envelope = self.assembler.assemble(
            prepared.base,
            &fee_instructions,
            reference.blockhash,
            block_height,
        )?;
        debug!(
            target: "engine::cycle",
            slot = reference.slot,
            block_height,
            expiration = envelope.expiration_block_height(),
            last_valid_block_height = reference.last_valid_block_height,
            "交易过期高度已确定"
        );

        let signed = self.signer.sign(envelope).await?;
        info!(
            target: "engine::cycle",
            signature = %signed.signature(),
            blockhash = %signed.recent_blockhash(),
            block_height,
            expiration = signed.expiration_block_height(),
            compute_units = self.fees.estimated_compute_units(),
            micro_lamports_per_unit = self.fees.micro_lamports_per_unit(),
            "交易已签名，开始落地"
        );

        let report = SubmissionLoop::new(self.rpc.as_ref(), self.schedule)
            .land(&signed)
            .await;

        info!(
            target: "engine::cycle",
            signature = %report.signature,
            outcome = report.outcome.label(),
            "{} {}{}",
            report.outcome,
            self.explorer_url,
            report.signature
        );
        Ok(report)
    }
}
