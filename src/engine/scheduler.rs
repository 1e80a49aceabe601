use std::future::Future;
use std::time::Duration;

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::lander::{LandingOutcome, LandingReport};
use crate::monitoring::events;

use super::error::EngineResult;
use super::swap::{SwapDirection, SwapRequest};

/// 数量保留的小数位，超出部分四舍五入。
const AMOUNT_DECIMALS: u32 = 8;

/// 两轮之间休眠的上限（秒）。
pub const MAX_SLEEP_SECS: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleSettings {
    pub iterations: u32,
    pub min_amount: f64,
    pub max_amount: f64,
    pub min_sleep_secs: f64,
    pub max_sleep_secs: f64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub iterations: u32,
    pub confirmed: u32,
    pub expired: u32,
    pub exhausted: u32,
    pub failed: u32,
}

impl ScheduleSummary {
    fn record(&mut self, result: &EngineResult<LandingReport>) {
        self.iterations += 1;
        match result {
            Ok(report) => match report.outcome {
                LandingOutcome::Confirmed { .. } => self.confirmed += 1,
                LandingOutcome::Expired { .. } => self.expired += 1,
                LandingOutcome::Exhausted => self.exhausted += 1,
            },
            Err(_) => self.failed += 1,
        }
    }
}

/// 外层循环：逐轮随机方向与数量，轮与轮之间随机休眠，可被取消。
pub struct Scheduler {
    settings: ScheduleSettings,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(settings: ScheduleSettings, cancel: CancellationToken) -> Self {
        Self { settings, cancel }
    }

    pub fn draw_request<G: Rng + ?Sized>(&self, rng: &mut G) -> SwapRequest {
        let direction = if rng.random_bool(0.5) {
            SwapDirection::AToB
        } else {
            SwapDirection::BToA
        };
        let raw = uniform(rng, self.settings.min_amount, self.settings.max_amount);
        let amount = Decimal::from_f64(raw)
            .map(|value| value.round_dp(AMOUNT_DECIMALS))
            .unwrap_or(Decimal::ZERO);
        SwapRequest::new(direction, amount)
    }

    pub fn draw_sleep<G: Rng + ?Sized>(&self, rng: &mut G) -> Duration {
        let secs = uniform(
            rng,
            self.settings.min_sleep_secs,
            self.settings.max_sleep_secs,
        );
        Duration::try_from_secs_f64(secs.clamp(0.0, MAX_SLEEP_SECS)).unwrap_or_else(|err| {
            warn!(
                target: "engine::scheduler",
                secs,
                error = %err,
                "休眠时长无效，改用上限"
            );
            Duration::from_secs(MAX_SLEEP_SECS as u64)
        })
    }

    pub async fn run<F, Fut>(&self, mut cycle: F) -> ScheduleSummary
    where
        F: FnMut(SwapRequest) -> Fut,
        Fut: Future<Output = EngineResult<LandingReport>>,
    {
        let mut summary = ScheduleSummary::default();

        for iteration in 1..=self.settings.iterations {
            if self.cancel.is_cancelled() {
                break;
            }
            let request = self.draw_request(&mut rand::rng());
            info!(
                target: "engine::scheduler",
                iteration,
                input = %request.direction,
                amount = %request.amount,
                "开始第 {iteration} 轮"
            );

            let result = cycle(request).await;
            if let Err(err) = &result {
                events::iteration_failed(iteration, err);
            }
            summary.record(&result);
            info!(target: "engine::scheduler", iteration, "第 {iteration} 轮完成");

            if iteration == self.settings.iterations {
                break;
            }
            let delay = self.draw_sleep(&mut rand::rng());
            events::iteration_sleep(iteration, delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => {
                    warn!(target: "engine::scheduler", iteration, "收到停止信号，结束调度");
                    break;
                }
            }
        }

        info!(
            target: "engine::scheduler",
            iterations = summary.iterations,
            confirmed = summary.confirmed,
            expired = summary.expired,
            exhausted = summary.exhausted,
            failed = summary.failed,
            "调度结束"
        );
        summary
    }
}

fn uniform<G: Rng + ?Sized>(rng: &mut G, min: f64, max: f64) -> f64 {
    if !min.is_finite() || !max.is_finite() || max <= min {
        return min;
    }
    rng.random_range(min..max)
}
