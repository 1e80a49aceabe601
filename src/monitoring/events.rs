use std::time::Duration;

use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::engine::{SwapQuote, SwapRequest};
use crate::lander::{LandingOutcome, LandingReport};

use super::metrics::{
    BROADCAST_ATTEMPT, BROADCAST_TOTAL, ITERATION_FAILED_TOTAL, LANDING_ATTEMPTS, LANDING_TOTAL,
    prometheus_enabled,
};

pub fn swap_quote(request: &SwapRequest, quote: &SwapQuote) {
    info!(
        target: "monitoring::swap",
        event = "quote",
        a_to_b = quote.a_to_b,
        input = %request.direction,
        requested_amount = %request.amount,
        estimated_amount_in = %quote.estimated_amount_in_ui(),
        estimated_amount_out = %quote.estimated_amount_out_ui(),
        minimum_amount_out = quote.minimum_amount_out,
        rate = %quote.rate(),
        "swap 报价"
    );
}

pub fn landing_broadcast(attempt: usize, ok: bool) {
    if prometheus_enabled() {
        let result = if ok { "ok" } else { "error" };
        counter!(BROADCAST_TOTAL, "result" => result).increment(1);
        histogram!(BROADCAST_ATTEMPT).record(attempt as f64);
    }
}

pub fn landing_outcome(report: &LandingReport) {
    match &report.outcome {
        LandingOutcome::Confirmed { error: Some(err), .. } => warn!(
            target: "monitoring::landing",
            event = "outcome",
            signature = %report.signature,
            outcome = report.outcome.label(),
            attempts = report.attempts,
            broadcasts = report.broadcasts,
            error = %err,
            "交易已上链但执行失败"
        ),
        _ => info!(
            target: "monitoring::landing",
            event = "outcome",
            signature = %report.signature,
            outcome = report.outcome.label(),
            attempts = report.attempts,
            broadcasts = report.broadcasts,
            "{}",
            report.outcome
        ),
    }

    if prometheus_enabled() {
        counter!(LANDING_TOTAL, "outcome" => report.outcome.label()).increment(1);
        histogram!(LANDING_ATTEMPTS).record(report.attempts as f64);
    }
}

pub fn iteration_failed(iteration: u32, error: &dyn std::fmt::Display) {
    warn!(
        target: "monitoring::schedule",
        event = "iteration_failed",
        iteration,
        error = %error,
        "本轮 swap 失败，继续下一轮"
    );
    if prometheus_enabled() {
        counter!(ITERATION_FAILED_TOTAL).increment(1);
    }
}

pub fn iteration_sleep(iteration: u32, delay: Duration) {
    info!(
        target: "monitoring::schedule",
        event = "sleep",
        iteration,
        seconds = delay.as_secs_f64(),
        "休眠后进入下一轮"
    );
}
