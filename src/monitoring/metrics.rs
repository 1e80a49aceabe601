use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use tracing::info;

pub const BROADCAST_TOTAL: &str = "swap_lander_broadcast_total";
pub const BROADCAST_ATTEMPT: &str = "swap_lander_broadcast_attempt";
pub const LANDING_TOTAL: &str = "swap_lander_landing_total";
pub const LANDING_ATTEMPTS: &str = "swap_lander_landing_attempts";
pub const ITERATION_FAILED_TOTAL: &str = "swap_lander_iteration_failed_total";

static EXPORTER: OnceCell<SocketAddr> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

/// 启动 Prometheus HTTP 导出器；重复调用返回首次绑定的地址。
pub fn try_init_prometheus(listen: &str) -> Result<SocketAddr> {
    EXPORTER
        .get_or_try_init(|| {
            let addr = parse_listen(listen)?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .context("failed to install prometheus exporter")?;
            describe_landing_metrics();
            PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
            info!(target: "monitoring::metrics", %addr, "Prometheus 导出器已启动");
            Ok(addr)
        })
        .copied()
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}

fn parse_listen(listen: &str) -> Result<SocketAddr> {
    listen
        .trim()
        .parse()
        .with_context(|| format!("invalid prometheus listen address: {listen}"))
}

fn describe_landing_metrics() {
    describe_counter!(BROADCAST_TOTAL, "sendTransaction 调用次数，按结果区分");
    describe_histogram!(BROADCAST_ATTEMPT, "广播发生时所处的尝试序号");
    describe_counter!(LANDING_TOTAL, "落地结果计数，按 confirmed/expired/exhausted 区分");
    describe_histogram!(LANDING_ATTEMPTS, "每笔交易消耗的尝试次数");
    describe_counter!(ITERATION_FAILED_TOTAL, "落地前即失败的轮次");
}
