use std::{fs, future::Future, path::PathBuf, str::FromStr, sync::Arc};

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod config;
mod dexes;
mod engine;
mod instructions;
mod lander;
mod monitoring;

use config::{AppConfig, ConfigError, apply_env_overrides, load_config};
use dexes::whirlpool::WhirlpoolSwapBuilder;
use engine::{
    EngineIdentity, KeypairSigner, ScheduleSettings, Scheduler, SwapDirection, SwapEngine,
    SwapRequest, TransactionAssembler,
};
use lander::{FeeParameters, RpcLander, commitment_label};

#[derive(Parser, Debug)]
#[command(name = "swap-lander", version, about = "Whirlpool 随机 swap 落地机器人")]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 swap-lander.yaml 或 config/swap-lander.yaml）"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 按配置循环执行随机 swap（默认命令）
    Run(RunCmd),
    /// 执行一次指定方向与数量的 swap
    Once(OnceCmd),
    /// 打印优先费推导结果
    Fee(FeeCmd),
    /// 初始化配置模版文件
    Init(InitCmd),
}

#[derive(Args, Debug, Default)]
struct RunCmd {
    #[arg(long, help = "覆盖迭代次数")]
    times: Option<u32>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InputToken {
    A,
    B,
}

#[derive(Args, Debug)]
struct OnceCmd {
    #[arg(long, value_enum, help = "输入代币：a 或 b")]
    input: InputToken,
    #[arg(long, help = "输入数量（UI 单位）")]
    amount: Decimal,
}

#[derive(Args, Debug)]
struct FeeCmd {
    #[arg(long, help = "预估计算单元，缺省取配置")]
    compute_units: Option<u32>,
    #[arg(long, help = "目标优先费（lamports），缺省取配置")]
    fee: Option<u64>,
}

#[derive(Args, Debug)]
struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    force: bool,
}

type LiveEngine = SwapEngine<WhirlpoolSwapBuilder, RpcLander, KeypairSigner>;

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config;

    match cli.command.unwrap_or(Command::Run(RunCmd::default())) {
        Command::Init(args) => init_configs(args),
        Command::Fee(args) => {
            let config = prepare(config_path)?;
            print_fee(&config, args)
        }
        Command::Once(args) => {
            let config = prepare(config_path)?;
            let engine = build_engine(&config)?;
            let direction = match args.input {
                InputToken::A => SwapDirection::AToB,
                InputToken::B => SwapDirection::BToA,
            };
            let report = engine
                .run_once(&SwapRequest::new(direction, args.amount))
                .await?;
            println!(
                "{} {}{}",
                report.outcome, config.bot.explorer_url, report.signature
            );
            if !report.outcome.is_confirmed() {
                warn!(target: "swap_lander", outcome = report.outcome.label(), "交易未确认");
            }
            Ok(())
        }
        Command::Run(args) => {
            let config = prepare(config_path)?;
            let engine = build_engine(&config)?;
            let settings = ScheduleSettings {
                iterations: args.times.unwrap_or(config.schedule.iterations),
                min_amount: config.swap.min_amount,
                max_amount: config.swap.max_amount,
                min_sleep_secs: config.schedule.min_sleep_secs,
                max_sleep_secs: config.schedule.max_sleep_secs,
            };

            let cancel = CancellationToken::new();
            spawn_ctrl_c(cancel.clone());

            let scheduler = Scheduler::new(settings, cancel);
            let engine = &engine;
            let summary = scheduler
                .run(move |request| async move { engine.run_once(&request).await })
                .await;
            info!(
                target: "swap_lander",
                confirmed = summary.confirmed,
                iterations = summary.iterations,
                "运行结束"
            );
            Ok(())
        }
    }
}

fn prepare(path: Option<PathBuf>) -> Result<AppConfig> {
    let config = load_configuration(path)?;
    init_tracing(&config.global.logging)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

fn init_tracing(config: &config::LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .init();
    } else {
        fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn load_configuration(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

fn build_engine(config: &AppConfig) -> Result<LiveEngine> {
    if config.bot.prometheus.enable {
        monitoring::try_init_prometheus(&config.bot.prometheus.listen)
            .map_err(|err| anyhow!(err))?;
    }

    let identity = EngineIdentity::from_wallet(&config.global.wallet)?;
    let commitment = config.landing.commitment.to_commitment();
    let client = Arc::new(RpcClient::new_with_commitment(
        config.global.rpc_url.clone(),
        commitment,
    ));
    let pool = Pubkey::from_str(config.swap.pool.trim())
        .map_err(|err| anyhow!("swap.pool 地址无效 {}: {err}", config.swap.pool))?;

    info!(
        target: "swap_lander",
        endpoint = %client.url(),
        wallet = %identity.pubkey,
        pool = %pool,
        commitment = commitment_label(commitment),
        "初始化完成"
    );

    let fees = fee_parameters(config)?;
    let engine = SwapEngine::new(
        WhirlpoolSwapBuilder::new(client.clone(), pool, config.swap.slippage_bps),
        Arc::new(RpcLander::new(client, commitment)),
        KeypairSigner::new(identity.signer),
        TransactionAssembler::new(config.landing.validity_window_blocks),
        fees,
        config.landing.schedule(),
    )
    .with_explorer_url(config.bot.explorer_url.clone());
    Ok(engine)
}

fn fee_parameters(config: &AppConfig) -> Result<FeeParameters> {
    FeeParameters::new(
        config.fee.estimated_compute_units,
        config.fee.target_fee_lamports,
    )
    .ok_or_else(|| anyhow!("fee.estimated_compute_units 必须大于 0"))
}

fn print_fee(config: &AppConfig, args: FeeCmd) -> Result<()> {
    let units = args
        .compute_units
        .unwrap_or(config.fee.estimated_compute_units);
    let fee = args.fee.unwrap_or(config.fee.target_fee_lamports);
    let params = FeeParameters::new(units, fee).ok_or_else(|| anyhow!("计算单元必须大于 0"))?;
    println!("compute_unit_limit: {}", params.estimated_compute_units());
    println!(
        "compute_unit_price: {} micro-lamports/CU",
        params.micro_lamports_per_unit()
    );
    println!("target_fee: {fee} lamports");
    Ok(())
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, cancel).await {
            warn!(target: "swap_lander", "再次收到 Ctrl-C，立即退出");
            std::process::exit(130);
        }
    });
}

/// 第一次信号请求优雅停止，第二次信号返回 true 表示需要强制退出。
async fn watch_interrupts<F, Fut>(mut next_signal: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(err) = next_signal().await {
        warn!(target: "swap_lander", error = %err, "无法监听 Ctrl-C");
        return false;
    }
    warn!(target: "swap_lander", "收到 Ctrl-C，当前轮结束后退出，再按一次强制退出");
    cancel.cancel();
    next_signal().await.is_ok()
}

fn init_configs(args: InitCmd) -> Result<()> {
    let output_dir = match args.output {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    fs::create_dir_all(&output_dir)?;

    let templates: [(&str, &str); 1] = [(
        "swap-lander.yaml",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/swap-lander.yaml")),
    )];

    for (filename, contents) in templates {
        let target_path = output_dir.join(filename);
        if target_path.exists() && !args.force {
            println!(
                "跳过 {}（文件已存在，如需覆盖请加 --force）",
                target_path.display()
            );
            continue;
        }

        fs::write(&target_path, contents)?;
        println!("已写入 {}", target_path.display());
    }

    Ok(())
}
