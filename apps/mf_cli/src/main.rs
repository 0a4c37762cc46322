// apps/mf_cli/src/main.rs

//! MicroFlow 命令行界面
//!
//! 读取 `<simname>.json`（或 `--config` 指定的文件），在进程内启动
//! `npx * npy` 个进程并执行以下之一：
//!
//! - 默认：按 `time.mode` 预报或重放
//! - `--init`：生成并保存初始场
//! - `--selfcheck`：分解布局自检
//!
//! # 架构层级
//!
//! 本模块属于 **Layer 5: Application**，库层错误在此转为 `anyhow::Error`，
//! 任何致命错误以退出码 1 结束。

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mf_config::ConfigSource;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// MicroFlow 交错网格流动求解器
#[derive(Parser)]
#[command(name = "mf_cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MicroFlow distributed staggered-grid flow solver", long_about = None)]
struct Cli {
    /// 模拟名，决定默认配置文件与输出文件名
    #[arg(default_value = "microflow")]
    simname: String,

    /// 配置文件路径（默认 `<simname>.json`）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// 只生成初始场
    #[arg(long, conflicts_with = "selfcheck")]
    init: bool,

    /// 只执行分解布局自检
    #[arg(long)]
    selfcheck: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.json", cli.simname)));
    let source = ConfigSource::from_file(&path)
        .with_context(|| format!("无法读取配置 {}", path.display()))?;

    if cli.selfcheck {
        commands::selfcheck::execute(&source)
    } else if cli.init {
        commands::init::execute(&cli.simname, &source)
    } else {
        commands::run::execute(&cli.simname, &source)
    }
}
