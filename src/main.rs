//! HA Notifier CLI
//!
//! 保持与 Home Assistant 的 WebSocket 连接，把 `app_notify` 事件展示为本地通知

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use ha_notifier::cli::{
    handle_action, handle_config, handle_endpoint, handle_history, handle_notify, handle_run,
    handle_templates, ActionArgs, AppPaths, ConfigArgs, EndpointArgs, HistoryArgs, NotifyArgs,
    RunArgs, TemplatesArgs,
};

#[derive(Parser)]
#[command(name = "ha-notifier")]
#[command(about = "HA Notifier - Home Assistant 事件转本地通知")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ~/.config/ha-notifier/config.json，或 HA_NOTIFIER_CONFIG）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 保持连接并展示收到的通知
    Run(RunArgs),
    /// 直接分发一个 JSON/YAML 载荷
    Notify(NotifyArgs),
    /// 执行一个动作（服务调用或打开链接）
    Action(ActionArgs),
    /// 管理通知模板
    Templates(TemplatesArgs),
    /// 查看或修改配置
    Config(ConfigArgs),
    /// 最近的通知记录
    History(HistoryArgs),
    /// 显示推导出的 WebSocket 地址
    Endpoint(EndpointArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 控制日志级别，默认 info
    // 例如: RUST_LOG=ha_notifier=debug ha-notifier run
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ha_notifier=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();
    let paths = AppPaths::from_config(cli.config);

    match cli.command {
        Commands::Run(args) => handle_run(&paths, args).await?,
        Commands::Notify(args) => handle_notify(&paths, args)?,
        Commands::Action(args) => handle_action(&paths, args).await?,
        Commands::Templates(args) => handle_templates(&paths, args)?,
        Commands::Config(args) => handle_config(&paths, args)?,
        Commands::History(args) => handle_history(&paths, args)?,
        Commands::Endpoint(args) => handle_endpoint(&paths, args)?,
    }

    Ok(())
}
