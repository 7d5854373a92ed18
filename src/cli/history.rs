//! `ha-notifier history` - 最近展示过的通知

use anyhow::Result;
use clap::Args;

use super::context::AppPaths;
use super::output::print_json;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// 显示最近 N 条
    #[arg(long, short, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub json: bool,
}

/// 处理 history 命令
pub fn handle_history(paths: &AppPaths, args: HistoryArgs) -> Result<()> {
    let records = paths.history_store().read_recent(args.limit);
    if args.json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No notifications yet");
    }
    for record in records {
        println!(
            "{}  [{}] {}  {}",
            record.ts.format("%Y-%m-%d %H:%M:%S"),
            record.priority,
            record.title,
            record.body
        );
    }
    Ok(())
}
