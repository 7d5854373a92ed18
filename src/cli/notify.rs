//! `ha-notifier notify` - 直接分发一个 JSON/YAML 载荷

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::io::Read;

use super::context::AppPaths;
use super::output::{print_json, report_outcome};
use crate::decoder::{decode_frame, parse_markup, NormalizedEvent};

#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// 载荷文件，`-` 表示 stdin
    pub input: String,
    /// 只构建不展示
    #[arg(long)]
    pub dry_run: bool,
    /// 输出构建好的通知（JSON）
    #[arg(long)]
    pub json: bool,
}

/// 载荷可以是整帧 `{"type":"event",...}`、JSON 对象或 YAML 文本
pub fn parse_payload(content: &str) -> Result<NormalizedEvent> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(content) {
        if map.get("type").and_then(Value::as_str) == Some("event") {
            return decode_frame(content).context("Invalid event frame");
        }
        return Ok(map);
    }
    parse_markup(content).context("Payload is neither a JSON object nor a YAML mapping")
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        Ok(content)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))
    }
}

/// 处理 notify 命令
pub fn handle_notify(paths: &AppPaths, args: NotifyArgs) -> Result<()> {
    let event = parse_payload(&read_input(&args.input)?)?;
    let dispatcher = paths.dispatcher(args.dry_run);

    let outcome = dispatcher.dispatch(&event);
    if args.json {
        print_json(&outcome.notification)?;
    }
    report_outcome(&outcome);
    Ok(())
}
