//! `ha-notifier config` - 查看和修改偏好

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use super::context::AppPaths;
use super::output::print_json;
use crate::config::{redact, Prefs, PrefsSource};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示当前偏好（令牌脱敏）
    Show {
        #[arg(long)]
        json: bool,
    },
    /// 修改一个键
    Set { key: String, value: String },
    /// 显示配置文件路径
    Path,
}

/// 令牌脱敏后的视图
pub fn redacted_view(prefs: &Prefs) -> serde_json::Value {
    json!({
        "lan_url": prefs.lan_url,
        "wan_url": prefs.wan_url,
        "token": redact(&prefs.token),
        "ws_enabled": prefs.ws_enabled,
        "ws_prefer_lan": prefs.ws_prefer_lan,
        "full_screen": prefs.full_screen,
        "persistent": prefs.persistent,
    })
}

/// 处理 config 命令
pub fn handle_config(paths: &AppPaths, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Show { json } => {
            let prefs = paths.prefs.load()?;
            let view = redacted_view(&prefs);
            if json {
                return print_json(&view);
            }
            if let Some(map) = view.as_object() {
                for (key, value) in map {
                    println!("{:<14} {}", key, value);
                }
            }
        }
        ConfigCommand::Set { key, value } => {
            paths.prefs.set(&key, &value)?;
            let shown = if key == "token" { redact(&value) } else { value.as_str() };
            println!("{} = {}", key, shown);
        }
        ConfigCommand::Path => {
            println!("{}", paths.prefs.path().display());
        }
    }
    Ok(())
}
