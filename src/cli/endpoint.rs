//! `ha-notifier endpoint` - 显示推导出的 socket 地址

use anyhow::{anyhow, Result};
use clap::Args;

use super::context::AppPaths;
use crate::config::PrefsSource;
use crate::connection::build_ws_url;

#[derive(Args, Debug)]
pub struct EndpointArgs {
    /// 直接给出 base URL；缺省时按配置选择
    #[arg(long)]
    pub base_url: Option<String>,
}

/// 处理 endpoint 命令
pub fn handle_endpoint(paths: &AppPaths, args: EndpointArgs) -> Result<()> {
    let base = match args.base_url {
        Some(base) => base,
        None => paths
            .prefs
            .load()?
            .socket_base_url()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("No base URL configured (set lan_url or wan_url)"))?,
    };
    let url = build_ws_url(&base).ok_or_else(|| anyhow!("Cannot derive a socket URL from '{}'", base))?;
    println!("{}", url);
    Ok(())
}
