//! `ha-notifier action` - 手动执行一个通知动作

use anyhow::{bail, Result};
use clap::Args;
use std::sync::Arc;

use super::context::AppPaths;
use crate::action::{ActionExecutor, SystemLinkOpener};
use crate::notification::Action;

#[derive(Args, Debug)]
pub struct ActionArgs {
    /// 服务，格式 `domain.service`
    #[arg(long)]
    pub service: Option<String>,
    /// 实体 ID
    #[arg(long)]
    pub entity: Option<String>,
    /// 要打开的链接
    #[arg(long)]
    pub url: Option<String>,
    /// 显式类型：ha_service | url
    #[arg(long = "type")]
    pub action_type: Option<String>,
    /// 按钮标题（仅用于日志）
    #[arg(long, default_value = "cli")]
    pub title: String,
}

impl ActionArgs {
    pub fn to_action(&self) -> Action {
        Action {
            title: self.title.clone(),
            action_type: self.action_type.clone(),
            service: self.service.clone(),
            entity_id: self.entity.clone(),
            url: self.url.clone(),
        }
    }
}

/// 处理 action 命令
pub async fn handle_action(paths: &AppPaths, args: ActionArgs) -> Result<()> {
    let executor = ActionExecutor::new(Arc::new(paths.prefs.clone()), Arc::new(SystemLinkOpener));
    let result = executor.execute(&args.to_action()).await;
    if !result.success {
        bail!("{}", result.message);
    }
    println!("{}", result.message);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::ActionKind;

    #[test]
    fn test_args_to_action() {
        let args = ActionArgs {
            service: Some("light.turn_on".to_string()),
            entity: Some("light.x".to_string()),
            url: None,
            action_type: None,
            title: "cli".to_string(),
        };
        let action = args.to_action();
        assert_eq!(action.kind(), Some(ActionKind::RemoteCall));
        assert_eq!(action.entity_id.as_deref(), Some("light.x"));
    }
}
