//! `ha-notifier run` - 保持连接并把事件转为本地通知

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::context::AppPaths;
use crate::config::{ManagerConfig, Prefs, PrefsSource, PrefsStore};
use crate::connection::ConnectionManager;
use crate::notification::EventPipeline;
use crate::service::NotifierService;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Home Assistant 地址（覆盖配置，并视为已启用）
    #[arg(long)]
    pub base_url: Option<String>,
    /// 访问令牌（覆盖配置）
    #[arg(long)]
    pub token: Option<String>,
    /// 只记录将要展示的通知
    #[arg(long)]
    pub dry_run: bool,
    /// 重读配置的间隔（秒）
    #[arg(long, default_value = "30")]
    pub reload_secs: u64,
}

/// 命令行参数覆盖文件中的偏好
pub struct OverrideSource {
    inner: PrefsStore,
    base_url: Option<String>,
    token: Option<String>,
}

impl OverrideSource {
    pub fn new(inner: PrefsStore, base_url: Option<String>, token: Option<String>) -> Self {
        Self {
            inner,
            base_url,
            token,
        }
    }

    fn apply(&self, mut prefs: Prefs) -> Prefs {
        if let Some(base_url) = &self.base_url {
            prefs.lan_url = base_url.trim().to_string();
            prefs.wan_url.clear();
            prefs.ws_enabled = true;
        }
        if let Some(token) = &self.token {
            prefs.token = token.trim().to_string();
        }
        prefs
    }
}

impl PrefsSource for OverrideSource {
    fn load(&self) -> Result<Prefs> {
        Ok(self.apply(self.inner.load()?))
    }
}

/// 处理 run 命令
pub async fn handle_run(paths: &AppPaths, args: RunArgs) -> Result<()> {
    let source: Arc<dyn PrefsSource> = Arc::new(OverrideSource::new(
        paths.prefs.clone(),
        args.base_url,
        args.token,
    ));
    let prefs = source.load()?;
    info!(config = %paths.prefs.path().display(), prefs = ?prefs, "Starting notifier");

    let dispatcher = Arc::new(paths.dispatcher(args.dry_run));
    let (manager, frames) = ConnectionManager::new(ManagerConfig::default());
    let pipeline = EventPipeline::new(dispatcher);
    let stats = pipeline.stats();
    let worker = pipeline.spawn(frames);

    let service = NotifierService::new(Arc::new(manager));
    service
        .run(source, Duration::from_secs(args.reload_secs.max(1)))
        .await;

    worker.abort();
    let stats = stats.snapshot();
    info!(
        decoded = stats.decoded,
        dropped = stats.dropped,
        dispatched = stats.dispatched,
        "Notifier stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_override_enables_and_replaces_urls() {
        let dir = TempDir::new().unwrap();
        let store = PrefsStore::new(dir.path().join("config.json"));
        store.set("wan_url", "https://wan").unwrap();
        store.set("token", "file-token").unwrap();

        let source = OverrideSource::new(store, Some("http://lan:8123".to_string()), None);
        let prefs = source.load().unwrap();
        assert!(prefs.ws_enabled);
        assert_eq!(prefs.socket_base_url(), Some("http://lan:8123"));
        assert_eq!(prefs.token, "file-token");
    }

    #[test]
    fn test_no_override_passes_through() {
        let dir = TempDir::new().unwrap();
        let store = PrefsStore::new(dir.path().join("config.json"));
        let source = OverrideSource::new(store, None, Some("cli-token".to_string()));
        let prefs = source.load().unwrap();
        assert!(!prefs.ws_enabled);
        assert_eq!(prefs.token, "cli-token");
    }
}
