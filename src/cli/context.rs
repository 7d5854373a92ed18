//! 命令共享的路径与组件装配

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::PrefsStore;
use crate::notification::{
    HistoryChannel, JsonTemplateStore, NotificationDispatcher, NotificationStore,
    TemplateResolver, TerminalPresenter,
};

/// 配置、模板与历史文件的位置；模板与历史放在配置文件同目录
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub prefs: PrefsStore,
    pub templates: PathBuf,
    pub history: PathBuf,
}

impl AppPaths {
    pub fn from_config(explicit: Option<PathBuf>) -> Self {
        let prefs = PrefsStore::locate(explicit);
        let dir = prefs.dir();
        Self {
            templates: dir.join("templates.json"),
            history: dir.join("history.jsonl"),
            prefs,
        }
    }

    pub fn template_store(&self) -> JsonTemplateStore {
        JsonTemplateStore::new(&self.templates)
    }

    pub fn history_store(&self) -> NotificationStore {
        NotificationStore::new(&self.history)
    }

    /// 终端 + 历史两个展示端的分发器
    pub fn dispatcher(&self, dry_run: bool) -> NotificationDispatcher {
        let resolver = TemplateResolver::new(Arc::new(self.template_store()));
        let mut dispatcher = NotificationDispatcher::new()
            .with_templates(resolver)
            .with_dry_run(dry_run);
        dispatcher.register_presenter(Arc::new(TerminalPresenter::stdout()));
        dispatcher.register_presenter(Arc::new(HistoryChannel::new(Arc::new(self.history_store()))));
        dispatcher
    }
}
