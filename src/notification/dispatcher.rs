//! 通知分发器 - 事件 → 模板合并 → 展示端
//!
//! 每个事件独立处理：模板查找失败、展示端失败都只记录日志，不影响后续事件。

use super::channel::{Notification, NotificationId, NotificationPresenter, Priority, SendResult};
use super::dedup_key::{notification_id, resolve_dedup_key};
use super::payload::NotificationRequest;
use super::template::{Template, TemplateResolver};
use crate::decoder::NormalizedEvent;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 合并后的展示属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAttributes {
    pub priority: Priority,
    pub persistent: bool,
    pub popup: bool,
    pub require_ack: bool,
}

/// 合并规则：事件值（非 null）> 模板值 > 默认值
pub fn merge_attributes(request: &NotificationRequest, template: Option<&Template>) -> ResolvedAttributes {
    let priority = match request.priority.as_deref() {
        // 未知优先级按 info 处理，与渠道选择一致
        Some(raw) => Priority::parse(raw).unwrap_or_default(),
        None => template.map(|t| t.priority).unwrap_or_default(),
    };
    ResolvedAttributes {
        priority,
        persistent: request
            .persistent
            .or(template.map(|t| t.persistent))
            .unwrap_or(false),
        popup: request.popup.or(template.map(|t| t.popup)).unwrap_or(false),
        require_ack: request
            .require_ack
            .or(template.map(|t| t.require_ack))
            .unwrap_or(false),
    }
}

/// 一次分发的结果
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub id: NotificationId,
    pub notification: Notification,
    /// 每个展示端的结果 (名称, 结果)
    pub results: Vec<(String, SendResult)>,
}

/// 通知分发器 - 管理多个展示端
pub struct NotificationDispatcher {
    presenters: Vec<Arc<dyn NotificationPresenter>>,
    resolver: Option<TemplateResolver>,
    dry_run: bool,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self {
            presenters: Vec::new(),
            resolver: None,
            dry_run: false,
        }
    }

    /// 设置 dry-run 模式
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_templates(mut self, resolver: TemplateResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// 注册展示端
    pub fn register_presenter(&mut self, presenter: Arc<dyn NotificationPresenter>) {
        info!(presenter = presenter.name(), "Registering notification presenter");
        self.presenters.push(presenter);
    }

    pub fn presenter_count(&self) -> usize {
        self.presenters.len()
    }

    pub fn presenter_names(&self) -> Vec<&str> {
        self.presenters.iter().map(|p| p.name()).collect()
    }

    /// 由事件构建最终通知（不展示）
    pub fn build(&self, event: &NormalizedEvent) -> (NotificationId, Notification) {
        let request = NotificationRequest::from_event(event);
        self.build_request(request)
    }

    pub fn build_request(&self, request: NotificationRequest) -> (NotificationId, Notification) {
        let template = self.resolver.as_ref().and_then(|resolver| {
            resolver.resolve(request.template_id, request.template_name.as_deref())
        });
        let attrs = merge_attributes(&request, template.as_ref());

        let dedup_key = resolve_dedup_key(request.collapse_key.as_deref(), &request.title, &request.body);
        let id = notification_id(&dedup_key);

        let mut notification = Notification {
            title: request.title,
            body: request.body,
            priority: attrs.priority,
            persistent: attrs.persistent,
            popup_full_screen: false,
            require_ack: attrs.require_ack,
            channel_hint: Some(attrs.priority.channel_id().to_string()),
            sound: request.sound,
            vibration_pattern: request.vibration,
            actions: request.actions,
            image: request.image,
            timeout_sec: request.timeout_sec,
            dedup_key,
            group: request.group,
        };

        // 只有 critical + popup 会覆盖合并结果；全屏可能被环境屏蔽，常驻保证不会丢
        if attrs.priority == Priority::Critical && attrs.popup {
            notification.popup_full_screen = true;
            notification.persistent = true;
        }

        debug!(
            id = %id,
            priority = %notification.priority,
            template = ?template.as_ref().map(|t| t.name.as_str()),
            "Notification built"
        );
        (id, notification)
    }

    /// 分发事件到所有展示端
    pub fn dispatch(&self, event: &NormalizedEvent) -> DispatchOutcome {
        let (id, notification) = self.build(event);
        self.present(id, notification)
    }

    /// 展示已构建的通知
    pub fn present(&self, id: NotificationId, notification: Notification) -> DispatchOutcome {
        let mut results = Vec::with_capacity(self.presenters.len());

        for presenter in &self.presenters {
            let name = presenter.name().to_string();

            if self.dry_run {
                info!(presenter = %name, id = %id, title = %notification.title, "[DRY-RUN] Would present notification");
                results.push((name, SendResult::Skipped("dry-run".to_string())));
                continue;
            }

            let result = match presenter.present(id, &notification) {
                Ok(r) => r,
                Err(e) => {
                    warn!(presenter = %name, error = %e, "Presenter failed");
                    SendResult::Failed(e.to_string())
                }
            };
            results.push((name, result));
        }

        DispatchOutcome {
            id,
            notification,
            results,
        }
    }

    /// 在所有展示端撤销通知
    pub fn dismiss(&self, id: NotificationId) {
        for presenter in &self.presenters {
            if self.dry_run {
                info!(presenter = presenter.name(), id = %id, "[DRY-RUN] Would dismiss notification");
                continue;
            }
            if let Err(e) = presenter.dismiss(id) {
                warn!(presenter = presenter.name(), id = %id, error = %e, "Dismiss failed");
            }
        }
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::template::{NewTemplate, TemplateStore};
    use anyhow::{anyhow, Result};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// 测试用的 mock 展示端
    struct MockPresenter {
        name: String,
        presented: Mutex<Vec<(NotificationId, Notification)>>,
        dismissed: Mutex<Vec<NotificationId>>,
        fail: bool,
    }

    impl MockPresenter {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                presented: Mutex::new(Vec::new()),
                dismissed: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                fail: true,
                ..Self::new(name)
            }
        }

        fn presented_count(&self) -> usize {
            self.presented.lock().unwrap().len()
        }
    }

    impl NotificationPresenter for MockPresenter {
        fn name(&self) -> &str {
            &self.name
        }

        fn present(&self, id: NotificationId, notification: &Notification) -> Result<SendResult> {
            if self.fail {
                return Err(anyhow!("presenter down"));
            }
            self.presented.lock().unwrap().push((id, notification.clone()));
            Ok(SendResult::Sent)
        }

        fn dismiss(&self, id: NotificationId) -> Result<()> {
            self.dismissed.lock().unwrap().push(id);
            Ok(())
        }
    }

    /// 内存模板存储
    #[derive(Default)]
    struct MockStore {
        templates: Mutex<Vec<Template>>,
    }

    impl MockStore {
        fn with(templates: Vec<Template>) -> Self {
            Self {
                templates: Mutex::new(templates),
            }
        }
    }

    impl TemplateStore for MockStore {
        fn get(&self, id: i64) -> Result<Option<Template>> {
            Ok(self.templates.lock().unwrap().iter().find(|t| t.id == id).cloned())
        }
        fn by_name(&self, name: &str) -> Result<Option<Template>> {
            Ok(self.templates.lock().unwrap().iter().find(|t| t.name == name).cloned())
        }
        fn all(&self) -> Result<Vec<Template>> {
            Ok(self.templates.lock().unwrap().clone())
        }
        fn insert(&self, template: NewTemplate) -> Result<i64> {
            let mut templates = self.templates.lock().unwrap();
            let id = templates.len() as i64 + 1;
            templates.push(Template {
                id,
                name: template.name,
                priority: template.priority,
                persistent: template.persistent,
                popup: template.popup,
                require_ack: template.require_ack,
            });
            Ok(id)
        }
        fn update(&self, _template: &Template) -> Result<()> {
            Ok(())
        }
        fn delete(&self, _id: i64) -> Result<()> {
            Ok(())
        }
    }

    fn warning_template() -> Template {
        Template {
            id: 1,
            name: "warn".to_string(),
            priority: Priority::Warning,
            persistent: true,
            popup: false,
            require_ack: true,
        }
    }

    fn event(value: Value) -> NormalizedEvent {
        value.as_object().cloned().unwrap()
    }

    fn dispatcher_with_template() -> NotificationDispatcher {
        let store = Arc::new(MockStore::with(vec![warning_template()]));
        NotificationDispatcher::new().with_templates(TemplateResolver::new(store))
    }

    #[test]
    fn test_null_priority_falls_back_to_template() {
        let dispatcher = dispatcher_with_template();
        let (_, n) = dispatcher.build(&event(json!({"priority": null, "template_id": 1})));
        assert_eq!(n.priority, Priority::Warning);
        assert!(n.persistent);
        assert!(n.require_ack);
    }

    #[test]
    fn test_event_priority_beats_template() {
        let dispatcher = dispatcher_with_template();
        let (_, n) = dispatcher.build(&event(json!({"priority": "critical", "template_name": "warn"})));
        assert_eq!(n.priority, Priority::Critical);
        assert_eq!(n.channel_hint.as_deref(), Some("critical"));
    }

    #[test]
    fn test_defaults_without_template() {
        let dispatcher = NotificationDispatcher::new();
        let (_, n) = dispatcher.build(&event(json!({})));
        assert_eq!(n.title, "Alert");
        assert_eq!(n.priority, Priority::Info);
        assert!(!n.persistent);
        assert!(!n.popup_full_screen);
        assert!(!n.require_ack);
        assert_eq!(n.channel_hint.as_deref(), Some("info"));
    }

    #[test]
    fn test_event_false_overrides_template_true() {
        let dispatcher = dispatcher_with_template();
        let (_, n) = dispatcher.build(&event(json!({"template_id": 1, "persistent": false})));
        assert!(!n.persistent);
    }

    #[test]
    fn test_unknown_priority_is_info() {
        let dispatcher = NotificationDispatcher::new();
        let (_, n) = dispatcher.build(&event(json!({"priority": "urgent"})));
        assert_eq!(n.priority, Priority::Info);
    }

    #[test]
    fn test_critical_popup_forces_full_screen_and_persistent() {
        let dispatcher = NotificationDispatcher::new();
        let (_, n) = dispatcher.build(&event(json!({
            "priority": "critical", "popup": true, "persistent": false
        })));
        assert!(n.popup_full_screen);
        assert!(n.persistent);
    }

    #[test]
    fn test_popup_without_critical_stays_normal() {
        let dispatcher = NotificationDispatcher::new();
        let (_, n) = dispatcher.build(&event(json!({"priority": "warning", "popup": true})));
        assert!(!n.popup_full_screen);
        assert!(!n.persistent);
    }

    #[test]
    fn test_critical_without_popup_keeps_event_persistent() {
        let dispatcher = NotificationDispatcher::new();
        let (_, n) = dispatcher.build(&event(json!({"priority": "critical", "persistent": false})));
        assert!(!n.persistent);
        assert!(!n.popup_full_screen);
    }

    #[test]
    fn test_dedup_key_and_stable_id() {
        let dispatcher = NotificationDispatcher::new();
        let (id_a, a) = dispatcher.build(&event(json!({"title": "A", "body": "B"})));
        assert_eq!(a.dedup_key, "AB");

        let (id_1, _) = dispatcher.build(&event(json!({"title": "one", "collapse_key": "door"})));
        let (id_2, n2) = dispatcher.build(&event(json!({"title": "two", "collapse_key": "door"})));
        assert_eq!(id_1, id_2);
        assert_eq!(n2.dedup_key, "door");
        assert_ne!(id_a, id_1);
    }

    #[test]
    fn test_dispatch_fans_out_and_isolates_failures() {
        let good = Arc::new(MockPresenter::new("good"));
        let bad = Arc::new(MockPresenter::failing("bad"));
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.register_presenter(bad.clone());
        dispatcher.register_presenter(good.clone());

        let outcome = dispatcher.dispatch(&event(json!({"title": "hi"})));
        assert_eq!(good.presented_count(), 1);
        assert_eq!(outcome.results.len(), 2);
        assert!(matches!(outcome.results[0].1, SendResult::Failed(_)));
        assert_eq!(outcome.results[1].1, SendResult::Sent);
    }

    #[test]
    fn test_dry_run_presents_nothing() {
        let presenter = Arc::new(MockPresenter::new("mock"));
        let mut dispatcher = NotificationDispatcher::new().with_dry_run(true);
        dispatcher.register_presenter(presenter.clone());

        let outcome = dispatcher.dispatch(&event(json!({"title": "hi"})));
        assert_eq!(presenter.presented_count(), 0);
        assert!(matches!(outcome.results[0].1, SendResult::Skipped(_)));
    }

    #[test]
    fn test_dismiss_reaches_every_presenter() {
        let a = Arc::new(MockPresenter::new("a"));
        let b = Arc::new(MockPresenter::new("b"));
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.register_presenter(a.clone());
        dispatcher.register_presenter(b.clone());

        dispatcher.dismiss(NotificationId(7));
        assert_eq!(*a.dismissed.lock().unwrap(), vec![NotificationId(7)]);
        assert_eq!(*b.dismissed.lock().unwrap(), vec![NotificationId(7)]);
    }

    #[test]
    fn test_presenter_names() {
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.register_presenter(Arc::new(MockPresenter::new("terminal")));
        dispatcher.register_presenter(Arc::new(MockPresenter::new("history")));
        assert_eq!(dispatcher.presenter_count(), 2);
        assert_eq!(dispatcher.presenter_names(), vec!["terminal", "history"]);
    }
}
