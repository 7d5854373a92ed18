//! 动作执行 - 用户点按通知按钮后的回调
//!
//! 两类动作：
//! - 远程服务调用（`domain.service`），通过 REST 接口
//! - 打开链接，交给系统默认程序
//!
//! 执行从不返回 `Err`：结果统一为 [`ActionResult`]，同时推送到提示通道。
//! 成功后调用方应撤销来源通知（[`ActionExecutor::invoke`] 会自动处理）。

pub mod rest;

use anyhow::{anyhow, Result};
use std::io;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::PrefsSource;
use crate::notification::{Action, ActionKind, NotificationDispatcher, NotificationId};

pub use rest::HaRestClient;

/// 失败原因，`Display` 即用户可见文本
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionFailure {
    #[error("missing service")]
    MissingService,
    #[error("invalid service format")]
    InvalidServiceFormat,
    #[error("missing url")]
    MissingUrl,
    #[error("missing token")]
    MissingToken,
    #[error("call failed")]
    CallFailed,
    #[error("invalid link")]
    InvalidLink,
    #[error("missing target")]
    MissingTarget,
}

/// 执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    /// 失败时的原因
    pub failure: Option<ActionFailure>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            failure: None,
        }
    }

    pub fn failed(reason: ActionFailure) -> Self {
        Self {
            success: false,
            message: reason.to_string(),
            failure: Some(reason),
        }
    }
}

/// 拆分 `domain.service`，两段都不能为空
pub fn split_service(service_ref: &str) -> Result<(&str, &str), ActionFailure> {
    let trimmed = service_ref.trim();
    if trimmed.is_empty() {
        return Err(ActionFailure::MissingService);
    }
    match trimmed.split_once('.') {
        Some((domain, service)) if !domain.trim().is_empty() && !service.trim().is_empty() => {
            Ok((domain.trim(), service.trim()))
        }
        _ => Err(ActionFailure::InvalidServiceFormat),
    }
}

/// 规范化链接：无协议时补 `https://`；空白或无法解析返回 None
pub fn normalize_url(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    Url::parse(&candidate).ok()
}

/// `scheme:` 前缀判断；`host:8123` 这种端口写法不算协议
fn has_scheme(raw: &str) -> bool {
    if raw.contains("://") {
        return true;
    }
    let Some((scheme, rest)) = raw.split_once(':') else {
        return false;
    };
    let valid_scheme = scheme
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic())
        .unwrap_or(false)
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    let looks_like_port = rest
        .split(['/', '?', '#'])
        .next()
        .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);
    valid_scheme && !looks_like_port
}

/// 打开链接的外部环境
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &Url) -> Result<()>;
}

/// 使用系统默认程序打开（xdg-open / open / cmd start）
pub struct SystemLinkOpener;

impl LinkOpener for SystemLinkOpener {
    fn open(&self, url: &Url) -> Result<()> {
        let command = if cfg!(target_os = "macos") {
            let mut c = Command::new("open");
            c.arg(url.as_str());
            c
        } else if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", "", url.as_str()]);
            c
        } else {
            let mut c = Command::new("xdg-open");
            c.arg(url.as_str());
            c
        };

        launch_detached(command)?;
        Ok(())
    }
}

/// 启动子进程并在后台线程回收，不阻塞调用方；只保证已发起打开，不等待目标加载
pub fn launch_detached(mut command: Command) -> Result<thread::JoinHandle<io::Result<ExitStatus>>> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| anyhow!("Failed to launch link opener: {}", e))?;
    let reaper = thread::Builder::new()
        .name("link-opener-reaper".to_string())
        .spawn(move || child.wait())
        .map_err(|e| anyhow!("Failed to start reaper thread: {}", e))?;
    Ok(reaper)
}

/// 动作执行器
pub struct ActionExecutor {
    prefs: Arc<dyn PrefsSource>,
    opener: Arc<dyn LinkOpener>,
    toasts: Option<mpsc::UnboundedSender<ActionResult>>,
    dispatcher: Option<Arc<NotificationDispatcher>>,
}

impl ActionExecutor {
    pub fn new(prefs: Arc<dyn PrefsSource>, opener: Arc<dyn LinkOpener>) -> Self {
        Self {
            prefs,
            opener,
            toasts: None,
            dispatcher: None,
        }
    }

    /// 结果同时推送到提示通道
    pub fn with_toasts(mut self, toasts: mpsc::UnboundedSender<ActionResult>) -> Self {
        self.toasts = Some(toasts);
        self
    }

    /// 成功后通过分发器撤销来源通知
    pub fn with_dispatcher(mut self, dispatcher: Arc<NotificationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// 执行动作
    pub async fn execute(&self, action: &Action) -> ActionResult {
        let result = match action.kind() {
            Some(ActionKind::RemoteCall) => self.call_service(action).await,
            Some(ActionKind::Link) => self.open_url(action.url.as_deref().unwrap_or_default()),
            None => ActionResult::failed(ActionFailure::MissingTarget),
        };
        info!(
            action = %action.title,
            success = result.success,
            message = %result.message,
            "Action executed"
        );
        self.report(&result);
        result
    }

    /// 直接打开链接（点按图片或正文链接）
    pub fn open_link(&self, raw: &str) -> ActionResult {
        let result = self.open_url(raw);
        self.report(&result);
        result
    }

    /// 在独立任务中执行；成功则撤销 `notification_id`
    pub fn invoke(self: &Arc<Self>, action: Action, notification_id: Option<NotificationId>) -> JoinHandle<ActionResult> {
        let executor = Arc::clone(self);
        tokio::spawn(async move {
            let result = executor.execute(&action).await;
            if result.success {
                if let (Some(id), Some(dispatcher)) = (notification_id, executor.dispatcher.clone()) {
                    let dismissed = tokio::task::spawn_blocking(move || dispatcher.dismiss(id)).await;
                    if let Err(e) = dismissed {
                        warn!(id = %id, error = %e, "Dismiss task failed");
                    }
                }
            }
            result
        })
    }

    async fn call_service(&self, action: &Action) -> ActionResult {
        let (domain, service) = match split_service(action.service.as_deref().unwrap_or_default()) {
            Ok(parts) => parts,
            Err(reason) => return ActionResult::failed(reason),
        };

        // 每次执行时读取配置，避免使用过期的地址或令牌
        let prefs = match self.prefs.load() {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(error = %e, "Failed to load preferences for action");
                return ActionResult::failed(ActionFailure::MissingUrl);
            }
        };
        let Some(base_url) = prefs.service_base_url() else {
            return ActionResult::failed(ActionFailure::MissingUrl);
        };
        let Some(token) = prefs.token() else {
            return ActionResult::failed(ActionFailure::MissingToken);
        };

        let client = match HaRestClient::new(base_url, Some(token.to_string())) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Failed to build REST client");
                return ActionResult::failed(ActionFailure::CallFailed);
            }
        };

        match client
            .call_service(domain, service, action.entity_id.as_deref())
            .await
        {
            Ok(status) if status.is_success() => ActionResult::ok("action sent"),
            Ok(status) => {
                warn!(domain, service, status = status.as_u16(), "Service call rejected");
                ActionResult::failed(ActionFailure::CallFailed)
            }
            Err(e) => {
                warn!(domain, service, error = %e, "Service call failed");
                ActionResult::failed(ActionFailure::CallFailed)
            }
        }
    }

    fn open_url(&self, raw: &str) -> ActionResult {
        let Some(url) = normalize_url(raw) else {
            return ActionResult::failed(ActionFailure::InvalidLink);
        };
        match self.opener.open(&url) {
            Ok(()) => {
                debug!(url = %url, "Link opened");
                ActionResult::ok("link opened")
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to open link");
                ActionResult::failed(ActionFailure::InvalidLink)
            }
        }
    }

    fn report(&self, result: &ActionResult) {
        if let Some(toasts) = &self.toasts {
            // 没有接收方时忽略
            let _ = toasts.send(result.clone());
        }
    }
}
