//! 通知模型与展示端 trait 定义

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::payload::Action;

/// 优先级，同时决定展示渠道
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Info,
    Warning,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Info => "info",
            Priority::Warning => "warning",
            Priority::Critical => "critical",
        }
    }

    /// 解析（大小写不敏感），未知值返回 None
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "info" => Some(Priority::Info),
            "warning" => Some(Priority::Warning),
            "critical" => Some(Priority::Critical),
            _ => None,
        }
    }

    /// 渠道 ID
    pub fn channel_id(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 展示端使用的稳定 ID，同一 dedup key 总是得到同一 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub u64);

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// 最终交给展示端的通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub persistent: bool,
    /// 全屏弹出（仅 critical + popup）
    pub popup_full_screen: bool,
    pub require_ack: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibration_pattern: Option<Vec<u64>>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub timeout_sec: u32,
    pub dedup_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// 发送结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 发送成功
    Sent,
    /// 跳过
    Skipped(String),
    /// 发送失败
    Failed(String),
}

/// 展示端（本地提醒界面）
pub trait NotificationPresenter: Send + Sync {
    /// 名称（用于日志）
    fn name(&self) -> &str;

    /// 展示通知。同一 `id` 再次展示时替换而不是新增
    fn present(&self, id: NotificationId, notification: &Notification) -> Result<SendResult>;

    /// 撤销通知（动作执行成功后调用）
    fn dismiss(&self, id: NotificationId) -> Result<()>;
}
