//! 终端展示端 - CLI 的本地提醒界面

use anyhow::Result;
use std::io::{self, Write};
use std::sync::Mutex;

use crate::notification::channel::{Notification, NotificationId, NotificationPresenter, Priority, SendResult};
use crate::notification::payload::ActionKind;

/// 把通知打印为紧凑的文本块
pub struct TerminalPresenter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl TerminalPresenter {
    /// 输出到 stdout
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

/// 渲染通知文本
pub fn render(id: NotificationId, notification: &Notification) -> String {
    let marker = match notification.priority {
        Priority::Critical => "!!!",
        Priority::Warning => "!",
        Priority::Info => "-",
    };

    let mut flags = Vec::new();
    if notification.popup_full_screen {
        flags.push("fullscreen");
    }
    if notification.persistent {
        flags.push("persistent");
    }
    if notification.require_ack {
        flags.push("ack");
    }

    let mut text = format!(
        "{} [{}] {} ({})",
        marker, notification.priority, notification.title, id
    );
    if !flags.is_empty() {
        text.push_str(&format!(" {{{}}}", flags.join(",")));
    }
    text.push('\n');

    if !notification.body.is_empty() {
        for line in notification.body.lines() {
            text.push_str(&format!("    {}\n", line));
        }
    }
    if let Some(image) = &notification.image {
        text.push_str(&format!("    image: {}\n", image));
    }

    for (index, action) in notification.actions.iter().enumerate() {
        let target = match action.kind() {
            Some(ActionKind::RemoteCall) => action.service.clone().unwrap_or_default(),
            Some(ActionKind::Link) => action.url.clone().unwrap_or_default(),
            None => "?".to_string(),
        };
        text.push_str(&format!("    [{}] {} -> {}\n", index, action.title, target));
    }
    text
}

impl NotificationPresenter for TerminalPresenter {
    fn name(&self) -> &str {
        "terminal"
    }

    fn present(&self, id: NotificationId, notification: &Notification) -> Result<SendResult> {
        let text = render(id, notification);
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("terminal writer poisoned"))?;
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(SendResult::Sent)
    }

    fn dismiss(&self, id: NotificationId) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("terminal writer poisoned"))?;
        writeln!(out, "- dismissed ({})", id)?;
        Ok(())
    }
}
