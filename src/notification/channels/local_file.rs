//! 历史渠道 - 将展示过的通知写入 JSONL 文件

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::notification::channel::{Notification, NotificationId, NotificationPresenter, SendResult};
use crate::notification::store::{HistoryRecord, NotificationStore};

const MAX_BODY_CHARS: usize = 200;

/// 历史渠道 - 记录所有通知
pub struct HistoryChannel {
    store: Arc<NotificationStore>,
}

impl HistoryChannel {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        Self { store }
    }
}

impl NotificationPresenter for HistoryChannel {
    fn name(&self) -> &str {
        "history"
    }

    fn present(&self, id: NotificationId, notification: &Notification) -> Result<SendResult> {
        let record = HistoryRecord {
            ts: Utc::now(),
            title: notification.title.clone(),
            body: truncate_body(&notification.body, MAX_BODY_CHARS),
            priority: notification.priority,
            dedup_key: Some(notification.dedup_key.clone()),
        };

        match self.store.append(&record) {
            Ok(()) => {
                debug!(channel = "history", id = %id, "Notification recorded");
                Ok(SendResult::Sent)
            }
            Err(e) => {
                warn!(channel = "history", error = %e, "Failed to record notification");
                Ok(SendResult::Failed(e.to_string()))
            }
        }
    }

    fn dismiss(&self, _id: NotificationId) -> Result<()> {
        // 历史不随撤销删除
        Ok(())
    }
}

/// 按字符截断
fn truncate_body(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
