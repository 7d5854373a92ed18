//! 事件处理管道 - 解码 + 分发，运行在 socket 读取之外
//!
//! 连接管理器只负责把原始帧放进通道；这里逐帧解码，再在阻塞线程池上分发，
//! 所以慢的展示端或模板查找不会拖住 socket 读取。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dispatcher::{DispatchOutcome, NotificationDispatcher};
use crate::decoder::decode_frame;

/// 管道计数
#[derive(Debug, Default)]
pub struct PipelineStats {
    decoded: AtomicU64,
    dropped: AtomicU64,
    dispatched: AtomicU64,
}

/// 计数快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub decoded: u64,
    pub dropped: u64,
    pub dispatched: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            decoded: self.decoded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
        }
    }
}

pub struct EventPipeline {
    dispatcher: Arc<NotificationDispatcher>,
    stats: Arc<PipelineStats>,
}

impl EventPipeline {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            dispatcher,
            stats: Arc::new(PipelineStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// 处理一帧。解码或分发失败只丢弃这一帧
    pub async fn handle_frame(&self, text: String) -> Option<DispatchOutcome> {
        let event = match decode_frame(&text) {
            Ok(event) => {
                self.stats.decoded.fetch_add(1, Ordering::Relaxed);
                event
            }
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Dropping undecodable event");
                return None;
            }
        };

        let dispatcher = self.dispatcher.clone();
        match tokio::task::spawn_blocking(move || dispatcher.dispatch(&event)).await {
            Ok(outcome) => {
                self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
                debug!(id = %outcome.id, title = %outcome.notification.title, "Event dispatched");
                Some(outcome)
            }
            Err(e) => {
                // 分发线程 panic 也只影响这一条
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Dispatch task failed");
                None
            }
        }
    }

    /// 消费帧通道直到发送端全部关闭
    pub async fn run(self, mut frames: mpsc::UnboundedReceiver<String>) {
        while let Some(text) = frames.recv().await {
            self.handle_frame(text).await;
        }
        let stats = self.stats.snapshot();
        info!(
            decoded = stats.decoded,
            dropped = stats.dropped,
            dispatched = stats.dispatched,
            "Event pipeline finished"
        );
    }

    /// 在后台任务中运行
    pub fn spawn(self, frames: mpsc::UnboundedReceiver<String>) -> JoinHandle<()> {
        tokio::spawn(self.run(frames))
    }
}
