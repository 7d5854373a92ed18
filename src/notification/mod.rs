//! 通知层 - 事件到本地提醒
//!
//! # 流程
//! 1. `EventPipeline` 从连接管理器接收原始帧并解码为 `NormalizedEvent`
//! 2. `NotificationDispatcher` 解析模板、合并属性、计算 dedup key
//! 3. 所有注册的 `NotificationPresenter` 展示通知（同一 ID 替换而非新增）
//!
//! # 使用示例
//! ```ignore
//! use ha_notifier::notification::{NotificationDispatcher, TerminalPresenter};
//!
//! let mut dispatcher = NotificationDispatcher::new();
//! dispatcher.register_presenter(Arc::new(TerminalPresenter::stdout()));
//! let outcome = dispatcher.dispatch(&event);
//! ```

pub mod channel;
pub mod channels;
pub mod dedup_key;
pub mod dispatcher;
pub mod payload;
pub mod pipeline;
pub mod store;
pub mod template;

pub use channel::{Notification, NotificationId, NotificationPresenter, Priority, SendResult};
pub use channels::{HistoryChannel, TerminalPresenter};
pub use dedup_key::{default_dedup_key, notification_id, resolve_dedup_key};
pub use dispatcher::{merge_attributes, DispatchOutcome, NotificationDispatcher, ResolvedAttributes};
pub use payload::{Action, ActionKind, NotificationRequest};
pub use pipeline::{EventPipeline, PipelineStats, StatsSnapshot};
pub use store::{HistoryRecord, NotificationStore};
pub use template::{JsonTemplateStore, NewTemplate, Template, TemplateResolver, TemplateStore};
