//! HA Notifier - 订阅 Home Assistant 事件并转为本地提醒

pub mod action;
pub mod cli;
pub mod config;
pub mod connection;
pub mod decoder;
pub mod notification;
pub mod service;

pub use action::{ActionExecutor, ActionFailure, ActionResult, LinkOpener, SystemLinkOpener};
pub use config::{Prefs, PrefsSource, PrefsStore};
pub use connection::{
    build_ws_url, next_delay, BackoffPolicy, ConnectionManager, ConnectionState, Endpoint, ManagerConfig,
};
pub use decoder::{decode_data, decode_frame, DecodeError, NormalizedEvent};
pub use notification::{
    Action, ActionKind, EventPipeline, Notification, NotificationDispatcher, NotificationId,
    NotificationPresenter, Priority, SendResult, Template, TemplateResolver, TemplateStore,
};
pub use service::{decide, NotifierService, ServiceDecision, ServiceStatus, StopReason};
