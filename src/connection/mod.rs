//! 连接层 - 到 Home Assistant 事件 socket 的长连接
//!
//! - `backoff`: 重连退避策略
//! - `endpoint`: base URL -> socket URL
//! - `protocol`: 线上消息类型
//! - `handshake`: 认证握手状态机
//! - `manager`: 监督循环，管理单个会话的生命周期

pub mod backoff;
pub mod endpoint;
pub mod error;
pub mod handshake;
pub mod manager;
pub mod protocol;

pub use backoff::{next_delay, BackoffPolicy};
pub use endpoint::{build_ws_url, Endpoint};
pub use error::{AuthError, SessionError};
pub use handshake::{Delivery, Handshake, HandshakeState, Transition};
pub use manager::{ConnectionManager, ConnectionState, ManagerConfig};
pub use protocol::{InboundKind, OutboundMessage, SUBSCRIBED_EVENT_TYPE};
