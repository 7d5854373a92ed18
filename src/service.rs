//! 后台服务 - 根据偏好决定连接的启停
//!
//! 定期重读偏好：启用且地址、令牌齐全时启动连接，否则停止并给出原因。
//! 偏好不变时不做任何操作。Ctrl-C 时停止连接后退出。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::config::{Prefs, PrefsSource};
use crate::connection::{ConnectionManager, ConnectionState, Endpoint};

/// 停止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Disabled,
    MissingUrl,
    MissingToken,
}

/// 启停决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceDecision {
    Start(Endpoint),
    Stop(StopReason),
}

/// 由偏好得出启停决定
pub fn decide(prefs: &Prefs) -> ServiceDecision {
    if !prefs.ws_enabled {
        return ServiceDecision::Stop(StopReason::Disabled);
    }
    let Some(endpoint) = prefs.endpoint() else {
        return ServiceDecision::Stop(StopReason::MissingUrl);
    };
    if !endpoint.has_token() {
        return ServiceDecision::Stop(StopReason::MissingToken);
    }
    ServiceDecision::Start(endpoint)
}

/// 面向用户的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Connection(ConnectionState),
    Stopped(StopReason),
}

impl ServiceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceStatus::Connection(ConnectionState::Connected) => "Connected to Home Assistant",
            ServiceStatus::Connection(ConnectionState::Connecting) => "Connecting…",
            ServiceStatus::Connection(ConnectionState::Disconnected) => "Disconnected",
            ServiceStatus::Stopped(StopReason::Disabled) => "Disabled",
            ServiceStatus::Stopped(StopReason::MissingUrl) => "URL missing",
            ServiceStatus::Stopped(StopReason::MissingToken) => "Token missing",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 连接的保活服务
pub struct NotifierService {
    manager: Arc<ConnectionManager>,
}

impl NotifierService {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    /// 应用一次决定，返回当前状态
    pub async fn apply(&self, decision: ServiceDecision) -> ServiceStatus {
        match decision {
            ServiceDecision::Start(endpoint) => {
                if self.manager.start(endpoint).await {
                    debug!("Connection session started");
                }
                ServiceStatus::Connection(self.manager.state())
            }
            ServiceDecision::Stop(reason) => {
                if self.manager.is_running().await {
                    self.manager.stop().await;
                }
                ServiceStatus::Stopped(reason)
            }
        }
    }

    /// 运行直到 Ctrl-C
    pub async fn run(&self, prefs: Arc<dyn PrefsSource>, reload_interval: Duration) {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        self.run_until(prefs, reload_interval, shutdown).await;
    }

    /// 运行直到 `shutdown` 完成
    pub async fn run_until(
        &self,
        prefs: Arc<dyn PrefsSource>,
        reload_interval: Duration,
        shutdown: impl Future<Output = ()>,
    ) {
        let manager = Arc::clone(&self.manager);
        let mut transitions = manager.subscribe_transitions();
        let status_logger = tokio::spawn(async move {
            loop {
                match transitions.recv().await {
                    Ok(state) => info!(status = %ServiceStatus::Connection(state), "Connection status"),
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "Status log lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        tokio::pin!(shutdown);
        // 只在决定变化时应用；认证失败后不会因为定时重读而自动重连
        let mut applied: Option<ServiceDecision> = None;
        let mut ticker = tokio::time::interval(reload_interval);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let decision = match prefs.load() {
                        Ok(p) => decide(&p),
                        Err(e) => {
                            warn!(error = %e, "Failed to reload preferences, keeping current session");
                            continue;
                        }
                    };
                    if applied.as_ref() == Some(&decision) {
                        continue;
                    }
                    let status = self.apply(decision.clone()).await;
                    info!(status = %status, "Preferences applied");
                    applied = Some(decision);
                }
            }
        }

        self.manager.stop().await;
        status_logger.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;

    fn prefs() -> Prefs {
        Prefs {
            lan_url: "http://192.168.1.2:8123".to_string(),
            token: "abc".to_string(),
            ws_enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_decide_start() {
        match decide(&prefs()) {
            ServiceDecision::Start(endpoint) => {
                assert_eq!(endpoint.url, "ws://192.168.1.2:8123/api/websocket");
                assert!(endpoint.has_token());
            }
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_decide_stop_reasons() {
        let disabled = Prefs {
            ws_enabled: false,
            ..prefs()
        };
        assert_eq!(decide(&disabled), ServiceDecision::Stop(StopReason::Disabled));

        let no_url = Prefs {
            lan_url: String::new(),
            ..prefs()
        };
        assert_eq!(decide(&no_url), ServiceDecision::Stop(StopReason::MissingUrl));

        let no_token = Prefs {
            token: "   ".to_string(),
            ..prefs()
        };
        assert_eq!(decide(&no_token), ServiceDecision::Stop(StopReason::MissingToken));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(
            ServiceStatus::Connection(ConnectionState::Connected).label(),
            "Connected to Home Assistant"
        );
        assert_eq!(ServiceStatus::Stopped(StopReason::MissingToken).to_string(), "Token missing");
    }

    #[tokio::test]
    async fn test_stop_decision_on_idle_manager() {
        let (manager, _frames) = ConnectionManager::new(ManagerConfig::default());
        let service = NotifierService::new(Arc::new(manager));
        let status = service.apply(ServiceDecision::Stop(StopReason::Disabled)).await;
        assert_eq!(status, ServiceStatus::Stopped(StopReason::Disabled));
        assert_eq!(service.manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_run_until_returns_on_shutdown() {
        let (manager, _frames) = ConnectionManager::new(ManagerConfig::default());
        let service = NotifierService::new(Arc::new(manager));
        let disabled: Arc<dyn PrefsSource> = Arc::new(Prefs::default());
        service
            .run_until(disabled, Duration::from_millis(10), tokio::time::sleep(Duration::from_millis(50)))
            .await;
        assert!(!service.manager.is_running().await);
    }
}
