//! Home Assistant REST 客户端 - 服务调用
//!
//! `POST {base}/api/services/{domain}/{service}`，带 Bearer 令牌，JSON 请求体。

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// 连接超时
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// 请求总超时
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// 服务调用请求体，只携带实体 ID
#[derive(Debug, Default, Serialize)]
pub struct ServiceCallBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

/// REST 客户端
#[derive(Debug)]
pub struct HaRestClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HaRestClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn service_url(&self, domain: &str, service: &str) -> String {
        format!("{}/api/services/{}/{}", self.base_url, domain, service)
    }

    /// 调用服务，返回 HTTP 状态码
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: Option<&str>,
    ) -> Result<StatusCode> {
        let url = self.service_url(domain, service);
        let body = ServiceCallBody {
            entity_id: entity_id
                .filter(|e| !e.trim().is_empty())
                .map(str::to_string),
        };

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("HTTP request to {} failed", url))?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "Service call completed");
        Ok(status)
    }
}
