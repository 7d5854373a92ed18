//! Socket endpoint derivation
//!
//! `https://host` -> `wss://host/api/websocket`, `http://host` -> `ws://host/api/websocket`,
//! `ws(s)://...` passes through untouched, a bare host is assumed to be TLS.

use std::fmt;

/// Path suffix of the event socket
pub const WEBSOCKET_PATH: &str = "/api/websocket";

/// Where to connect and what to authenticate with. Immutable per attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub auth_token: Option<String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: auth_token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Build from a user supplied base URL (see [`build_ws_url`]).
    pub fn from_base_url(base: &str, auth_token: Option<String>) -> Option<Self> {
        build_ws_url(base).map(|url| Self::new(url, auth_token))
    }

    pub fn has_token(&self) -> bool {
        self.auth_token.is_some()
    }
}

// token 不进日志
impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Rewrite a base URL into the socket URL. Blank input yields `None`.
pub fn build_ws_url(base: &str) -> Option<String> {
    let trimmed = base.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    let url = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{}{}", rest, WEBSOCKET_PATH)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{}{}", rest, WEBSOCKET_PATH)
    } else if trimmed.starts_with("wss://") || trimmed.starts_with("ws://") {
        trimmed.to_string()
    } else {
        format!("wss://{}{}", trimmed, WEBSOCKET_PATH)
    };
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_becomes_wss() {
        assert_eq!(
            build_ws_url("https://ha.example.com/").as_deref(),
            Some("wss://ha.example.com/api/websocket")
        );
    }

    #[test]
    fn test_http_becomes_ws() {
        assert_eq!(
            build_ws_url("http://192.168.1.10:8123").as_deref(),
            Some("ws://192.168.1.10:8123/api/websocket")
        );
    }

    #[test]
    fn test_socket_urls_pass_through() {
        assert_eq!(
            build_ws_url("ws://localhost:8123/api/websocket").as_deref(),
            Some("ws://localhost:8123/api/websocket")
        );
        assert_eq!(
            build_ws_url("wss://ha.local/custom").as_deref(),
            Some("wss://ha.local/custom")
        );
    }

    #[test]
    fn test_bare_host_assumed_secure() {
        assert_eq!(
            build_ws_url("ha.example.com").as_deref(),
            Some("wss://ha.example.com/api/websocket")
        );
    }

    #[test]
    fn test_blank_base_has_no_url() {
        assert_eq!(build_ws_url(""), None);
        assert_eq!(build_ws_url("   "), None);
        assert_eq!(build_ws_url("/"), None);
    }

    #[test]
    fn test_blank_token_is_dropped() {
        let endpoint = Endpoint::new("ws://h/api/websocket", Some("  ".to_string()));
        assert!(!endpoint.has_token());
    }

    #[test]
    fn test_debug_redacts_token() {
        let endpoint = Endpoint::new("ws://h", Some("secret-token".to_string()));
        let printed = format!("{:?}", endpoint);
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("redacted"));
    }
}
