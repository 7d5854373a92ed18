//! Session failure taxonomy: authentication failures are fatal, everything else is retried.

use std::time::Duration;
use thiserror::Error;

/// Close code sent when no token is configured (policy violation)
pub const CLOSE_MISSING_TOKEN: u16 = 1008;
/// Close code sent after `auth_invalid`
pub const CLOSE_INVALID_TOKEN: u16 = 4001;

/// Credentials problem. Stops the supervising loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
}

impl AuthError {
    pub fn close_code(&self) -> u16 {
        match self {
            AuthError::MissingToken => CLOSE_MISSING_TOKEN,
            AuthError::InvalidToken => CLOSE_INVALID_TOKEN,
        }
    }
}

/// Why a session ended abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("connect failed: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("peer closed the socket (code {code:?}, reason {reason:?})")]
    Closed { code: Option<u16>, reason: String },
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SessionError {
    /// Fatal errors must not be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Auth(_))
    }

    pub fn is_retryable(&self) -> bool {
        !self.is_fatal()
    }
}
