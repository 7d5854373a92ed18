//! Dedup identity for notifications
//!
//! A notification is identified by its dedup key. Re-dispatching with the same key
//! yields the same [`NotificationId`], so presenters replace the previous alert
//! instead of stacking a new one.

use sha2::{Digest, Sha256};

use super::channel::NotificationId;

/// Max characters kept from `title + body` when no collapse key is given
pub const DEFAULT_KEY_CHARS: usize = 48;

/// Default dedup key: first 48 characters of `title + body`
pub fn default_dedup_key(title: &str, body: &str) -> String {
    title.chars().chain(body.chars()).take(DEFAULT_KEY_CHARS).collect()
}

/// Explicit collapse key if non-empty, else the default key
pub fn resolve_dedup_key(collapse_key: Option<&str>, title: &str, body: &str) -> String {
    match collapse_key {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => default_dedup_key(title, body),
    }
}

/// First 8 bytes of the SHA-256 digest, big-endian. Same value across builds and platforms.
pub fn hash_content(content: &str) -> u64 {
    let digest = Sha256::digest(content.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Stable presenter identifier for a dedup key
pub fn notification_id(dedup_key: &str) -> NotificationId {
    NotificationId(hash_content(dedup_key))
}

impl NotificationId {
    pub fn from_dedup_key(dedup_key: &str) -> Self {
        notification_id(dedup_key)
    }
}
