//! Wire messages exchanged over the event socket (JSON text frames)

use serde::Serialize;

/// Event type requested in `subscribe_events`
pub const SUBSCRIBED_EVENT_TYPE: &str = "app_notify";

/// Kind of an inbound frame, read from its `type` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    AuthRequired,
    AuthOk,
    AuthInvalid,
    Event,
    /// JSON object with some other `type` (e.g. `result`)
    Other(String),
    /// Not a JSON object or no string `type`
    Untyped,
}

impl InboundKind {
    /// Classify a raw text frame.
    pub fn classify(text: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => return InboundKind::Untyped,
        };
        match value.get("type").and_then(|t| t.as_str()) {
            Some("auth_required") => InboundKind::AuthRequired,
            Some("auth_ok") => InboundKind::AuthOk,
            Some("auth_invalid") => InboundKind::AuthInvalid,
            Some("event") => InboundKind::Event,
            Some(other) => InboundKind::Other(other.to_string()),
            None => InboundKind::Untyped,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InboundKind::AuthRequired => "auth_required",
            InboundKind::AuthOk => "auth_ok",
            InboundKind::AuthInvalid => "auth_invalid",
            InboundKind::Event => "event",
            InboundKind::Other(kind) => kind,
            InboundKind::Untyped => "<untyped>",
        }
    }
}

/// Frames sent by the client.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Auth { access_token: String },
    SubscribeEvents { id: u64, event_type: String },
}

impl OutboundMessage {
    pub fn subscribe(id: u64) -> Self {
        OutboundMessage::SubscribeEvents {
            id,
            event_type: SUBSCRIBED_EVENT_TYPE.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Auth { .. } => "auth",
            OutboundMessage::SubscribeEvents { .. } => "subscribe_events",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl std::fmt::Debug for OutboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutboundMessage::Auth { .. } => f.write_str("Auth { access_token: <redacted> }"),
            OutboundMessage::SubscribeEvents { id, event_type } => f
                .debug_struct("SubscribeEvents")
                .field("id", id)
                .field("event_type", event_type)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_kinds() {
        assert_eq!(InboundKind::classify(r#"{"type":"auth_required","ha_version":"2024.1"}"#), InboundKind::AuthRequired);
        assert_eq!(InboundKind::classify(r#"{"type":"auth_ok"}"#), InboundKind::AuthOk);
        assert_eq!(InboundKind::classify(r#"{"type":"auth_invalid","message":"bad"}"#), InboundKind::AuthInvalid);
        assert_eq!(InboundKind::classify(r#"{"id":1,"type":"event","event":{}}"#), InboundKind::Event);
    }

    #[test]
    fn test_classify_other_and_untyped() {
        assert_eq!(
            InboundKind::classify(r#"{"id":1,"type":"result","success":true}"#),
            InboundKind::Other("result".to_string())
        );
        assert_eq!(InboundKind::classify("not json"), InboundKind::Untyped);
        assert_eq!(InboundKind::classify(r#"{"type":42}"#), InboundKind::Untyped);
        assert_eq!(InboundKind::classify("[1,2]"), InboundKind::Untyped);
    }

    #[test]
    fn test_auth_message_shape() {
        let msg = OutboundMessage::Auth { access_token: "abc".to_string() };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"type": "auth", "access_token": "abc"}));
    }

    #[test]
    fn test_subscribe_message_shape() {
        let msg = OutboundMessage::subscribe(1);
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "subscribe_events", "id": 1, "event_type": "app_notify"})
        );
    }

    #[test]
    fn test_auth_debug_hides_token() {
        let msg = OutboundMessage::Auth { access_token: "abc".to_string() };
        assert!(!format!("{:?}", msg).contains("abc"));
    }
}
