//! Notification request parsed from a `NormalizedEvent`
//!
//! Every field is optional except that `title`/`body` fall back to defaults.
//! Attribute fields (`priority`, `persistent`, `popup`, `requireAck`) stay `None`
//! when absent or null so the template merge can tell "not given" apart.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decoder::NormalizedEvent;

/// Title used when the event carries none
pub const DEFAULT_TITLE: &str = "Alert";

/// How an action is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Remote service call (`domain.service`)
    RemoteCall,
    /// Open a URL
    Link,
}

impl ActionKind {
    /// Wire name as written in payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::RemoteCall => "ha_service",
            ActionKind::Link => "url",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "ha_service" | "service" | "remote_call" => Some(ActionKind::RemoteCall),
            "url" | "link" => Some(ActionKind::Link),
            _ => None,
        }
    }
}

/// Button attached to a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub title: String,
    /// Declared kind as sent on the wire; see [`Action::kind`]
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Action {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            action_type: None,
            service: None,
            entity_id: None,
            url: None,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>, entity_id: Option<String>) -> Self {
        self.service = Some(service.into());
        self.entity_id = entity_id;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_type(mut self, action_type: impl Into<String>) -> Self {
        self.action_type = Some(action_type.into());
        self
    }

    /// Effective kind.
    ///
    /// A declared `type` wins (an unrecognized one yields `None`). Otherwise a
    /// non-blank `service` means a remote call, then a non-blank `url` means a link.
    pub fn kind(&self) -> Option<ActionKind> {
        if let Some(declared) = self.action_type.as_deref() {
            return ActionKind::parse(declared);
        }
        if non_blank(self.service.as_deref()) {
            Some(ActionKind::RemoteCall)
        } else if non_blank(self.url.as_deref()) {
            Some(ActionKind::Link)
        } else {
            None
        }
    }

    /// Parse one entry of an `actions` list. Entries without a non-blank title are skipped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let title = opt_string(map, "title").filter(|t| !t.trim().is_empty())?;
        Some(Self {
            title,
            action_type: opt_string(map, "type"),
            service: opt_string(map, "service"),
            entity_id: opt_string(map, "entity_id"),
            url: opt_string(map, "url"),
        })
    }
}

/// What an event asks to show, before template merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub priority: Option<String>,
    pub persistent: Option<bool>,
    pub popup: Option<bool>,
    pub require_ack: Option<bool>,
    pub sound: Option<String>,
    pub vibration: Option<Vec<u64>>,
    pub actions: Vec<Action>,
    pub image: Option<String>,
    pub timeout_sec: u32,
    pub collapse_key: Option<String>,
    pub group: Option<String>,
    pub template_id: Option<i64>,
    pub template_name: Option<String>,
}

impl NotificationRequest {
    pub fn from_event(event: &NormalizedEvent) -> Self {
        let actions = event
            .get("actions")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Action::from_value).collect())
            .unwrap_or_default();

        Self {
            title: opt_string(event, "title").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: opt_string(event, "body").unwrap_or_default(),
            priority: opt_string(event, "priority"),
            persistent: opt_bool(event, "persistent"),
            popup: opt_bool(event, "popup"),
            require_ack: opt_bool(event, "requireAck").or_else(|| opt_bool(event, "require_ack")),
            sound: opt_string(event, "sound"),
            vibration: event.get("vibration").and_then(Value::as_array).map(|items| {
                items.iter().filter_map(as_u64_lenient).collect()
            }),
            actions,
            image: opt_string(event, "image"),
            timeout_sec: event
                .get("timeout_sec")
                .and_then(as_u64_lenient)
                .map(|n| n.min(u32::MAX as u64) as u32)
                .unwrap_or(0),
            collapse_key: opt_string(event, "collapse_key").filter(|k| !k.is_empty()),
            group: opt_string(event, "group"),
            template_id: event
                .get("template_id")
                .or_else(|| event.get("templateId"))
                .and_then(as_i64_lenient),
            template_name: opt_string(event, "template_name")
                .or_else(|| opt_string(event, "templateName"))
                .or_else(|| opt_string(event, "template"))
                .filter(|n| !n.trim().is_empty()),
        }
    }
}

fn non_blank(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Any non-null value as text (strings unquoted)
fn opt_string(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn opt_bool(map: &serde_json::Map<String, Value>, key: &str) -> Option<bool> {
    match map.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_u64_lenient(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64_lenient(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
