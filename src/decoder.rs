//! Event decoder - wire frame -> `NormalizedEvent`
//!
//! The `data` of an `event` frame arrives in one of three shapes:
//! 1. a JSON object: used as is
//! 2. a string holding YAML (a JSON superset): parsed, root must be a mapping
//! 3. anything else / missing: dropped
//!
//! YAML values are converted into the same `serde_json::Value` model, so every
//! downstream consumer sees one representation regardless of the wire encoding.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Canonical intermediate form of an inbound event
pub type NormalizedEvent = Map<String, Value>;

/// Upper bound on embedded payload size (characters)
pub const MAX_MARKUP_CHARS: usize = 1_000_000;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    InvalidFrame(#[source] serde_json::Error),
    #[error("frame type is {0:?}, expected \"event\"")]
    NotAnEvent(Option<String>),
    #[error("event carries no data")]
    MissingData,
    #[error("embedded payload is blank")]
    BlankPayload,
    #[error("embedded payload exceeds {MAX_MARKUP_CHARS} characters")]
    PayloadTooLarge,
    #[error("embedded payload could not be parsed: {0}")]
    Markup(#[source] serde_yaml::Error),
    #[error("payload root is {0}, expected a mapping")]
    NotAMapping(&'static str),
}

/// Decode a whole `event` text frame.
pub fn decode_frame(text: &str) -> Result<NormalizedEvent, DecodeError> {
    let root: Value = serde_json::from_str(text).map_err(DecodeError::InvalidFrame)?;
    match root.get("type").and_then(Value::as_str) {
        Some("event") => {}
        other => return Err(DecodeError::NotAnEvent(other.map(str::to_string))),
    }
    let data = root.get("event").and_then(|event| event.get("data"));
    decode_data(data)
}

/// Decode the `event.data` field.
pub fn decode_data(data: Option<&Value>) -> Result<NormalizedEvent, DecodeError> {
    match data {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(raw)) => parse_markup(raw),
        Some(Value::Null) | None => Err(DecodeError::MissingData),
        Some(other) => Err(DecodeError::NotAMapping(json_kind(other))),
    }
}

/// Parse an embedded YAML/JSON document into a mapping.
pub fn parse_markup(raw: &str) -> Result<NormalizedEvent, DecodeError> {
    if raw.trim().is_empty() {
        return Err(DecodeError::BlankPayload);
    }
    if raw.chars().count() > MAX_MARKUP_CHARS {
        return Err(DecodeError::PayloadTooLarge);
    }

    let parsed: serde_yaml::Value = serde_yaml::from_str(raw).map_err(DecodeError::Markup)?;
    match from_yaml(parsed) {
        Value::Object(map) => Ok(map),
        other => Err(DecodeError::NotAMapping(json_kind(&other))),
    }
}

/// Element-wise conversion into the canonical value model.
///
/// Mappings and sequences recurse, null stays null, scalars pass through,
/// anything else becomes its string form.
pub fn from_yaml(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => yaml_number(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(items.into_iter().map(from_yaml).collect()),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                // null keys carry no name
                if let Some(name) = yaml_key(key) {
                    map.insert(name, from_yaml(value));
                }
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value),
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Value::Number(u.into())
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            // .nan / .inf have no JSON number form
            .unwrap_or_else(|| Value::String(n.to_string()))
    }
}

fn yaml_key(key: serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::Null => None,
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Tagged(tagged) => yaml_key(tagged.value),
        other => serde_yaml::to_string(&other)
            .ok()
            .map(|s| s.trim().to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
