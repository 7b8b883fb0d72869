//! Inbound events and their untyped payloads.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// The data portion of an inbound event.
///
/// The payload has no fixed shape. It may be absent (`null` or a missing
/// field), or any JSON object. Non-object JSON is treated as an absent mapping.
/// Field access is typed and never fails: a missing mapping, a missing key and
/// a value of the wrong type all read as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventPayload(Option<Map<String, Value>>);

impl EventPayload {
    /// Creates a payload from a JSON object.
    pub fn new(map: Map<String, Value>) -> Self {
        Self(Some(map))
    }

    /// Creates an absent payload.
    pub fn absent() -> Self {
        Self(None)
    }

    /// Creates a payload from any JSON value. Only objects carry fields.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(Some(map)),
            _ => Self(None),
        }
    }

    /// Returns true when the payload is absent or has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.as_ref().map_or(true, Map::is_empty)
    }

    /// Returns the raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.as_ref()?.get(key)
    }

    /// Returns the value under `key` when it is a JSON string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// Returns the value under `key` when it is a JSON string, otherwise `default`.
    pub fn str_field_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.str_field(key).unwrap_or(default)
    }
}

impl<'de> Deserialize<'de> for EventPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.map(Self::from_value).unwrap_or_default())
    }
}

impl From<Map<String, Value>> for EventPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self::new(map)
    }
}

impl From<Value> for EventPayload {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// An event delivered by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, matched against function triggers
    pub name: String,
    /// Event data
    #[serde(default)]
    pub data: EventPayload,
    /// Event id assigned by the orchestrator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Timestamp in milliseconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

impl Event {
    /// Creates an event with the given name and data.
    pub fn new(name: impl Into<String>, data: impl Into<EventPayload>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            id: None,
            ts: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_str_field_present() {
        let payload = EventPayload::from_value(json!({"name": "Ada"}));
        assert_eq!(payload.str_field("name"), Some("Ada"));
        assert!(!payload.is_empty());
    }

    #[test]
    fn test_str_field_wrong_type() {
        let payload = EventPayload::from_value(json!({"name": 42}));
        assert_eq!(payload.str_field("name"), None);
        assert_eq!(payload.get("name"), Some(&json!(42)));
    }

    #[test]
    fn test_str_field_missing_key_and_mapping() {
        assert_eq!(EventPayload::from_value(json!({})).str_field("name"), None);
        assert_eq!(EventPayload::absent().str_field("name"), None);
        assert!(EventPayload::absent().is_empty());
    }

    #[test]
    fn test_str_field_or() {
        let payload = EventPayload::from_value(json!({"name": null}));
        assert_eq!(payload.str_field_or("name", "world"), "world");
    }

    #[test]
    fn test_non_object_json_is_absent() {
        assert_eq!(EventPayload::from_value(json!([1, 2])), EventPayload::absent());
        assert_eq!(EventPayload::from_value(json!("Ada")), EventPayload::absent());
    }

    #[test]
    fn test_event_deserializes_null_and_missing_data() {
        let event: Event = serde_json::from_value(json!({"name": "hello.world", "data": null})).unwrap();
        assert!(event.data.is_empty());

        let event: Event = serde_json::from_value(json!({"name": "hello.world"})).unwrap();
        assert!(event.data.is_empty());

        let event: Event = serde_json::from_value(json!({
            "name": "hello.world",
            "data": {"name": "Ada"},
            "id": "01HZX",
            "ts": 1700000000000i64
        }))
        .unwrap();
        assert_eq!(event.data.str_field("name"), Some("Ada"));
        assert_eq!(event.id.as_deref(), Some("01HZX"));
    }
}
