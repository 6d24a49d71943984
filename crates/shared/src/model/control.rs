use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

pub const SKIP_WAITING: &str = "SKIP_WAITING";
pub const GET_CACHE_SIZE: &str = "GET_CACHE_SIZE";
pub const CLEAR_CACHE: &str = "CLEAR_CACHE";

/// Message sent by the hosting page to the worker
///
/// Accepts `{ "type": "..." }` objects as well as a bare `"SKIP_WAITING"`
/// string. Anything else is kept verbatim as `Unknown`
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    SkipWaiting,
    GetCacheSize,
    ClearCache,
    Unknown(Value),
}

impl ControlMessage {
    pub fn from_value(value: Value) -> Self {
        let message_type = match &value {
            Value::String(s) => Some(s.as_str()),
            Value::Object(o) => o.get("type").and_then(Value::as_str),
            _ => None,
        };

        match message_type {
            Some(SKIP_WAITING) => ControlMessage::SkipWaiting,
            Some(GET_CACHE_SIZE) => ControlMessage::GetCacheSize,
            Some(CLEAR_CACHE) => ControlMessage::ClearCache,
            _ => ControlMessage::Unknown(value),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ControlMessage::SkipWaiting => json!({ "type": SKIP_WAITING }),
            ControlMessage::GetCacheSize => json!({ "type": GET_CACHE_SIZE }),
            ControlMessage::ClearCache => json!({ "type": CLEAR_CACHE }),
            ControlMessage::Unknown(v) => v.clone(),
        }
    }
}

impl<'de> Deserialize<'de> for ControlMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self::from_value(Value::deserialize(deserializer)?))
    }
}

impl Serialize for ControlMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

/// Reply posted back on the message's reply port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    /// Total bytes across every cache namespace
    CacheSize(u64),
    CacheCleared,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_known_messages() {
        let m: ControlMessage = serde_json::from_str(r#"{"type":"GET_CACHE_SIZE"}"#).unwrap();
        assert_eq!(m, ControlMessage::GetCacheSize);

        let m: ControlMessage = serde_json::from_str(r#"{"type":"CLEAR_CACHE"}"#).unwrap();
        assert_eq!(m, ControlMessage::ClearCache);

        let m: ControlMessage = serde_json::from_str(r#""SKIP_WAITING""#).unwrap();
        assert_eq!(m, ControlMessage::SkipWaiting);
    }

    #[test]
    fn test_unknown_keeps_raw_value() {
        let m: ControlMessage =
            serde_json::from_str(r#"{"type":"PING","payload":{"n":1}}"#).unwrap();
        assert_eq!(
            m,
            ControlMessage::Unknown(json!({ "type": "PING", "payload": { "n": 1 } }))
        );

        let m: ControlMessage = serde_json::from_str("42").unwrap();
        assert_eq!(m, ControlMessage::Unknown(json!(42)));
    }

    #[test]
    fn test_reply_wire_format() {
        assert_eq!(
            serde_json::to_value(ControlReply::CacheSize(350)).unwrap(),
            json!({ "type": "CACHE_SIZE", "payload": 350 })
        );
        assert_eq!(
            serde_json::to_value(ControlReply::CacheCleared).unwrap(),
            json!({ "type": "CACHE_CLEARED" })
        );
    }
}
