use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Uniform wrapper returned on every API response, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// ISO-8601 / RFC 3339, UTC, millisecond precision
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            timestamp: now_timestamp(),
            path: None,
        }
    }

    pub fn failure(error: &str, message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            error: Some(error.to_string()),
            timestamp: now_timestamp(),
            path: None,
        }
    }
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Wrap a handler result. A value that already has the envelope shape is
/// passed through; anything else becomes `data` of a success envelope; no
/// value becomes an empty `data` object.
pub fn encode(result: Option<Value>) -> Envelope {
    match result {
        None | Some(Value::Null) => Envelope::success(json!({})),
        Some(value) => match as_envelope(&value) {
            Some(envelope) => envelope,
            None => Envelope::success(value),
        },
    }
}

fn as_envelope(value: &Value) -> Option<Envelope> {
    let object = value.as_object()?;
    if !object.get("success").map_or(false, Value::is_boolean) {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}
