//! Decoded shape of a payload published on the transport.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `{"event": ..., "data": ...}` as published. Other top-level fields are
/// ignored here and forwarded untouched through the raw payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Event type, e.g. `new` or `logout`.
    #[serde(default)]
    pub event: String,
    /// Event body.
    #[serde(default)]
    pub data: Value,
}

impl MessageEnvelope {
    /// Decodes a raw payload.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// `data` when it is a JSON object.
    pub fn data_object(&self) -> Option<&Map<String, Value>> {
        self.data.as_object()
    }

    /// Notification type name (`data.name`).
    pub fn notification_name(&self) -> Option<&str> {
        self.data.get("name").and_then(Value::as_str)
    }

    /// Originating user (`data.source_user_id`).
    pub fn source_user_id(&self) -> Option<u64> {
        self.data.get("source_user_id").and_then(Value::as_u64)
    }

    /// Event name for metrics; empty events are reported as `unknown`.
    pub fn metric_label(&self) -> &str {
        if self.event.is_empty() {
            "unknown"
        } else {
            &self.event
        }
    }
}
