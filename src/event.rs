//! Event value definition
//!
//! An event is a routing identifier plus an opaque payload. The scheduler
//! matches on the identifier only; the payload is forwarded verbatim to
//! the leaf that resolves on it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::EventType;

/// An inbound event delivered to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    event_type: EventType,
    #[serde(default)]
    payload: Value,
}

impl Event {
    /// Create an event with a payload.
    pub fn new(event_type: impl Into<EventType>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Create a payload-less signal event.
    pub fn signal(event_type: impl Into<EventType>) -> Self {
        Self::new(event_type, Value::Null)
    }

    /// Routing identifier for this event.
    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    /// Opaque payload, never interpreted by the scheduler.
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signal_event_has_null_payload() {
        let event = Event::signal("order.shipped");
        assert_eq!(event.event_type().as_str(), "order.shipped");
        assert!(event.payload().is_null());
    }

    #[test]
    fn test_event_payload_is_preserved() {
        let event = Event::new("order.created", json!({ "id": 42 }));
        assert_eq!(event.payload()["id"], json!(42));
    }
}
