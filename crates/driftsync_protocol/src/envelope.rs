//! Connection message envelopes and outbound frames.

use crate::error::{ProtocolError, ProtocolResult};
use serde_json::{json, Value};

/// Action requested by an inbound connection message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Liveness probe; refreshes the connection's activity clock.
    Ping,
    /// Relay the payload to the user's other live connections.
    Broadcast,
    /// Parseable envelope with an unrecognized action string.
    Unknown(String),
}

/// An inbound `{action, payload}` envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientEnvelope {
    /// The requested action.
    pub action: ClientAction,
    /// Opaque payload; `null` when omitted.
    pub payload: Value,
}

impl ClientEnvelope {
    /// Decodes an envelope from a raw message.
    ///
    /// A message that is not a JSON object with a string `action` is a
    /// malformed envelope. An unrecognized action string still decodes, so
    /// the handler can answer it without dropping the connection.
    pub fn decode(raw: &str) -> ProtocolResult<Self> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let map = value
            .as_object()
            .ok_or_else(|| ProtocolError::Malformed("expected object".into()))?;
        let action = map
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::Malformed("missing action".into()))?;

        let action = match action {
            "ping" => ClientAction::Ping,
            "broadcast" => ClientAction::Broadcast,
            other => ClientAction::Unknown(other.to_string()),
        };
        let payload = map.get("payload").cloned().unwrap_or(Value::Null);

        Ok(Self { action, payload })
    }

    /// Encodes the envelope back to its wire form.
    pub fn encode(&self) -> String {
        let action = match &self.action {
            ClientAction::Ping => "ping",
            ClientAction::Broadcast => "broadcast",
            ClientAction::Unknown(other) => other.as_str(),
        };
        json!({"action": action, "payload": self.payload}).to_string()
    }
}

/// An outbound frame sent to a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// Greeting sent once on connect, before any message is processed.
    Connected {
        /// Owning account.
        user_id: String,
        /// Connecting device.
        device_id: String,
        /// Connect time, Unix millis.
        timestamp: i64,
    },
    /// Relayed broadcast payload.
    Data(Value),
    /// Reply to a ping.
    Pong {
        /// Reply time, Unix millis.
        timestamp: i64,
    },
    /// Error report; the connection stays open.
    Error(String),
}

impl ServerFrame {
    /// Creates an error frame.
    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error(message.into())
    }

    /// Encodes the frame to its JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            ServerFrame::Connected {
                user_id,
                device_id,
                timestamp,
            } => json!({
                "type": "sync:connected",
                "payload": {
                    "userId": user_id,
                    "deviceId": device_id,
                    "timestamp": timestamp,
                },
            }),
            ServerFrame::Data(payload) => json!({
                "type": "sync:data",
                "payload": payload,
            }),
            ServerFrame::Pong { timestamp } => json!({
                "type": "pong",
                "timestamp": timestamp,
            }),
            ServerFrame::Error(message) => json!({"error": message}),
        }
    }

    /// Encodes the frame to its wire form.
    pub fn encode(&self) -> String {
        self.to_value().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ping() {
        let envelope = ClientEnvelope::decode(r#"{"action":"ping"}"#).unwrap();
        assert_eq!(envelope.action, ClientAction::Ping);
        assert_eq!(envelope.payload, Value::Null);
    }

    #[test]
    fn decode_broadcast_with_payload() {
        let envelope =
            ClientEnvelope::decode(r#"{"action":"broadcast","payload":{"id":"r1"}}"#).unwrap();
        assert_eq!(envelope.action, ClientAction::Broadcast);
        assert_eq!(envelope.payload["id"], "r1");
    }

    #[test]
    fn decode_unknown_action() {
        let envelope = ClientEnvelope::decode(r#"{"action":"subscribe"}"#).unwrap();
        assert_eq!(envelope.action, ClientAction::Unknown("subscribe".into()));
    }

    #[test]
    fn decode_malformed() {
        assert!(ClientEnvelope::decode("not json").is_err());
        assert!(ClientEnvelope::decode("[1,2,3]").is_err());
        assert!(ClientEnvelope::decode(r#"{"payload":{}}"#).is_err());
        assert!(ClientEnvelope::decode(r#"{"action":42}"#).is_err());
    }

    #[test]
    fn envelope_roundtrip() {
        let envelope = ClientEnvelope {
            action: ClientAction::Broadcast,
            payload: json!({"kind": "note-changed"}),
        };
        let decoded = ClientEnvelope::decode(&envelope.encode()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn connected_frame_encoding() {
        let frame = ServerFrame::Connected {
            user_id: "u1".into(),
            device_id: "d1".into(),
            timestamp: 99,
        };
        let value = frame.to_value();
        assert_eq!(value["type"], "sync:connected");
        assert_eq!(value["payload"]["userId"], "u1");
        assert_eq!(value["payload"]["deviceId"], "d1");
        assert_eq!(value["payload"]["timestamp"], 99);
    }

    #[test]
    fn data_frame_encoding() {
        let frame = ServerFrame::Data(json!({"id": "r1"}));
        let value = frame.to_value();
        assert_eq!(value["type"], "sync:data");
        assert_eq!(value["payload"]["id"], "r1");
    }

    #[test]
    fn pong_frame_encoding() {
        let value = ServerFrame::Pong { timestamp: 7 }.to_value();
        assert_eq!(value["type"], "pong");
        assert_eq!(value["timestamp"], 7);
    }

    #[test]
    fn error_frame_has_no_type_field() {
        let value = ServerFrame::error("Unknown action").to_value();
        assert_eq!(value["error"], "Unknown action");
        assert!(value.get("type").is_none());
    }
}
