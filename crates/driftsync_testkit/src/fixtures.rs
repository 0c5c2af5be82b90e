//! Record builders and pre-encoded connection messages.

use driftsync_protocol::{ClientAction, ClientEnvelope, SyncRecord};
use serde_json::{json, Value};

/// Builder for sync records in tests.
///
/// Defaults: type `note`, device `d1`, version 1, timestamp 1000, and a
/// small text payload. Every field can be overridden.
///
/// # Example
///
/// ```
/// use driftsync_testkit::record;
///
/// let r = record("u1", "r1").version(3).timestamp(250).build();
/// assert_eq!(r.version, 3);
/// assert_eq!(r.record_type, "note");
/// ```
pub struct RecordBuilder {
    record: SyncRecord,
}

impl RecordBuilder {
    /// Starts a builder for the given user and record id.
    pub fn new(user_id: &str, id: &str) -> Self {
        Self {
            record: SyncRecord {
                id: id.to_string(),
                user_id: user_id.to_string(),
                record_type: "note".to_string(),
                data: json!({"text": "hello"}),
                timestamp: 1000,
                origin_device_id: "d1".to_string(),
                version: 1,
                conflict_resolution: None,
            },
        }
    }

    /// Sets the record type.
    pub fn record_type(mut self, record_type: &str) -> Self {
        self.record.record_type = record_type.to_string();
        self
    }

    /// Sets the payload.
    pub fn data(mut self, data: Value) -> Self {
        self.record.data = data;
        self
    }

    /// Sets the writer timestamp.
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.record.timestamp = timestamp;
        self
    }

    /// Sets the originating device.
    pub fn device(mut self, device_id: &str) -> Self {
        self.record.origin_device_id = device_id.to_string();
        self
    }

    /// Sets the version.
    pub fn version(mut self, version: u64) -> Self {
        self.record.version = version;
        self
    }

    /// Finishes the record.
    pub fn build(self) -> SyncRecord {
        self.record
    }
}

/// Starts a record builder for the given user and record id.
pub fn record(user_id: &str, id: &str) -> RecordBuilder {
    RecordBuilder::new(user_id, id)
}

/// A pre-encoded `ping` connection message.
pub fn ping_message() -> String {
    ClientEnvelope {
        action: ClientAction::Ping,
        payload: Value::Null,
    }
    .encode()
}

/// A pre-encoded `broadcast` connection message with the given payload.
pub fn broadcast_message(payload: Value) -> String {
    ClientEnvelope {
        action: ClientAction::Broadcast,
        payload,
    }
    .encode()
}
