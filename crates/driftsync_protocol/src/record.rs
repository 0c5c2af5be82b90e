//! Sync record and device metadata types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn default_version() -> u64 {
    1
}

/// The atomic unit of replicated state.
///
/// A record is keyed by `(user_id, record_type, id)`; the server keeps only
/// the highest accepted `version` per key. The `data` payload is opaque to
/// the sync core and is stored and relayed without inspection.
///
/// The wire form is camelCase JSON matching the upload body:
/// `{id, userId, type, data, timestamp, deviceId, version}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    /// Client-generated identifier, stable across revisions of the same item.
    pub id: String,
    /// Owning account.
    pub user_id: String,
    /// Category string partitioning the id-space; records with the same `id`
    /// but different types are unrelated.
    #[serde(rename = "type")]
    pub record_type: String,
    /// Opaque payload.
    #[serde(default)]
    pub data: Value,
    /// Wall-clock milliseconds assigned by the writer.
    #[serde(default)]
    pub timestamp: i64,
    /// Device that produced this revision.
    #[serde(rename = "deviceId", default)]
    pub origin_device_id: String,
    /// Strictly increasing per `(user_id, record_type, id)`; 1 when omitted.
    #[serde(default = "default_version")]
    pub version: u64,
    /// Resolution tag, present only on records written by conflict resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_resolution: Option<String>,
}

impl SyncRecord {
    /// Decodes a record from a JSON value.
    pub fn from_value(value: Value) -> crate::ProtocolResult<Self> {
        serde_json::from_value(value).map_err(|e| crate::ProtocolError::InvalidRecord(e.to_string()))
    }

    /// Encodes the record to its wire form.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Device bookkeeping metadata, distinct from connection liveness.
///
/// Used for display and push-notification targeting; the relay only exposes
/// the read/write pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Logical client endpoint identifier.
    pub device_id: String,
    /// Last time this device was seen, Unix millis.
    pub last_seen: i64,
    /// Opaque device description supplied by the client.
    #[serde(default)]
    pub info: Value,
}
