//! Stateless operation surface for REST callers.

use crate::broadcast::SyncBroadcaster;
use crate::config::RelayConfig;
use crate::error::{ServerError, ServerResult};
use crate::events::{ActivityEvent, ActivityPublisher};
use crate::registry::DeviceConnectionRegistry;
use crate::store::SyncStore;
use driftsync_protocol::{
    evaluate_write, now_millis, ConflictRecord, DeviceRecord, ServerFrame, SyncRecord,
    WriteDecision,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Acknowledgement for an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAck {
    /// Timestamp of the stored revision.
    pub timestamp: i64,
}

/// Per-device view returned by [`SyncGateway::status`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    /// Logical device id.
    pub device_id: String,
    /// Last time the device checked in, if it ever registered metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<i64>,
    /// Whether the device has a live connection right now.
    pub connected: bool,
    /// Opaque device description.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub info: Value,
}

/// Aggregate view returned by [`SyncGateway::status`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    /// Timestamp of the newest stored record, if any.
    pub last_sync: Option<i64>,
    /// Number of stored records.
    pub total_items: usize,
    /// Number of pending conflicts.
    pub pending_conflicts: usize,
    /// Known and live devices, merged.
    pub devices: Vec<DeviceStatus>,
}

/// Drives the store, the conflict decision, and the broadcaster for callers
/// that are not on a persistent connection.
///
/// The accept path's store write and the broadcast trigger are independent:
/// broadcast is best-effort and a delivery failure never rolls back a
/// successful write.
pub struct SyncGateway {
    store: Arc<SyncStore>,
    registry: Arc<DeviceConnectionRegistry>,
    broadcaster: Arc<SyncBroadcaster>,
    events: ActivityPublisher,
    max_download_batch: usize,
}

impl SyncGateway {
    /// Creates a gateway over the given resources.
    pub fn new(
        store: Arc<SyncStore>,
        registry: Arc<DeviceConnectionRegistry>,
        broadcaster: Arc<SyncBroadcaster>,
        events: ActivityPublisher,
        config: &RelayConfig,
    ) -> Self {
        Self {
            store,
            registry,
            broadcaster,
            events,
            max_download_batch: config.max_download_batch,
        }
    }

    /// Validates and applies an upload.
    ///
    /// Accepted writes are stored and the user's other devices are notified
    /// so they can pull the change. Rejected writes register a pending
    /// conflict and surface the authoritative record to the caller.
    pub fn upload(&self, record: SyncRecord) -> ServerResult<UploadAck> {
        let mut missing = Vec::new();
        if record.id.is_empty() {
            missing.push("id");
        }
        if record.record_type.is_empty() {
            missing.push("type");
        }
        if record.user_id.is_empty() {
            missing.push("userId");
        }
        if record.data.is_null() {
            missing.push("data");
        }
        if !missing.is_empty() {
            return Err(ServerError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let stored = self
            .store
            .get(&record.user_id, &record.record_type, &record.id);

        match evaluate_write(stored.as_ref(), &record) {
            WriteDecision::Accept => {
                let ack = UploadAck {
                    timestamp: record.timestamp,
                };
                self.events.publish(ActivityEvent::RecordUploaded {
                    user_id: record.user_id.clone(),
                    record_id: record.id.clone(),
                    version: record.version,
                });
                self.store.put(record.clone());
                self.notify_peers(&record);
                Ok(ack)
            }
            WriteDecision::Reject => {
                // Reject is only produced against an existing record
                let Some(stored) = stored else {
                    return Err(ServerError::Internal(
                        "write rejected without a stored record".into(),
                    ));
                };
                // A replayed identical revision (e.g. an upload retry) is
                // not a conflict: state is unchanged and the ack stands.
                if stored.version == record.version
                    && stored.timestamp == record.timestamp
                    && stored.data == record.data
                {
                    return Ok(UploadAck {
                        timestamp: stored.timestamp,
                    });
                }
                let conflict = ConflictRecord::new(record, stored.clone(), now_millis());
                let conflict_id = conflict.conflict_id.clone();
                self.events.publish(ActivityEvent::ConflictDetected {
                    user_id: stored.user_id.clone(),
                    record_id: stored.id.clone(),
                });
                self.store.add_conflict(conflict);
                Err(ServerError::Conflict {
                    conflict_id,
                    record_id: stored.id.clone(),
                    remote: Box::new(stored),
                })
            }
        }
    }

    /// Records changed since `since`, excluding the device's own writes.
    pub fn download(
        &self,
        user_id: &str,
        since: i64,
        exclude_device: Option<&str>,
    ) -> ServerResult<Vec<SyncRecord>> {
        if user_id.is_empty() {
            return Err(ServerError::Unauthenticated("missing user identity".into()));
        }
        let mut records = self.store.get_since(user_id, since, exclude_device);
        records.truncate(self.max_download_batch);
        Ok(records)
    }

    /// Store counters plus the merged device list (metadata and live
    /// connections).
    pub fn status(&self, user_id: &str) -> ServerResult<StatusSummary> {
        if user_id.is_empty() {
            return Err(ServerError::Validation("userId is required".into()));
        }

        let stats = self.store.stats(user_id);
        let live: HashSet<String> = self
            .registry
            .connected_devices(user_id)
            .into_iter()
            .collect();

        let mut devices: Vec<DeviceStatus> = self
            .store
            .devices(user_id)
            .into_iter()
            .map(|d| DeviceStatus {
                connected: live.contains(&d.device_id),
                device_id: d.device_id,
                last_seen: Some(d.last_seen),
                info: d.info,
            })
            .collect();

        // Live connections without metadata still show up
        for device_id in live {
            if !devices.iter().any(|d| d.device_id == device_id) {
                devices.push(DeviceStatus {
                    device_id,
                    last_seen: None,
                    connected: true,
                    info: Value::Null,
                });
            }
        }
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));

        Ok(StatusSummary {
            last_sync: stats.last_sync_timestamp,
            total_items: stats.total_items,
            pending_conflicts: stats.pending_conflicts,
            devices,
        })
    }

    /// Supersedes a pending conflict with a resolution record.
    ///
    /// Always succeeds given the conflict exists: the resolution one-ups the
    /// currently stored version and is written unconditionally.
    pub fn resolve_conflict(
        &self,
        user_id: &str,
        conflict_id: &str,
        resolution: &str,
        resolved_data: Value,
    ) -> ServerResult<()> {
        let Some(conflict) = self.store.take_conflict(user_id, conflict_id) else {
            return Err(ServerError::NotFound(format!("conflict {conflict_id}")));
        };

        let current_version = self
            .store
            .get(user_id, &conflict.stored.record_type, &conflict.record_id)
            .map_or(conflict.stored.version, |r| r.version);

        let record =
            conflict.resolution_record(resolution, resolved_data, current_version, now_millis());
        self.store.put(record.clone());

        self.events.publish(ActivityEvent::ConflictResolved {
            user_id: user_id.to_string(),
            conflict_id: conflict_id.to_string(),
        });
        self.notify_peers(&record);
        Ok(())
    }

    /// The user's known devices.
    pub fn devices(&self, user_id: &str) -> ServerResult<Vec<DeviceRecord>> {
        if user_id.is_empty() {
            return Err(ServerError::Validation("userId is required".into()));
        }
        Ok(self.store.devices(user_id))
    }

    /// Creates or refreshes a device metadata entry.
    pub fn upsert_device(&self, user_id: &str, device_id: &str, info: Value) -> ServerResult<()> {
        if user_id.is_empty() || device_id.is_empty() {
            return Err(ServerError::Validation(
                "userId and deviceId are required".into(),
            ));
        }
        self.store.upsert_device(user_id, device_id, info, now_millis());
        Ok(())
    }

    /// Tells the user's other devices to pull the change; best-effort.
    fn notify_peers(&self, record: &SyncRecord) {
        let frame = ServerFrame::Data(json!({
            "event": "record-updated",
            "id": record.id,
            "type": record.record_type,
            "timestamp": record.timestamp,
            "deviceId": record.origin_device_id,
        }));
        let exclude = (!record.origin_device_id.is_empty())
            .then_some(record.origin_device_id.as_str());
        self.broadcaster.notify(&record.user_id, exclude, &frame);
    }
}
