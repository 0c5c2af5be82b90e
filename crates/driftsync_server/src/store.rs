//! Latest-version record store and bookkeeping ledgers.

use driftsync_protocol::{ConflictRecord, DeviceRecord, SyncRecord};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Aggregate counters for a user's replicated state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Timestamp of the newest stored record, if any.
    pub last_sync_timestamp: Option<i64>,
    /// Number of stored records.
    pub total_items: usize,
    /// Number of pending conflict entries.
    pub pending_conflicts: usize,
    /// Number of known devices (metadata ledger, not live connections).
    pub devices: usize,
}

/// `(record_type, id)` - the per-user record key.
type RecordKey = (String, String);

#[derive(Default)]
struct StoreInner {
    records: HashMap<String, HashMap<RecordKey, SyncRecord>>,
    conflicts: HashMap<String, Vec<ConflictRecord>>,
    devices: HashMap<String, HashMap<String, DeviceRecord>>,
}

/// Holds the latest accepted revision of every record, plus the pending
/// conflict and device metadata ledgers.
///
/// `put` is an unconditional overwrite: callers run candidates through
/// [`driftsync_protocol::evaluate_write`] first, so the write-acceptance
/// rule and the storage stay separable. Records are never physically
/// deleted; deletion is a record revision whose payload convention belongs
/// to the collaborator.
pub struct SyncStore {
    inner: RwLock<StoreInner>,
}

impl SyncStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Stores the record as the latest revision for its key.
    pub fn put(&self, record: SyncRecord) {
        let mut inner = self.inner.write();
        let key = (record.record_type.clone(), record.id.clone());
        inner
            .records
            .entry(record.user_id.clone())
            .or_default()
            .insert(key, record);
    }

    /// Returns the latest revision for the key, if any.
    pub fn get(&self, user_id: &str, record_type: &str, id: &str) -> Option<SyncRecord> {
        let inner = self.inner.read();
        inner
            .records
            .get(user_id)
            .and_then(|records| records.get(&(record_type.to_string(), id.to_string())))
            .cloned()
    }

    /// All of the user's records with `timestamp > since`, excluding records
    /// produced by `exclude_device` (a device never needs its own writes).
    /// Sorted by timestamp, then id for determinism.
    pub fn get_since(
        &self,
        user_id: &str,
        since: i64,
        exclude_device: Option<&str>,
    ) -> Vec<SyncRecord> {
        let inner = self.inner.read();
        let mut records: Vec<SyncRecord> = inner
            .records
            .get(user_id)
            .map(|records| {
                records
                    .values()
                    .filter(|r| r.timestamp > since)
                    .filter(|r| {
                        exclude_device.map_or(true, |device| r.origin_device_id != device)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
        records
    }

    /// Aggregate counters for the user.
    pub fn stats(&self, user_id: &str) -> StoreStats {
        let inner = self.inner.read();
        let records = inner.records.get(user_id);
        StoreStats {
            last_sync_timestamp: records
                .and_then(|records| records.values().map(|r| r.timestamp).max()),
            total_items: records.map_or(0, HashMap::len),
            pending_conflicts: inner.conflicts.get(user_id).map_or(0, Vec::len),
            devices: inner.devices.get(user_id).map_or(0, HashMap::len),
        }
    }

    /// Registers a pending conflict entry.
    pub fn add_conflict(&self, conflict: ConflictRecord) {
        let mut inner = self.inner.write();
        inner
            .conflicts
            .entry(conflict.user_id.clone())
            .or_default()
            .push(conflict);
    }

    /// Removes and returns the pending conflict with the given id.
    pub fn take_conflict(&self, user_id: &str, conflict_id: &str) -> Option<ConflictRecord> {
        let mut inner = self.inner.write();
        let conflicts = inner.conflicts.get_mut(user_id)?;
        let position = conflicts.iter().position(|c| c.conflict_id == conflict_id)?;
        let conflict = conflicts.remove(position);
        if conflicts.is_empty() {
            inner.conflicts.remove(user_id);
        }
        Some(conflict)
    }

    /// The user's pending conflicts, oldest first.
    pub fn pending_conflicts(&self, user_id: &str) -> Vec<ConflictRecord> {
        let inner = self.inner.read();
        inner.conflicts.get(user_id).cloned().unwrap_or_default()
    }

    /// Creates or refreshes a device metadata entry.
    pub fn upsert_device(&self, user_id: &str, device_id: &str, info: Value, now: i64) {
        let mut inner = self.inner.write();
        inner.devices.entry(user_id.to_string()).or_default().insert(
            device_id.to_string(),
            DeviceRecord {
                device_id: device_id.to_string(),
                last_seen: now,
                info,
            },
        );
    }

    /// The user's known devices, sorted by id.
    pub fn devices(&self, user_id: &str) -> Vec<DeviceRecord> {
        let inner = self.inner.read();
        let mut devices: Vec<DeviceRecord> = inner
            .devices
            .get(user_id)
            .map(|devices| devices.values().cloned().collect())
            .unwrap_or_default();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        devices
    }
}

impl Default for SyncStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftsync_protocol::ConflictRecord;
    use serde_json::json;

    fn make_record(id: &str, device: &str, timestamp: i64, version: u64) -> SyncRecord {
        SyncRecord {
            id: id.into(),
            user_id: "u1".into(),
            record_type: "note".into(),
            data: json!({"text": "hello"}),
            timestamp,
            origin_device_id: device.into(),
            version,
            conflict_resolution: None,
        }
    }

    #[test]
    fn put_and_get() {
        let store = SyncStore::new();
        store.put(make_record("r1", "d1", 100, 1));

        let record = store.get("u1", "note", "r1").unwrap();
        assert_eq!(record.version, 1);
        assert!(store.get("u1", "note", "r2").is_none());
        assert!(store.get("u2", "note", "r1").is_none());
    }

    #[test]
    fn put_overwrites_latest_revision() {
        let store = SyncStore::new();
        store.put(make_record("r1", "d1", 100, 1));
        store.put(make_record("r1", "d2", 200, 2));

        let record = store.get("u1", "note", "r1").unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.origin_device_id, "d2");
        assert_eq!(store.stats("u1").total_items, 1);
    }

    #[test]
    fn same_id_different_type_are_unrelated() {
        let store = SyncStore::new();
        store.put(make_record("r1", "d1", 100, 1));
        let mut preference = make_record("r1", "d1", 100, 5);
        preference.record_type = "preference".into();
        store.put(preference);

        assert_eq!(store.get("u1", "note", "r1").unwrap().version, 1);
        assert_eq!(store.get("u1", "preference", "r1").unwrap().version, 5);
        assert_eq!(store.stats("u1").total_items, 2);
    }

    #[test]
    fn get_since_filters_by_timestamp_and_device() {
        let store = SyncStore::new();
        store.put(make_record("r1", "d1", 100, 1));
        store.put(make_record("r2", "d1", 200, 1));
        store.put(make_record("r3", "d2", 300, 1));

        let all = store.get_since("u1", 0, None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, "r1"); // timestamp order

        let since_150 = store.get_since("u1", 150, None);
        assert_eq!(since_150.len(), 2);

        // d1 never needs its own writes back
        let for_d1 = store.get_since("u1", 0, Some("d1"));
        assert_eq!(for_d1.len(), 1);
        assert_eq!(for_d1[0].id, "r3");
    }

    #[test]
    fn stats_counts_everything() {
        let store = SyncStore::new();
        assert_eq!(store.stats("u1"), StoreStats::default());

        store.put(make_record("r1", "d1", 100, 1));
        store.put(make_record("r2", "d1", 250, 1));
        store.add_conflict(ConflictRecord::new(
            make_record("r1", "d2", 90, 1),
            make_record("r1", "d1", 100, 1),
            300,
        ));
        store.upsert_device("u1", "d1", json!({"platform": "ios"}), 400);

        let stats = store.stats("u1");
        assert_eq!(stats.last_sync_timestamp, Some(250));
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.pending_conflicts, 1);
        assert_eq!(stats.devices, 1);
    }

    #[test]
    fn conflict_ledger_lifecycle() {
        let store = SyncStore::new();
        let conflict = ConflictRecord::new(
            make_record("r1", "d2", 90, 1),
            make_record("r1", "d1", 100, 1),
            300,
        );
        let conflict_id = conflict.conflict_id.clone();
        store.add_conflict(conflict);

        assert_eq!(store.pending_conflicts("u1").len(), 1);
        assert!(store.take_conflict("u1", "nope").is_none());

        let taken = store.take_conflict("u1", &conflict_id).unwrap();
        assert_eq!(taken.record_id, "r1");
        assert!(store.pending_conflicts("u1").is_empty());
        // Taking twice finds nothing
        assert!(store.take_conflict("u1", &conflict_id).is_none());
    }

    #[test]
    fn device_ledger_upsert() {
        let store = SyncStore::new();
        store.upsert_device("u1", "d1", json!({"platform": "ios"}), 100);
        store.upsert_device("u1", "d1", json!({"platform": "android"}), 200);
        store.upsert_device("u1", "d2", Value::Null, 150);

        let devices = store.devices("u1");
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_id, "d1");
        assert_eq!(devices[0].last_seen, 200);
        assert_eq!(devices[0].info["platform"], "android");
    }
}
