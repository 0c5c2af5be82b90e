//! Write-acceptance decision and conflict records.

use crate::record::SyncRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Outcome of evaluating a candidate write against the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDecision {
    /// Store the candidate, overwriting any previous revision.
    Accept,
    /// The stored record wins; the write is rejected as stale.
    Reject,
}

impl WriteDecision {
    /// Returns true if the candidate should be stored.
    pub fn is_accept(&self) -> bool {
        matches!(self, WriteDecision::Accept)
    }
}

/// Decides whether a candidate write supersedes the stored record.
///
/// Pure function of `(stored, candidate)`; performs no I/O.
///
/// A candidate wins with a strictly higher version, or with an equal version
/// and a strictly newer timestamp. The tie-break is a stated policy: on equal
/// version and equal timestamp the stored record wins, so re-uploading an
/// identical revision leaves stored state unchanged.
pub fn evaluate_write(stored: Option<&SyncRecord>, candidate: &SyncRecord) -> WriteDecision {
    let Some(stored) = stored else {
        return WriteDecision::Accept;
    };

    if stored.version > candidate.version {
        return WriteDecision::Reject;
    }
    if stored.version == candidate.version && stored.timestamp >= candidate.timestamp {
        return WriteDecision::Reject;
    }

    WriteDecision::Accept
}

/// Ledger entry produced when a write is rejected.
///
/// An entry is pending by existence: it is created on a rejected upload and
/// removed outright when a resolution is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    /// Ledger id, addressed by the resolve call.
    pub conflict_id: String,
    /// Owning account.
    pub user_id: String,
    /// Id of the contested record.
    pub record_id: String,
    /// The rejected candidate.
    pub candidate: SyncRecord,
    /// The authoritative stored record at rejection time.
    pub stored: SyncRecord,
    /// Creation time, Unix millis.
    pub created_at: i64,
}

impl ConflictRecord {
    /// Creates a pending entry for a rejected candidate.
    pub fn new(candidate: SyncRecord, stored: SyncRecord, now: i64) -> Self {
        Self {
            conflict_id: Uuid::new_v4().to_string(),
            user_id: stored.user_id.clone(),
            record_id: stored.id.clone(),
            candidate,
            stored,
            created_at: now,
        }
    }

    /// Builds the record that supersedes this conflict.
    ///
    /// Resolution always succeeds by construction: the new record one-ups
    /// the currently stored version and carries the resolution tag, so
    /// [`evaluate_write`] accepts it unconditionally.
    pub fn resolution_record(
        &self,
        resolution: &str,
        resolved_data: Value,
        current_version: u64,
        now: i64,
    ) -> SyncRecord {
        SyncRecord {
            id: self.record_id.clone(),
            user_id: self.user_id.clone(),
            record_type: self.stored.record_type.clone(),
            data: resolved_data,
            timestamp: now,
            origin_device_id: self.candidate.origin_device_id.clone(),
            version: current_version + 1,
            conflict_resolution: Some(resolution.to_string()),
        }
    }
}
