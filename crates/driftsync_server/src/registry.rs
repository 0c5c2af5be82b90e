//! Live connection registry.

use crate::error::{ServerError, ServerResult};
use crate::sink::ConnectionSink;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Process-unique identifier for a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live connection owned by the registry.
pub struct ConnectionEntry {
    id: ConnectionId,
    user_id: String,
    device_id: String,
    sink: Arc<dyn ConnectionSink>,
    last_activity: AtomicI64,
}

impl ConnectionEntry {
    /// The connection's registry id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Owning account.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Device behind this connection.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The outbound transport handle.
    pub fn sink(&self) -> &Arc<dyn ConnectionSink> {
        &self.sink
    }

    /// Last activity time, Unix millis.
    pub fn last_activity(&self) -> i64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    fn touch(&self, now: i64) {
        self.last_activity.store(now, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct RegistryInner {
    by_user: HashMap<String, Vec<Arc<ConnectionEntry>>>,
    user_of: HashMap<ConnectionId, String>,
}

/// Tracks every live per-user, per-device connection.
///
/// Constructed once at process start and shared by reference; handlers never
/// reach into the maps directly, so the locking discipline lives here.
/// Multiple simultaneous connections per `(user, device)` are independent
/// entries (reconnect races leave both registered until one closes or is
/// swept).
pub struct DeviceConnectionRegistry {
    inner: RwLock<RegistryInner>,
    next_id: AtomicU64,
}

impl DeviceConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a live connection.
    ///
    /// Refuses registration when either identifier is empty; the transport
    /// adapter closes such a connection before any message exchange.
    pub fn add(
        &self,
        user_id: &str,
        device_id: &str,
        sink: Arc<dyn ConnectionSink>,
        now: i64,
    ) -> ServerResult<ConnectionId> {
        if user_id.is_empty() || device_id.is_empty() {
            return Err(ServerError::Validation(
                "userId and deviceId are required".into(),
            ));
        }

        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(ConnectionEntry {
            id,
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            sink,
            last_activity: AtomicI64::new(now),
        });

        let mut inner = self.inner.write();
        inner
            .by_user
            .entry(user_id.to_string())
            .or_default()
            .push(entry);
        inner.user_of.insert(id, user_id.to_string());

        Ok(id)
    }

    /// Deregisters a connection.
    ///
    /// Removing an already-removed id is a no-op, so disconnects racing the
    /// sweep never double-free an entry. A user whose connection set becomes
    /// empty is dropped entirely.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.write();
        let Some(user_id) = inner.user_of.remove(&id) else {
            return false;
        };
        if let Some(connections) = inner.by_user.get_mut(&user_id) {
            connections.retain(|c| c.id != id);
            if connections.is_empty() {
                inner.by_user.remove(&user_id);
            }
        }
        true
    }

    /// Every other live connection of the user, for fan-out.
    pub fn others(&self, user_id: &str, exclude: ConnectionId) -> Vec<Arc<ConnectionEntry>> {
        let inner = self.inner.read();
        inner
            .by_user
            .get(user_id)
            .map(|connections| {
                connections
                    .iter()
                    .filter(|c| c.id != exclude)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every live connection of the user.
    pub fn connections_for(&self, user_id: &str) -> Vec<Arc<ConnectionEntry>> {
        let inner = self.inner.read();
        inner.by_user.get(user_id).cloned().unwrap_or_default()
    }

    /// Refreshes the activity clock for a connection.
    pub fn touch(&self, id: ConnectionId, now: i64) {
        let inner = self.inner.read();
        let Some(user_id) = inner.user_of.get(&id) else {
            return;
        };
        if let Some(entry) = inner
            .by_user
            .get(user_id)
            .and_then(|connections| connections.iter().find(|c| c.id == id))
        {
            entry.touch(now);
        }
    }

    /// Distinct device ids with at least one live connection.
    pub fn connected_devices(&self, user_id: &str) -> Vec<String> {
        let inner = self.inner.read();
        let mut devices: Vec<String> = inner
            .by_user
            .get(user_id)
            .map(|connections| connections.iter().map(|c| c.device_id.clone()).collect())
            .unwrap_or_default();
        devices.sort();
        devices.dedup();
        devices
    }

    /// Number of live connections across all users.
    pub fn len(&self) -> usize {
        self.inner.read().user_of.len()
    }

    /// Returns true if no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().user_of.is_empty()
    }

    /// Number of users with at least one live connection.
    pub fn user_count(&self) -> usize {
        self.inner.read().by_user.len()
    }

    /// Evicts every connection idle past the timeout.
    ///
    /// Each closure is isolated: a failing sink is logged and the sweep
    /// continues. Eviction goes through [`remove`](Self::remove), so a
    /// connection that disconnected between the scan and the eviction is
    /// skipped rather than freed twice. Returns the evicted ids.
    pub fn sweep(&self, now: i64, idle_timeout: Duration) -> Vec<ConnectionId> {
        let cutoff = idle_timeout.as_millis() as i64;
        let expired: Vec<Arc<ConnectionEntry>> = {
            let inner = self.inner.read();
            inner
                .by_user
                .values()
                .flatten()
                .filter(|c| now - c.last_activity() > cutoff)
                .cloned()
                .collect()
        };

        let mut evicted = Vec::new();
        for entry in expired {
            if !self.remove(entry.id()) {
                continue;
            }
            if let Err(e) = entry.sink().close() {
                tracing::warn!("failed to close evicted connection {}: {}", entry.id(), e);
            }
            tracing::debug!(
                "evicted idle connection {} (user {}, device {})",
                entry.id(),
                entry.user_id(),
                entry.device_id()
            );
            evicted.push(entry.id());
        }
        evicted
    }
}

impl Default for DeviceConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
