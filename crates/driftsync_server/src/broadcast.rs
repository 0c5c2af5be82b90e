//! Broadcast fan-out to a user's other live connections.

use crate::registry::{ConnectionEntry, ConnectionId, DeviceConnectionRegistry};
use driftsync_protocol::ServerFrame;
use std::sync::Arc;

/// Relays events to a user's other live connections.
///
/// Delivery is best-effort and unordered across devices: a dead connection
/// is removed from the registry and the fan-out continues; nothing is
/// retried or rolled back.
pub struct SyncBroadcaster {
    registry: Arc<DeviceConnectionRegistry>,
}

impl SyncBroadcaster {
    /// Creates a broadcaster over the given registry.
    pub fn new(registry: Arc<DeviceConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Connection-triggered fan-out: every live connection of the user
    /// except the sender. Returns the delivered count.
    pub fn relay(&self, user_id: &str, exclude: ConnectionId, frame: &ServerFrame) -> usize {
        self.deliver(self.registry.others(user_id, exclude), frame)
    }

    /// Store-triggered fan-out: every live connection not belonging to the
    /// originating device. Returns the delivered count.
    pub fn notify(&self, user_id: &str, exclude_device: Option<&str>, frame: &ServerFrame) -> usize {
        let targets = self
            .registry
            .connections_for(user_id)
            .into_iter()
            .filter(|c| exclude_device.map_or(true, |device| c.device_id() != device))
            .collect();
        self.deliver(targets, frame)
    }

    fn deliver(&self, targets: Vec<Arc<ConnectionEntry>>, frame: &ServerFrame) -> usize {
        let mut delivered = 0;
        for target in targets {
            match target.sink().send(frame) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    // Tear down only the affected connection
                    tracing::warn!("dropping dead connection {}: {}", target.id(), e);
                    self.registry.remove(target.id());
                }
            }
        }
        delivered
    }
}
