//! Fire-and-forget activity events.
//!
//! Side-effect tracking (usage counters, analytics hooks) is published onto
//! an unbounded queue and drained by a background task, so a slow consumer
//! can never block connection handling or broadcast latency.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// An activity event emitted off the hot path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    /// A connection registered and was greeted.
    ConnectionOpened {
        /// Owning account.
        user_id: String,
        /// Connecting device.
        device_id: String,
    },
    /// A connection was deregistered.
    ConnectionClosed {
        /// Owning account.
        user_id: String,
        /// Disconnecting device.
        device_id: String,
    },
    /// A connection-triggered broadcast was relayed.
    BroadcastRelayed {
        /// Owning account.
        user_id: String,
        /// Number of connections reached.
        delivered: usize,
    },
    /// An upload was accepted and stored.
    RecordUploaded {
        /// Owning account.
        user_id: String,
        /// Id of the stored record.
        record_id: String,
        /// Accepted version.
        version: u64,
    },
    /// An upload was rejected by the conflict decision.
    ConflictDetected {
        /// Owning account.
        user_id: String,
        /// Id of the contested record.
        record_id: String,
    },
    /// A pending conflict was superseded by a resolution.
    ConflictResolved {
        /// Owning account.
        user_id: String,
        /// Ledger id of the resolved conflict.
        conflict_id: String,
    },
}

/// Publishing half of the activity queue.
///
/// Cheap to clone; [`publish`](Self::publish) never blocks and becomes a
/// silent no-op once the receiver is gone.
#[derive(Clone)]
pub struct ActivityPublisher {
    tx: mpsc::UnboundedSender<ActivityEvent>,
}

impl ActivityPublisher {
    /// Creates a publisher and the receiving end for a drain task.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ActivityEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Creates a publisher that drops every event.
    pub fn disabled() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    /// Enqueues an event.
    pub fn publish(&self, event: ActivityEvent) {
        let _ = self.tx.send(event);
    }
}

/// Spawns a drain task that logs each event.
pub fn spawn_drain(mut rx: mpsc::UnboundedReceiver<ActivityEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            tracing::debug!("activity: {:?}", event);
        }
    })
}
