//! Idle connection eviction.

use crate::registry::DeviceConnectionRegistry;
use driftsync_protocol::now_millis;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Periodically evicts connections idle past the configured timeout.
///
/// This is the only background task in the server. It runs alongside normal
/// connect/disconnect traffic; the registry tolerates racing removals, so a
/// connection closing mid-sweep is simply skipped.
pub struct IdleSweeper {
    registry: Arc<DeviceConnectionRegistry>,
    interval: Duration,
    idle_timeout: Duration,
}

impl IdleSweeper {
    /// Creates a sweeper with the given policy.
    pub fn new(
        registry: Arc<DeviceConnectionRegistry>,
        interval: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            interval,
            idle_timeout,
        }
    }

    /// Runs one sweep against the supplied clock; returns the evicted count.
    pub fn sweep_once(&self, now: i64) -> usize {
        self.registry.sweep(now, self.idle_timeout).len()
    }

    /// Spawns the periodic sweep task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                let evicted = self.sweep_once(now_millis());
                if evicted > 0 {
                    tracing::debug!("sweep evicted {} idle connections", evicted);
                }
            }
        })
    }
}
