//! Relay server configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the relay server.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the embedding transport should bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Interval between idle sweeps.
    pub sweep_interval: Duration,
    /// Inactivity window after which a connection is evicted.
    pub idle_timeout: Duration,
    /// Maximum records returned by a single download.
    pub max_download_batch: usize,
}

impl RelayConfig {
    /// Creates a new relay configuration with the default sweep policy
    /// (60 second sweeps, 5 minute idle timeout).
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_connections: 1000,
            sweep_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(300),
            max_download_batch: 500,
        }
    }

    /// Sets the maximum concurrent connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the idle sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the maximum download batch size.
    pub fn with_max_download_batch(mut self, size: usize) -> Self {
        self.max_download_batch = size;
        self
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}
