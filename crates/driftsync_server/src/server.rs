//! Relay server facade.

use crate::broadcast::SyncBroadcaster;
use crate::config::RelayConfig;
use crate::connection::ConnectionHandler;
use crate::events::{spawn_drain, ActivityEvent, ActivityPublisher};
use crate::gateway::SyncGateway;
use crate::registry::DeviceConnectionRegistry;
use crate::rest::RestDispatcher;
use crate::store::SyncStore;
use crate::sweep::IdleSweeper;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The sync relay server.
///
/// Constructs the registry, store, broadcaster, gateway, and connection
/// handler once and hands out shared references. There is no ambient
/// global state, and tests build fresh instances per case.
///
/// # Example
///
/// ```
/// use driftsync_server::{RelayConfig, SyncServer};
///
/// let server = SyncServer::new(RelayConfig::default());
///
/// // In a real deployment, you would mount server.dispatcher() on your
/// // HTTP stack, feed frames from your persistent-connection layer into
/// // server.handler(), and call server.start_housekeeping() once a
/// // runtime is available.
/// ```
pub struct SyncServer {
    config: RelayConfig,
    registry: Arc<DeviceConnectionRegistry>,
    store: Arc<SyncStore>,
    gateway: Arc<SyncGateway>,
    handler: ConnectionHandler,
    dispatcher: RestDispatcher,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<ActivityEvent>>>,
}

impl SyncServer {
    /// Creates a new relay server.
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(DeviceConnectionRegistry::new());
        let store = Arc::new(SyncStore::new());
        let broadcaster = Arc::new(SyncBroadcaster::new(Arc::clone(&registry)));
        let (events, events_rx) = ActivityPublisher::channel();

        let gateway = Arc::new(SyncGateway::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&broadcaster),
            events.clone(),
            &config,
        ));
        let handler = ConnectionHandler::new(Arc::clone(&registry), broadcaster, events);
        let dispatcher = RestDispatcher::new(Arc::clone(&gateway));

        Self {
            config,
            registry,
            store,
            gateway,
            handler,
            dispatcher,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// The server configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// The connection registry.
    pub fn registry(&self) -> &Arc<DeviceConnectionRegistry> {
        &self.registry
    }

    /// The record store.
    pub fn store(&self) -> &Arc<SyncStore> {
        &self.store
    }

    /// The REST operation surface.
    pub fn gateway(&self) -> &Arc<SyncGateway> {
        &self.gateway
    }

    /// The per-connection protocol handler.
    pub fn handler(&self) -> &ConnectionHandler {
        &self.handler
    }

    /// The REST route dispatcher.
    pub fn dispatcher(&self) -> &RestDispatcher {
        &self.dispatcher
    }

    /// Spawns the idle sweeper and the activity drain.
    ///
    /// Requires a tokio runtime. Calling twice spawns a second sweeper but
    /// the activity drain is attached only once.
    pub fn start_housekeeping(&self) -> Vec<JoinHandle<()>> {
        let mut handles = vec![IdleSweeper::new(
            Arc::clone(&self.registry),
            self.config.sweep_interval,
            self.config.idle_timeout,
        )
        .spawn()];

        if let Some(rx) = self.events_rx.lock().take() {
            handles.push(spawn_drain(rx));
        }
        handles
    }
}
