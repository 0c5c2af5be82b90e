//! # Driftsync Server
//!
//! Cross-device synchronization relay for Driftsync.
//!
//! This crate provides:
//! - A device connection registry with idle eviction
//! - A best-effort broadcast relay to a user's other live connections
//! - Versioned conflict detection over the latest-version record store
//! - A REST gateway (upload, download, status, conflict resolution, device
//!   bookkeeping) and a transport-agnostic route dispatcher
//!
//! # Architecture
//!
//! The registry and the store are the only shared mutable state; both are
//! lock-guarded and all access goes through their exposed operations, so the
//! locking discipline lives in one place per resource. Each resource is
//! constructed once by [`SyncServer::new`] and injected by reference into
//! every handler. There is no ambient global state, and tests build fresh
//! instances.
//!
//! A device opens a persistent connection and registers with the registry;
//! writes normally go through the REST `upload` path, which runs the
//! conflict decision against the store and, on success, notifies the user's
//! other live connections so they can pull the change via `download`.
//! Delivery is best-effort: a dead connection is torn down and the fan-out
//! continues.
//!
//! # Example
//!
//! ```
//! use driftsync_server::{RelayConfig, SyncServer};
//!
//! let server = SyncServer::new(RelayConfig::default());
//!
//! // In a real deployment, you would mount server.dispatcher() on your
//! // HTTP stack and feed frames from your persistent-connection layer
//! // into server.handler().
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production paths must not panic; unwrap/expect are confined to tests
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod broadcast;
mod config;
mod connection;
mod error;
mod events;
mod gateway;
mod registry;
mod rest;
mod server;
mod sink;
mod store;
mod sweep;

pub use broadcast::SyncBroadcaster;
pub use config::RelayConfig;
pub use connection::{ConnectionHandler, ConnectionSession};
pub use error::{ServerError, ServerResult};
pub use events::{spawn_drain, ActivityEvent, ActivityPublisher};
pub use gateway::{DeviceStatus, StatusSummary, SyncGateway, UploadAck};
pub use registry::{ConnectionEntry, ConnectionId, DeviceConnectionRegistry};
pub use rest::{Method, RestDispatcher, RestRequest, RestResponse};
pub use server::SyncServer;
pub use sink::{ChannelSink, ConnectionSink, RecordingSink};
pub use store::{StoreStats, SyncStore};
pub use sweep::IdleSweeper;
