//! # Driftsync Protocol
//!
//! Sync protocol types for the Driftsync relay.
//!
//! This crate provides:
//! - `SyncRecord` for replicated state
//! - `ConflictRecord` and the pure write-acceptance decision
//! - Connection message envelopes and outbound frames
//! - JSON encoding/decoding
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod envelope;
mod error;
mod record;

pub use conflict::{evaluate_write, ConflictRecord, WriteDecision};
pub use envelope::{ClientAction, ClientEnvelope, ServerFrame};
pub use error::{ProtocolError, ProtocolResult};
pub use record::{now_millis, DeviceRecord, SyncRecord};
