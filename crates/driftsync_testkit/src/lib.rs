//! # Driftsync Testkit
//!
//! Test fixtures and helpers shared by the Driftsync crates.
//!
//! Provides builder-style record construction and pre-encoded connection
//! messages for exercising the relay in tests and benchmarks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod fixtures;

pub use fixtures::{broadcast_message, ping_message, record, RecordBuilder};
