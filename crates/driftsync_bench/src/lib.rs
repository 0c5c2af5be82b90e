//! Benchmark support for Driftsync.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
