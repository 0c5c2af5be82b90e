//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while decoding protocol input.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The message was not a parseable `{action, payload}` envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// A record body failed to decode.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
