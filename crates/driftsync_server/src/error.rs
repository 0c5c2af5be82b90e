//! Error types for the relay server.

use driftsync_protocol::{ProtocolError, SyncRecord};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the relay server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed connection message.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A required field was missing or empty.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A write lost to the stored record; the authoritative copy is attached
    /// so the caller can decide how to merge.
    #[error("version conflict on record {record_id}")]
    Conflict {
        /// Ledger id of the pending conflict entry.
        conflict_id: String,
        /// Id of the contested record.
        record_id: String,
        /// The authoritative stored record.
        remote: Box<SyncRecord>,
    },

    /// Unknown conflict, device, or route.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request carried no session identity.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// A write to a dead connection.
    #[error("transport error: {0}")]
    Transport(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::Protocol(_)
                | ServerError::Validation(_)
                | ServerError::Conflict { .. }
                | ServerError::NotFound(_)
                | ServerError::Unauthenticated(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Transport(_) | ServerError::Internal(_))
    }

    /// HTTP status for the REST surface.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::Protocol(_) | ServerError::Validation(_) => 400,
            ServerError::Unauthenticated(_) => 401,
            ServerError::NotFound(_) => 404,
            ServerError::Conflict { .. } => 409,
            ServerError::Transport(_) | ServerError::Internal(_) => 500,
        }
    }
}
