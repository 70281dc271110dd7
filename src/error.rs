//! Error taxonomy for message handling.
//!
//! None of these are fatal: the service logs them at the call site and drops
//! the offending message.

use thiserror::Error;

use crate::terrain::TerrainError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("payload is not a JSON object: {0}")]
    Malformed(String),

    #[error("{verb} message does not contain: {field}")]
    MissingField { verb: &'static str, field: String },

    #[error("{verb} message has invalid {field}: {reason}")]
    InvalidField {
        verb: &'static str,
        field: String,
        reason: String,
    },

    #[error("unrecognised topic {0}")]
    UnknownTopic(String),

    #[error("unknown session {0}")]
    UnknownSession(String),

    #[error("client {client_id} is not allowed to {action} in session {session_id}")]
    Denied {
        action: &'static str,
        client_id: String,
        session_id: String,
    },

    #[error("invalid terrain: {0}")]
    InvalidTerrain(#[from] TerrainError),

    #[error("no bus connection")]
    Disconnected,

    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;
