//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(#[from] satchel_storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported session payload version: {0}")]
    UnsupportedVersion(u32),

    #[error("Malformed session payload: {0}")]
    MalformedPayload(String),

    #[error("Value at {key} is nested {depth} levels deep")]
    ValueTooDeep { key: String, depth: usize },

    #[error("The root store has no parent and cannot remove itself")]
    CannotRemoveRoot,

    #[error("Session id cannot be empty")]
    EmptyId,
}
