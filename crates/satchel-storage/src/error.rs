//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport has not been opened")]
    NotOpen,

    #[error("Invalid store name: {0:?}")]
    InvalidName(String),
}
