//! Satchel Storage Layer
//!
//! Persistence transports for serialized session trees.
//! A transport only ever sees opaque bytes keyed by session identifier;
//! every write replaces the whole blob for that identifier.

mod database;
mod error;
mod memory;
mod migrations;
mod sqlite;
mod transport;

pub use database::Database;
pub use error::StorageError;
pub use memory::MemoryTransport;
pub use sqlite::SqliteTransport;
pub use transport::SessionTransport;

pub type Result<T> = std::result::Result<T, StorageError>;
