//! Satchel Session Store
//!
//! - Session state is a tree of named stores addressed by dotted keys
//! - `set("a.b.c", v)` creates stores `a` and `a.b` on the way, reads never do
//! - Every mutation writes the whole tree through the session's transport
//! - Flash messages are one-shot FIFO queues kept inside any store

mod config;
mod error;
mod flash;
mod session;
mod store;
mod tree;
mod value;

pub use config::{SessionConfig, DEFAULT_MAX_LIFETIME_SECS, DEFAULT_SESSION_NAME};
pub use error::SessionError;
pub use flash::{Flash, FlashMessage};
pub use session::{Session, ROOT_STORE_NAME};
pub use store::Store;
pub use tree::{StoreSnapshot, StoreTree, MAX_VALUE_DEPTH};
pub use value::Value;

// Re-export transports so callers need a single dependency
pub use satchel_storage::{
    Database, MemoryTransport, SessionTransport, SqliteTransport, StorageError,
};

pub type Result<T> = std::result::Result<T, SessionError>;

/// Initialize logging from `RUST_LOG`, defaulting to `info`.
///
/// Returns false and leaves the existing subscriber in place when a global
/// subscriber is already installed.
pub fn init_logging() -> bool {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
