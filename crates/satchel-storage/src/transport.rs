//! Session transport contract
//!
//! The session core hands a transport one serialized blob per identifier.
//! Transports never interpret the bytes.

use std::path::Path;
use std::time::Duration;

use crate::Result;

/// Raw persistence for serialized session trees.
///
/// Implementations must replace a blob atomically: a `read` issued by any
/// other handle observes either the previous or the new payload, never a
/// partial one. There is no versioning or merge; the last write wins.
pub trait SessionTransport {
    /// Prepare the transport for a logical store `name` under `save_path`.
    fn open(&mut self, save_path: &Path, name: &str) -> Result<()>;

    /// Fetch the persisted payload for `id`. An empty vector means no prior state.
    fn read(&self, id: &str) -> Result<Vec<u8>>;

    /// Replace the persisted payload for `id`.
    fn write(&self, id: &str, data: &[u8]) -> Result<()>;

    /// Irrevocably erase the payload for `id`. Erasing a missing id is not an error.
    fn destroy(&self, id: &str) -> Result<()>;

    /// Drop every payload not written within `max_lifetime`, returning how many went.
    fn gc(&self, max_lifetime: Duration) -> Result<usize>;
}

/// Store names end up in file names and row keys.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(crate::StorageError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("SATCHELSESSID").is_ok());
        assert!(validate_name("app-sessions_2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../escape").is_err());
        assert!(validate_name("with space").is_err());
    }
}
