//! Session configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SESSION_NAME: &str = "SATCHELSESSID";
pub const DEFAULT_MAX_LIFETIME_SECS: u64 = 1440;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Where file-backed transports keep their data. Relative paths are
    /// taken from the system temp directory.
    pub save_path: PathBuf,
    /// Logical store name handed to the transport
    pub name: String,
    /// Idle time after which garbage collection drops a session
    pub max_lifetime_secs: u64,
}

impl SessionConfig {
    pub fn new(save_path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            save_path: save_path.into(),
            name: name.into(),
            max_lifetime_secs: DEFAULT_MAX_LIFETIME_SECS,
        }
    }

    /// Defaults overlaid with `SATCHEL_SAVE_PATH`, `SATCHEL_SESSION_NAME`
    /// and `SATCHEL_MAX_LIFETIME`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("SATCHEL_SAVE_PATH") {
            config.save_path = PathBuf::from(path);
        }
        if let Ok(name) = std::env::var("SATCHEL_SESSION_NAME") {
            config.name = name;
        }
        if let Ok(lifetime) = std::env::var("SATCHEL_MAX_LIFETIME") {
            match lifetime.parse() {
                Ok(secs) => config.max_lifetime_secs = secs,
                Err(_) => {
                    tracing::warn!(value = %lifetime, "Ignoring invalid SATCHEL_MAX_LIFETIME")
                }
            }
        }

        config
    }

    pub fn resolved_save_path(&self) -> PathBuf {
        if self.save_path.is_absolute() {
            self.save_path.clone()
        } else {
            std::env::temp_dir().join(&self.save_path)
        }
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(std::env::temp_dir(), DEFAULT_SESSION_NAME)
    }
}
