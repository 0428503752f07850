//! In-memory transport

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::transport::{validate_name, SessionTransport};
use crate::Result;

#[derive(Debug, Clone)]
struct Entry {
    payload: Vec<u8>,
    updated_at: DateTime<Utc>,
}

/// Process-local transport. Clones share the same backing map, so two
/// handles behave like two processes talking to one store.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    entries: Arc<Mutex<HashMap<(String, String), Entry>>>,
    store_name: String,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of payloads held across every store name.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(&self, id: &str) -> (String, String) {
        (self.store_name.clone(), id.to_string())
    }
}

impl SessionTransport for MemoryTransport {
    fn open(&mut self, _save_path: &Path, name: &str) -> Result<()> {
        validate_name(name)?;
        self.store_name = name.to_string();
        Ok(())
    }

    fn read(&self, id: &str) -> Result<Vec<u8>> {
        Ok(self
            .entries
            .lock()
            .get(&self.key(id))
            .map(|entry| entry.payload.clone())
            .unwrap_or_default())
    }

    fn write(&self, id: &str, data: &[u8]) -> Result<()> {
        self.entries.lock().insert(
            self.key(id),
            Entry {
                payload: data.to_vec(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn destroy(&self, id: &str) -> Result<()> {
        self.entries.lock().remove(&self.key(id));
        Ok(())
    }

    fn gc(&self, max_lifetime: Duration) -> Result<usize> {
        let cutoff = chrono::Duration::from_std(max_lifetime)
            .ok()
            .and_then(|lifetime| Utc::now().checked_sub_signed(lifetime));

        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(store, _), entry| {
            *store != self.store_name || cutoff.map_or(true, |cutoff| entry.updated_at >= cutoff)
        });

        Ok(before - entries.len())
    }
}
