//! Session
//!
//! Binds a store tree to a transport and an identifier. The tree is loaded
//! once on open and the whole tree is written back on every mutation.
//!
//! Two sessions opened on the same id hold independent trees. Nothing is
//! merged: whichever writes last replaces the other's payload. Callers that
//! need more must serialize access per id in the transport.

use satchel_storage::SessionTransport;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::flash::Flash;
use crate::store::Store;
use crate::tree::StoreTree;
use crate::value::Value;
use crate::Result;

/// Name of the root store of every session tree.
pub const ROOT_STORE_NAME: &str = "satchel";

pub struct Session<T: SessionTransport> {
    id: String,
    config: SessionConfig,
    transport: T,
    pub(crate) tree: StoreTree,
}

impl<T: SessionTransport> Session<T> {
    /// Open the transport and load the tree stored for `id`.
    ///
    /// `id` is opaque and passed to the transport as is; only the empty
    /// string is refused. A failed read or an unreadable payload starts an
    /// empty tree; only a transport that cannot open is an error.
    pub fn open(mut transport: T, config: SessionConfig, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(SessionError::EmptyId);
        }

        transport.open(&config.resolved_save_path(), &config.name)?;
        let tree = load_tree(&transport, &id);

        tracing::info!(
            session_id = %id,
            store = %config.name,
            stores = tree.store_count(),
            "Opened session"
        );

        Ok(Self {
            id,
            config,
            transport,
            tree,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn tree(&self) -> &StoreTree {
        &self.tree
    }

    /// Serialize the whole tree and hand it to the transport.
    ///
    /// Returns the transport's verdict. Failures are logged, never retried.
    pub fn write(&self) -> bool {
        let bytes = match self.tree.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(session_id = %self.id, "Failed to serialize session: {}", e);
                return false;
            }
        };

        match self.transport.write(&self.id, &bytes) {
            Ok(()) => {
                tracing::debug!(session_id = %self.id, bytes = bytes.len(), "Wrote session");
                true
            }
            Err(e) => {
                tracing::warn!(session_id = %self.id, "Failed to write session: {}", e);
                false
            }
        }
    }

    /// Erase the persisted session and invalidate this handle.
    pub fn kill(self) -> Result<()> {
        self.transport.destroy(&self.id)?;
        tracing::info!(session_id = %self.id, "Killed session");
        Ok(())
    }

    /// Drop the in-memory tree and re-read it from the transport.
    pub fn reload(&mut self) {
        self.tree = load_tree(&self.transport, &self.id);
    }

    /// Collect sessions idle longer than the configured lifetime.
    pub fn gc(&self) -> Result<usize> {
        Ok(self.transport.gc(self.config.max_lifetime())?)
    }

    pub fn root(&mut self) -> Store<'_, T> {
        Store::new(self, StoreTree::ROOT)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.tree.get(StoreTree::ROOT, key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tree.contains(StoreTree::ROOT, key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.root().set(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.root().remove(key);
    }

    pub fn get_store(&mut self, namespace: &str, create_if_not_exists: bool) -> Option<Store<'_, T>> {
        let node = self
            .tree
            .get_store(StoreTree::ROOT, namespace, create_if_not_exists)?;
        Some(Store::new(self, node))
    }

    pub fn create_store(&mut self, namespace: &str) -> Store<'_, T> {
        let node = self
            .tree
            .get_store(StoreTree::ROOT, namespace, true)
            .unwrap_or(StoreTree::ROOT);
        Store::new(self, node)
    }

    /// Flash queues kept in the root store.
    pub fn flash(&mut self) -> Flash<'_, T> {
        Flash::new(self.root())
    }
}

fn load_tree<T: SessionTransport>(transport: &T, id: &str) -> StoreTree {
    let bytes = match transport.read(id) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(session_id = %id, "Failed to read session, starting empty: {}", e);
            return StoreTree::new(ROOT_STORE_NAME);
        }
    };

    if bytes.is_empty() {
        return StoreTree::new(ROOT_STORE_NAME);
    }

    StoreTree::from_bytes(&bytes).unwrap_or_else(|e| {
        tracing::warn!(session_id = %id, "Discarding unreadable session payload: {}", e);
        StoreTree::new(ROOT_STORE_NAME)
    })
}
