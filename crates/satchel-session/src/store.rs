//! Store handle
//!
//! A [`Store`] is a cursor onto one node of a session's tree. Mutations
//! through it persist the whole session tree before returning.

use satchel_storage::SessionTransport;

use crate::flash::Flash;
use crate::session::Session;
use crate::tree::NodeId;
use crate::value::Value;
use crate::Result;

pub struct Store<'a, T: SessionTransport> {
    session: &'a mut Session<T>,
    node: NodeId,
}

impl<'a, T: SessionTransport> Store<'a, T> {
    pub(crate) fn new(session: &'a mut Session<T>, node: NodeId) -> Self {
        Self { session, node }
    }

    pub fn name(&self) -> &str {
        self.session.tree.name(self.node)
    }

    /// Dotted path from the session root, empty for the root store.
    pub fn path(&self) -> String {
        self.session.tree.path(self.node)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.session.tree.get(self.node, key)
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
        self.session.tree.contains(self.node, key)
    }

    pub(crate) fn value_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.session.tree.get_mut(self.node, key)
    }

    /// Store `value` under `key`, creating any missing stores along the path.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.session.tree.set(self.node, key, value.into());
        self.write();
    }

    /// Remove the data entry and the child store named by the last segment
    /// of `key`. A path through missing stores is a no-op.
    pub fn remove(&mut self, key: &str) {
        if self.session.tree.remove(self.node, key) {
            self.write();
        }
    }

    /// Remove this store and everything below it from its parent.
    ///
    /// Fails with [`SessionError::CannotRemoveRoot`](crate::SessionError::CannotRemoveRoot)
    /// on the root store.
    pub fn remove_self(self) -> Result<()> {
        self.session.tree.remove_node(self.node)?;
        self.write();
        Ok(())
    }

    pub fn get_store(&mut self, namespace: &str, create_if_not_exists: bool) -> Option<Store<'_, T>> {
        let node = self
            .session
            .tree
            .get_store(self.node, namespace, create_if_not_exists)?;
        Some(Store::new(self.session, node))
    }

    pub fn create_store(&mut self, namespace: &str) -> Store<'_, T> {
        // Creation only fails on a detached node, which a live handle never is
        let node = self
            .session
            .tree
            .get_store(self.node, namespace, true)
            .unwrap_or(self.node);
        Store::new(self.session, node)
    }

    pub fn flash(&mut self) -> Flash<'_, T> {
        Flash::new(Store::new(self.session, self.node))
    }

    pub fn data_keys(&self) -> Vec<&str> {
        self.session.tree.data_keys(self.node)
    }

    pub fn store_names(&self) -> Vec<&str> {
        self.session.tree.store_names(self.node)
    }

    /// Number of data entries in this store, child stores excluded.
    pub fn len(&self) -> usize {
        self.session.tree.data_len(self.node)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist the whole session tree.
    pub fn write(&self) -> bool {
        self.session.write()
    }
}
