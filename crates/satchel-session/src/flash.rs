//! Flash messages
//!
//! One-shot messages queued under `queue.<name>` in a store. Each
//! `consume` hands back exactly one message, oldest first.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use satchel_storage::SessionTransport;

use crate::store::Store;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    name: String,
    message: String,
}

impl FlashMessage {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for FlashMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn queue_key(name: &str) -> String {
    format!("queue.{name}")
}

/// Flash queues scoped to one store.
///
/// Queue mutation is a read-modify-write of the session payload, so two
/// sessions open on the same id can lose each other's messages.
pub struct Flash<'a, T: SessionTransport> {
    store: Store<'a, T>,
}

impl<'a, T: SessionTransport> Flash<'a, T> {
    pub(crate) fn new(store: Store<'a, T>) -> Self {
        Self { store }
    }

    /// Queue a message and persist the session.
    pub fn put(&mut self, name: &str, message: &str) {
        let key = queue_key(name);
        let flash = FlashMessage::new(name, message);

        if let Some(queue) = self.store.value_mut(&key).and_then(Value::as_queue_mut) {
            queue.push_back(flash);
            self.store.write();
            return;
        }

        if self.store.contains(&key) {
            tracing::warn!(name = %name, "Replacing non-queue value at flash key");
        }
        self.store.set(&key, Value::Queue(VecDeque::from([flash])));
    }

    /// Take the oldest message for `name`.
    ///
    /// A drained queue is removed on the call that finds it empty.
    pub fn consume(&mut self, name: &str) -> Option<FlashMessage> {
        let key = queue_key(name);
        let next = self.store.value_mut(&key)?.as_queue_mut()?.pop_front();

        match next {
            Some(message) => {
                self.store.write();
                Some(message)
            }
            None => {
                self.store.remove(&key);
                None
            }
        }
    }

    /// Messages waiting under `name`.
    pub fn pending(&self, name: &str) -> usize {
        self.store
            .get(&queue_key(name))
            .and_then(Value::as_queue)
            .map_or(0, VecDeque::len)
    }
}
