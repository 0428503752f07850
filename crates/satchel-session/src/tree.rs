//! Store tree
//!
//! Nested stores live in an arena and refer to each other by [`NodeId`].
//! A child is owned by the slot table, its parent link is only an index.
//!
//! Keys are dot-delimited: every segment but the last names a store, the
//! last names a data entry inside that store. Reads never create stores,
//! writes create whatever is missing along the way.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::SessionError;
use crate::value::Value;
use crate::Result;

const PAYLOAD_VERSION: u32 = 1;

/// Deepest list/map nesting a stored value may have. Each level costs two
/// JSON levels, which keeps payloads under serde_json's recursion limit.
pub const MAX_VALUE_DEPTH: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

#[derive(Debug, Clone)]
struct StoreNode {
    name: String,
    parent: Option<NodeId>,
    data: HashMap<String, Value>,
    children: HashMap<String, NodeId>,
}

impl StoreNode {
    fn new(name: &str, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            parent,
            data: HashMap::new(),
            children: HashMap::new(),
        }
    }
}

/// Nested, serializable form of a store and everything below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub name: String,
    #[serde(default)]
    pub data: HashMap<String, Value>,
    #[serde(default)]
    pub stores: HashMap<String, StoreSnapshot>,
}

/// One store in the persisted form. Stores are listed parents first, so
/// nesting depth never shows up in the JSON.
#[derive(Serialize, Deserialize)]
struct FlatStore {
    parent: Option<usize>,
    name: String,
    #[serde(default)]
    data: HashMap<String, Value>,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    version: u32,
    stores: Vec<FlatStore>,
}

/// Splits `"a.b.c"` into `(Some("a.b"), "c")`.
fn split_key(key: &str) -> (Option<&str>, &str) {
    match key.rsplit_once('.') {
        Some((namespace, leaf)) => (Some(namespace), leaf),
        None => (None, key),
    }
}

#[derive(Debug, Clone)]
pub struct StoreTree {
    nodes: Vec<Option<StoreNode>>,
    free: Vec<usize>,
}

impl StoreTree {
    pub(crate) const ROOT: NodeId = NodeId(0);

    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Some(StoreNode::new(root_name, None))],
            free: Vec::new(),
        }
    }

    fn node(&self, id: NodeId) -> Option<&StoreNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut StoreNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn alloc(&mut self, node: StoreNode) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = Some(node);
                NodeId(index)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Releases `id` and every store below it.
    fn free_subtree(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) {
                pending.extend(node.children.into_values());
                self.free.push(id.0);
            }
        }
    }

    fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)?.children.get(name).copied()
    }

    fn create_child(&mut self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)?;
        let id = self.alloc(StoreNode::new(name, Some(parent)));
        self.node_mut(parent)?.children.insert(name.to_string(), id);
        Some(id)
    }

    /// Walks `namespace` from `scope`, creating missing stores when `create` is set.
    pub(crate) fn get_store(&mut self, scope: NodeId, namespace: &str, create: bool) -> Option<NodeId> {
        if !create {
            return self.find_store(scope, namespace);
        }

        let mut current = scope;
        for segment in namespace.split('.') {
            current = match self.child(current, segment) {
                Some(next) => next,
                None => self.create_child(current, segment)?,
            };
        }
        Some(current)
    }

    pub(crate) fn find_store(&self, scope: NodeId, namespace: &str) -> Option<NodeId> {
        namespace
            .split('.')
            .try_fold(scope, |current, segment| self.child(current, segment))
    }

    /// The store holding the leaf of `key`, without creating anything.
    fn leaf_store(&self, scope: NodeId, key: &str) -> Option<(NodeId, String)> {
        let (namespace, leaf) = split_key(key);
        let store = match namespace {
            Some(namespace) => self.find_store(scope, namespace)?,
            None => scope,
        };
        Some((store, leaf.to_string()))
    }

    pub(crate) fn get(&self, scope: NodeId, key: &str) -> Option<&Value> {
        let (store, leaf) = self.leaf_store(scope, key)?;
        self.node(store)?.data.get(&leaf)
    }

    pub(crate) fn get_mut(&mut self, scope: NodeId, key: &str) -> Option<&mut Value> {
        let (store, leaf) = self.leaf_store(scope, key)?;
        self.node_mut(store)?.data.get_mut(&leaf)
    }

    pub(crate) fn contains(&self, scope: NodeId, key: &str) -> bool {
        self.get(scope, key).is_some()
    }

    pub(crate) fn set(&mut self, scope: NodeId, key: &str, value: Value) {
        let (namespace, leaf) = split_key(key);
        let store = match namespace {
            Some(namespace) => self.get_store(scope, namespace, true),
            None => Some(scope),
        };

        if let Some(node) = store.and_then(|id| self.node_mut(id)) {
            node.data.insert(leaf.to_string(), value);
        }
    }

    /// Removes the data entry and the child store named by the last segment.
    /// Returns false when the target store does not exist.
    pub(crate) fn remove(&mut self, scope: NodeId, key: &str) -> bool {
        let Some((store, leaf)) = self.leaf_store(scope, key) else {
            return false;
        };
        let Some(node) = self.node_mut(store) else {
            return false;
        };

        node.data.remove(&leaf);
        if let Some(child) = node.children.remove(&leaf) {
            self.free_subtree(child);
        }
        true
    }

    /// Detaches `id` from its parent by identity and frees the subtree.
    pub(crate) fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let Some(node) = self.node(id) else {
            return Ok(());
        };
        let parent = node.parent.ok_or(SessionError::CannotRemoveRoot)?;

        if let Some(parent) = self.node_mut(parent) {
            parent.children.retain(|_, child| *child != id);
        }
        self.free_subtree(id);
        Ok(())
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub(crate) fn name(&self, id: NodeId) -> &str {
        self.node(id).map_or("", |node| node.name.as_str())
    }

    /// Dotted path from the root to `id`, empty for the root itself.
    pub(crate) fn path(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            segments.push(self.name(current));
            current = parent;
        }
        segments.reverse();
        segments.join(".")
    }

    pub(crate) fn data_keys(&self, id: NodeId) -> Vec<&str> {
        self.node(id)
            .map(|node| node.data.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub(crate) fn store_names(&self, id: NodeId) -> Vec<&str> {
        self.node(id)
            .map(|node| node.children.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub(crate) fn data_len(&self, id: NodeId) -> usize {
        self.node(id).map_or(0, |node| node.data.len())
    }

    /// Number of live stores, root included.
    pub fn store_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.snapshot_of(Self::ROOT)
    }

    fn snapshot_of(&self, id: NodeId) -> StoreSnapshot {
        let Some(node) = self.node(id) else {
            return StoreSnapshot {
                name: String::new(),
                data: HashMap::new(),
                stores: HashMap::new(),
            };
        };

        StoreSnapshot {
            name: node.name.clone(),
            data: node.data.clone(),
            stores: node
                .children
                .iter()
                .map(|(name, child)| (name.clone(), self.snapshot_of(*child)))
                .collect(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut stores = Vec::with_capacity(self.store_count());
        let mut pending = std::collections::VecDeque::from([(Self::ROOT, None)]);

        while let Some((id, parent)) = pending.pop_front() {
            let Some(node) = self.node(id) else {
                continue;
            };
            for (key, value) in &node.data {
                let depth = value.depth();
                if depth > MAX_VALUE_DEPTH {
                    let mut path = self.path(id);
                    if !path.is_empty() {
                        path.push('.');
                    }
                    path.push_str(key);
                    return Err(SessionError::ValueTooDeep { key: path, depth });
                }
            }

            let index = stores.len();
            stores.push(FlatStore {
                parent,
                name: node.name.clone(),
                data: node.data.clone(),
            });
            pending.extend(node.children.values().map(|child| (*child, Some(index))));
        }

        let payload = Payload {
            version: PAYLOAD_VERSION,
            stores,
        };
        Ok(serde_json::to_vec(&payload)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let payload: Payload = serde_json::from_slice(bytes)?;
        if payload.version != PAYLOAD_VERSION {
            return Err(SessionError::UnsupportedVersion(payload.version));
        }

        let mut stores = payload.stores.into_iter();
        let root = match stores.next() {
            Some(FlatStore { parent: None, name, data }) => StoreNode {
                name,
                parent: None,
                data,
                children: HashMap::new(),
            },
            _ => return Err(SessionError::MalformedPayload("missing root store".to_string())),
        };

        let mut tree = Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
        };
        for (index, store) in stores.enumerate() {
            let index = index + 1;
            let parent = match store.parent {
                Some(parent) if parent < index => NodeId(parent),
                _ => {
                    return Err(SessionError::MalformedPayload(format!(
                        "store {index} does not follow its parent"
                    )))
                }
            };

            let id = tree.alloc(StoreNode {
                name: store.name.clone(),
                parent: Some(parent),
                data: store.data,
                children: HashMap::new(),
            });
            let siblings = &mut tree
                .node_mut(parent)
                .ok_or_else(|| SessionError::MalformedPayload(format!("store {index} has no parent")))?
                .children;
            if siblings.insert(store.name, id).is_some() {
                return Err(SessionError::MalformedPayload(format!(
                    "duplicate store name under store {}",
                    parent.0
                )));
            }
        }

        Ok(tree)
    }
}

impl PartialEq for StoreTree {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot() == other.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: NodeId = StoreTree::ROOT;

    #[test]
    fn test_set_and_get_plain_key() {
        let mut tree = StoreTree::new("root");
        tree.set(ROOT, "user", Value::from("ada"));

        assert_eq!(tree.get(ROOT, "user"), Some(&Value::from("ada")));
        assert!(tree.contains(ROOT, "user"));
        assert_eq!(tree.store_count(), 1);
    }

    #[test]
    fn test_set_creates_intermediate_stores() {
        let mut tree = StoreTree::new("root");
        tree.set(ROOT, "a.b.c", Value::from(7));

        assert_eq!(tree.get(ROOT, "a.b.c"), Some(&Value::from(7)));
        assert!(tree.find_store(ROOT, "a").is_some());
        assert!(tree.find_store(ROOT, "a.b").is_some());
        // "b" is a store under "a", not a data entry
        assert_eq!(tree.get(ROOT, "a.b"), None);
        assert_eq!(tree.store_count(), 3);
    }

    #[test]
    fn test_reads_never_create_stores() {
        let tree = StoreTree::new("root");
        assert_eq!(tree.get(ROOT, "x.y.z"), None);
        assert!(!tree.contains(ROOT, "x.y"));
        assert_eq!(tree.store_count(), 1);

        let mut tree = tree;
        assert!(tree.get_store(ROOT, "x.y", false).is_none());
        assert_eq!(tree.store_count(), 1);
    }

    #[test]
    fn test_leaf_and_store_share_a_name() {
        let mut tree = StoreTree::new("root");
        tree.set(ROOT, "a", Value::from("leaf"));
        tree.set(ROOT, "a.inner", Value::from("nested"));

        assert_eq!(tree.get(ROOT, "a"), Some(&Value::from("leaf")));
        assert_eq!(tree.get(ROOT, "a.inner"), Some(&Value::from("nested")));

        // Removing by name drops both
        assert!(tree.remove(ROOT, "a"));
        assert_eq!(tree.get(ROOT, "a"), None);
        assert!(tree.find_store(ROOT, "a").is_none());
        assert_eq!(tree.store_count(), 1);
    }

    #[test]
    fn test_remove_leaf_keeps_store() {
        let mut tree = StoreTree::new("root");
        tree.set(ROOT, "a.b.c", Value::from(1));

        assert!(tree.remove(ROOT, "a.b.c"));
        assert_eq!(tree.get(ROOT, "a.b.c"), None);
        assert!(tree.find_store(ROOT, "a.b").is_some());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut tree = StoreTree::new("root");
        assert!(!tree.remove(ROOT, "nope.key"));
        assert!(!tree.remove(ROOT, "nope.key"));
        assert!(tree.remove(ROOT, "key"));
        assert!(tree.remove(ROOT, "key"));
    }

    #[test]
    fn test_remove_node_by_identity() {
        let mut tree = StoreTree::new("root");
        tree.set(ROOT, "a.b.c", Value::from(1));
        tree.set(ROOT, "b", Value::from("sibling leaf"));
        let a = tree.find_store(ROOT, "a").unwrap();

        tree.remove_node(a).unwrap();

        assert!(tree.find_store(ROOT, "a").is_none());
        assert_eq!(tree.get(ROOT, "b"), Some(&Value::from("sibling leaf")));
        assert_eq!(tree.store_count(), 1);
    }

    #[test]
    fn test_remove_root_fails() {
        let mut tree = StoreTree::new("root");
        assert!(matches!(
            tree.remove_node(ROOT),
            Err(SessionError::CannotRemoveRoot)
        ));
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut tree = StoreTree::new("root");
        tree.set(ROOT, "a.b.c", Value::from(1));
        tree.remove(ROOT, "a");
        tree.set(ROOT, "x.y.z", Value::from(2));

        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.path(tree.find_store(ROOT, "x.y").unwrap()), "x.y");
    }

    #[test]
    fn test_path_and_names() {
        let mut tree = StoreTree::new("root");
        tree.set(ROOT, "shop.cart.total", Value::from(12.5));
        let cart = tree.find_store(ROOT, "shop.cart").unwrap();

        assert_eq!(tree.name(cart), "cart");
        assert_eq!(tree.path(cart), "shop.cart");
        assert_eq!(tree.path(ROOT), "");
        assert_eq!(tree.data_keys(cart), vec!["total"]);
        assert_eq!(tree.store_names(ROOT), vec!["shop"]);
        assert_eq!(tree.data_len(cart), 1);
    }

    #[test]
    fn test_bytes_round_trip() {
        let mut tree = StoreTree::new("root");
        tree.set(ROOT, "user.name", Value::from("ada"));
        tree.set(ROOT, "user.prefs.theme", Value::from("dark"));
        tree.set(ROOT, "user.prefs.font_size", Value::from(14));
        tree.set(ROOT, "visits", Value::from(3));
        tree.set(ROOT, "token", Value::from(vec![1u8, 2, 3]));
        tree.get_store(ROOT, "empty.store", true);

        let restored = StoreTree::from_bytes(&tree.to_bytes().unwrap()).unwrap();

        assert_eq!(restored, tree);
        assert_eq!(restored.get(ROOT, "user.prefs.theme"), Some(&Value::from("dark")));
        assert!(restored.find_store(ROOT, "empty.store").is_some());
        assert_eq!(restored.store_count(), tree.store_count());
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(matches!(
            StoreTree::from_bytes(b"not json"),
            Err(SessionError::Json(_))
        ));
        assert!(matches!(
            StoreTree::from_bytes(br#"{"version":99,"stores":[]}"#),
            Err(SessionError::UnsupportedVersion(99))
        ));
        assert!(matches!(
            StoreTree::from_bytes(br#"{"version":1,"stores":[]}"#),
            Err(SessionError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_bad_parent_links() {
        // Forward reference
        let forward = br#"{"version":1,"stores":[
            {"parent":null,"name":"root"},
            {"parent":2,"name":"a"},
            {"parent":1,"name":"b"}]}"#;
        assert!(matches!(
            StoreTree::from_bytes(forward),
            Err(SessionError::MalformedPayload(_))
        ));

        let duplicate = br#"{"version":1,"stores":[
            {"parent":null,"name":"root"},
            {"parent":0,"name":"a"},
            {"parent":0,"name":"a"}]}"#;
        assert!(matches!(
            StoreTree::from_bytes(duplicate),
            Err(SessionError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_non_finite_floats_round_trip() {
        let mut tree = StoreTree::new("root");
        tree.set(ROOT, "user.name", Value::from("ada"));
        tree.set(ROOT, "stats.ratio", Value::from(f64::NAN));
        tree.set(ROOT, "stats.max", Value::from(f64::INFINITY));
        tree.set(ROOT, "stats.min", Value::from(f64::NEG_INFINITY));

        let restored = StoreTree::from_bytes(&tree.to_bytes().unwrap()).unwrap();

        assert_eq!(restored.get(ROOT, "user.name"), Some(&Value::from("ada")));
        assert!(restored.get(ROOT, "stats.ratio").and_then(Value::as_f64).unwrap().is_nan());
        assert_eq!(restored.get(ROOT, "stats.max"), Some(&Value::from(f64::INFINITY)));
        assert_eq!(restored.get(ROOT, "stats.min"), Some(&Value::from(f64::NEG_INFINITY)));
    }

    #[test]
    fn test_deep_store_paths_round_trip() {
        let segments: Vec<String> = (0..300).map(|i| format!("s{i}")).collect();
        let deep_key = format!("{}.leaf", segments.join("."));

        let mut tree = StoreTree::new("root");
        tree.set(ROOT, "keep", Value::from("me"));
        tree.set(ROOT, &deep_key, Value::from(1));

        let restored = StoreTree::from_bytes(&tree.to_bytes().unwrap()).unwrap();

        assert_eq!(restored.get(ROOT, "keep"), Some(&Value::from("me")));
        assert_eq!(restored.get(ROOT, &deep_key), Some(&Value::from(1)));
        assert_eq!(restored.store_count(), 301);
    }

    fn nested_list(depth: usize) -> Value {
        let mut value = Value::from("leaf");
        for _ in 1..depth {
            value = Value::List(vec![value]);
        }
        value
    }

    #[test]
    fn test_value_depth_limit() {
        let mut tree = StoreTree::new("root");
        tree.set(ROOT, "a.ok", nested_list(MAX_VALUE_DEPTH));

        let restored = StoreTree::from_bytes(&tree.to_bytes().unwrap()).unwrap();
        assert_eq!(
            restored.get(ROOT, "a.ok").map(Value::depth),
            Some(MAX_VALUE_DEPTH)
        );

        tree.set(ROOT, "a.too_deep", nested_list(MAX_VALUE_DEPTH + 1));
        match tree.to_bytes() {
            Err(SessionError::ValueTooDeep { key, depth }) => {
                assert_eq!(key, "a.too_deep");
                assert_eq!(depth, MAX_VALUE_DEPTH + 1);
            }
            other => panic!("expected ValueTooDeep, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_segments() {
        let mut tree = StoreTree::new("root");
        tree.set(ROOT, "a..b", Value::from(1));
        tree.set(ROOT, ".c", Value::from(2));
        tree.set(ROOT, "d.", Value::from(3));

        // Empty segments name stores and leaves called ""
        assert!(tree.find_store(ROOT, "a.").is_some());
        assert!(tree.find_store(ROOT, "").is_some());
        assert_eq!(tree.data_keys(tree.find_store(ROOT, "d").unwrap()), vec![""]);
        assert_eq!(tree.get(ROOT, "a..b"), Some(&Value::from(1)));
        assert_eq!(tree.get(ROOT, "a.b"), None);

        let restored = StoreTree::from_bytes(&tree.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, tree);
        assert_eq!(restored.get(ROOT, ".c"), Some(&Value::from(2)));
        assert_eq!(restored.get(ROOT, "d."), Some(&Value::from(3)));
    }
}
