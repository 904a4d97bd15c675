//! Layered metadata with nearest-ancestor fallback
//!
//! Every node in the registry (project, subproject, task, category, work and
//! version) holds a sparse local [`Metadata`] map. A lookup walks the node's
//! ownership chain upward and returns the first value found; values are
//! never merged across levels. Writes only ever touch the node they are
//! called on.

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A metadata value: a scalar or a short list (frame ranges, resolutions)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<MetaValue>),
}

impl MetaValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetaValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            MetaValue::Float(value) => Some(*value),
            MetaValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MetaValue]> {
        match self {
            MetaValue::List(values) => Some(values),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Bool(value) => write!(f, "{value}"),
            MetaValue::Int(value) => write!(f, "{value}"),
            MetaValue::Float(value) => write!(f, "{value}"),
            MetaValue::Text(value) => write!(f, "{value}"),
            MetaValue::List(values) => {
                let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Int(value)
    }
}

impl From<i32> for MetaValue {
    fn from(value: i32) -> Self {
        MetaValue::Int(value as i64)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Float(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

impl<T: Into<MetaValue>> From<Vec<T>> for MetaValue {
    fn from(values: Vec<T>) -> Self {
        MetaValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// The local metadata layer of one node
#[derive(Debug, Default)]
pub struct Metadata {
    items: RwLock<BTreeMap<String, MetaValue>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(items: BTreeMap<String, MetaValue>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// Value stored on this node only
    pub fn get_local(&self, key: &str) -> Option<MetaValue> {
        self.items.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.read().contains_key(key)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.items.write().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<MetaValue> {
        self.items.write().remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.items.read().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Copy of the local map
    pub fn snapshot(&self) -> BTreeMap<String, MetaValue> {
        self.items.read().clone()
    }
}

impl Clone for Metadata {
    fn clone(&self) -> Self {
        Self::from_map(self.snapshot())
    }
}

impl PartialEq for Metadata {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot() == other.snapshot()
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.read().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeMap::deserialize(deserializer).map(Metadata::from_map)
    }
}

/// A node taking part in the metadata override chain
pub trait MetadataNode: Send + Sync {
    /// The node's own layer
    fn metadata(&self) -> &Metadata;

    /// The owning node one level up, `None` at the project root
    fn parent_node(&self) -> Option<Arc<dyn MetadataNode>>;
}

/// Chain lookups available on every [`MetadataNode`]
pub trait MetadataLookup {
    /// Ancestors of this node, nearest first
    fn walk_chain(&self) -> Vec<Arc<dyn MetadataNode>>;

    /// First value for `key` on this node or its ancestors
    fn lookup(&self, key: &str) -> Option<MetaValue>;

    /// Like [`lookup`](Self::lookup), falling back to `default`
    fn get(&self, key: &str, default: Option<MetaValue>) -> Option<MetaValue> {
        self.lookup(key).or(default)
    }

    /// Set a value on this node only
    fn set(&self, key: &str, value: impl Into<MetaValue>);

    /// Whether the key is set on this node rather than inherited
    fn is_overridden(&self, key: &str) -> bool;

    /// Effective key/value view of the whole chain, nearest value winning
    fn flatten(&self) -> BTreeMap<String, MetaValue>;
}

impl<N: MetadataNode + ?Sized> MetadataLookup for N {
    fn walk_chain(&self) -> Vec<Arc<dyn MetadataNode>> {
        let mut chain = Vec::new();
        let mut cursor = self.parent_node();
        while let Some(node) = cursor {
            cursor = node.parent_node();
            chain.push(node);
        }
        chain
    }

    fn lookup(&self, key: &str) -> Option<MetaValue> {
        if let Some(value) = self.metadata().get_local(key) {
            return Some(value);
        }
        let mut cursor = self.parent_node();
        while let Some(node) = cursor {
            if let Some(value) = node.metadata().get_local(key) {
                return Some(value);
            }
            cursor = node.parent_node();
        }
        None
    }

    fn set(&self, key: &str, value: impl Into<MetaValue>) {
        self.metadata().set(key, value);
    }

    fn is_overridden(&self, key: &str) -> bool {
        self.metadata().contains(key)
    }

    fn flatten(&self) -> BTreeMap<String, MetaValue> {
        let mut merged = BTreeMap::new();
        for node in self.walk_chain().iter().rev() {
            merged.extend(node.metadata().snapshot());
        }
        merged.extend(self.metadata().snapshot());
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node {
        metadata: Metadata,
        parent: Option<Arc<Node>>,
    }

    impl MetadataNode for Node {
        fn metadata(&self) -> &Metadata {
            &self.metadata
        }

        fn parent_node(&self) -> Option<Arc<dyn MetadataNode>> {
            self.parent
                .clone()
                .map(|parent| parent as Arc<dyn MetadataNode>)
        }
    }

    fn chain() -> (Arc<Node>, Arc<Node>, Arc<Node>) {
        let project = Arc::new(Node {
            metadata: Metadata::new(),
            parent: None,
        });
        let task = Arc::new(Node {
            metadata: Metadata::new(),
            parent: Some(project.clone()),
        });
        let version = Arc::new(Node {
            metadata: Metadata::new(),
            parent: Some(task.clone()),
        });
        (project, task, version)
    }

    #[test]
    fn test_inherits_nearest_ancestor() {
        let (project, task, version) = chain();
        project.set("fps", 25);
        task.set("fps", 24);
        assert_eq!(version.lookup("fps"), Some(MetaValue::Int(24)));
    }

    #[test]
    fn test_local_value_wins() {
        let (_, task, version) = chain();
        task.set("fps", 24);
        version.set("fps", 30);
        assert_eq!(version.lookup("fps"), Some(MetaValue::Int(30)));
        assert!(version.is_overridden("fps"));
    }

    #[test]
    fn test_default_when_missing() {
        let (_, _, version) = chain();
        assert_eq!(
            version.get("resolution", Some(vec![1920i64, 1080].into())),
            Some(MetaValue::List(vec![MetaValue::Int(1920), MetaValue::Int(1080)]))
        );
        assert_eq!(version.get("resolution", None), None);
    }

    #[test]
    fn test_set_never_touches_ancestors() {
        let (project, task, version) = chain();
        version.set("fps", 30);
        assert!(task.metadata().is_empty());
        assert!(project.metadata().is_empty());
    }

    #[test]
    fn test_lists_are_not_merged() {
        let (project, _, version) = chain();
        project.set("range", vec![1001i64, 1100]);
        version.set("range", vec![1i64]);
        assert_eq!(version.lookup("range"), Some(vec![1i64].into()));
    }

    #[test]
    fn test_walk_chain_and_flatten() {
        let (project, task, version) = chain();
        project.set("fps", 25);
        project.set("colorspace", "ACEScg");
        task.set("fps", 24);
        assert_eq!(version.walk_chain().len(), 2);

        let flat = version.flatten();
        assert_eq!(flat.get("fps"), Some(&MetaValue::Int(24)));
        assert_eq!(flat.get("colorspace"), Some(&MetaValue::Text("ACEScg".into())));
    }

    #[test]
    fn test_serialization_is_plain_map() {
        let metadata = Metadata::new();
        metadata.set("fps", 24);
        metadata.set("mode", "asset");
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"fps":24,"mode":"asset"}"#);
        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metadata);
    }
}
