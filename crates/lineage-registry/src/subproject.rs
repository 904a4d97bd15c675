//! Subprojects: the tree the project is organized in

use crate::error::{RegistryError, Result};
use crate::layout::join_relative;
use crate::task::Task;
use lineage::{Metadata, MetadataNode};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Unique identifier for a subproject
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubprojectId(pub String);

impl SubprojectId {
    pub fn generate() -> Self {
        SubprojectId(Uuid::new_v4().to_string())
    }
}

impl From<String> for SubprojectId {
    fn from(s: String) -> Self {
        SubprojectId(s)
    }
}

impl From<&str> for SubprojectId {
    fn from(s: &str) -> Self {
        SubprojectId(s.to_string())
    }
}

impl AsRef<str> for SubprojectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubprojectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A node of the project tree; the root node is the project itself
pub struct Subproject {
    id: SubprojectId,
    name: String,
    path: String,
    parent: Weak<Subproject>,
    children: RwLock<BTreeMap<String, Arc<Subproject>>>,
    tasks: RwLock<BTreeMap<String, Arc<Task>>>,
    metadata: Metadata,
}

impl fmt::Debug for Subproject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subproject")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish()
    }
}

impl Subproject {
    /// The project root
    pub fn root(id: SubprojectId, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id,
            name: name.into(),
            path: String::new(),
            parent: Weak::new(),
            children: RwLock::new(BTreeMap::new()),
            tasks: RwLock::new(BTreeMap::new()),
            metadata: Metadata::new(),
        })
    }

    /// Build a child without attaching it
    pub(crate) fn new_child(
        parent: &Arc<Subproject>,
        id: SubprojectId,
        name: &str,
        metadata: Metadata,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            name: name.to_string(),
            path: join_relative(&parent.path, name),
            parent: Arc::downgrade(parent),
            children: RwLock::new(BTreeMap::new()),
            tasks: RwLock::new(BTreeMap::new()),
            metadata,
        })
    }

    /// Attach a fully built child; fails when the name is taken
    pub(crate) fn attach_child(&self, child: Arc<Subproject>) -> Result<Arc<Subproject>> {
        let mut children = self.children.write();
        if children.contains_key(&child.name) {
            return Err(RegistryError::DuplicateName {
                parent: self.display_path(),
                name: child.name.clone(),
            });
        }
        children.insert(child.name.clone(), child.clone());
        Ok(child)
    }

    pub(crate) fn attach_task(&self, task: Arc<Task>) -> Result<Arc<Task>> {
        let mut tasks = self.tasks.write();
        if tasks.contains_key(task.name()) {
            return Err(RegistryError::DuplicateName {
                parent: self.display_path(),
                name: task.name().to_string(),
            });
        }
        tasks.insert(task.name().to_string(), task.clone());
        Ok(task)
    }

    pub(crate) fn detach_task(&self, name: &str) -> Option<Arc<Task>> {
        self.tasks.write().remove(name)
    }

    pub fn id(&self) -> &SubprojectId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path relative to the project root, empty for the root
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.parent.upgrade().is_none()
    }

    fn display_path(&self) -> String {
        if self.path.is_empty() {
            "project root".to_string()
        } else {
            format!("subproject {}", self.path)
        }
    }

    pub fn parent(&self) -> Option<Arc<Subproject>> {
        self.parent.upgrade()
    }

    pub fn child(&self, name: &str) -> Option<Arc<Subproject>> {
        self.children.read().get(name).cloned()
    }

    pub fn children(&self) -> Vec<Arc<Subproject>> {
        self.children.read().values().cloned().collect()
    }

    pub fn task(&self, name: &str) -> Option<Arc<Task>> {
        self.tasks.read().get(name).cloned()
    }

    pub fn tasks(&self) -> Vec<Arc<Task>> {
        self.tasks.read().values().cloned().collect()
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks.read().keys().cloned().collect()
    }

    /// This node and all descendants, breadth first
    pub fn descendants(self: &Arc<Self>) -> Vec<Arc<Subproject>> {
        let mut out = vec![self.clone()];
        let mut cursor = 0;
        while cursor < out.len() {
            let children = out[cursor].children();
            out.extend(children);
            cursor += 1;
        }
        out
    }

    /// Descendant at a relative path; `""` is this node
    pub fn find_by_path(self: &Arc<Self>, path: &str) -> Option<Arc<Subproject>> {
        let mut current = self.clone();
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            current = current.child(segment)?;
        }
        Some(current)
    }

    pub fn to_record(&self) -> SubprojectRecord {
        SubprojectRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            metadata: self.metadata.clone(),
            children: self.children().iter().map(|child| child.to_record()).collect(),
        }
    }
}

impl MetadataNode for Subproject {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn parent_node(&self) -> Option<Arc<dyn MetadataNode>> {
        self.parent
            .upgrade()
            .map(|parent| parent as Arc<dyn MetadataNode>)
    }
}

/// Persisted form of a subproject and its descendants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubprojectRecord {
    pub id: SubprojectId,
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub children: Vec<SubprojectRecord>,
}

impl SubprojectRecord {
    /// Rebuild the subtree below `parent`
    pub(crate) fn attach_children(&self, parent: &Arc<Subproject>) -> Result<()> {
        for record in &self.children {
            let child = Subproject::new_child(
                parent,
                record.id.clone(),
                &record.name,
                record.metadata.clone(),
            );
            let child = parent.attach_child(child)?;
            record.attach_children(&child)?;
        }
        Ok(())
    }

    pub(crate) fn into_root(self) -> Result<Arc<Subproject>> {
        let root = Subproject::root(self.id.clone(), self.name.clone());
        for (key, value) in self.metadata.snapshot() {
            root.metadata.set(key, value);
        }
        self.attach_children(&root)?;
        Ok(root)
    }
}

/// Shell-style match of `*` and `?` against a whole name
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some(&c) if c == '?' || c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    n = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage::{MetaValue, MetadataLookup};

    fn tree() -> Arc<Subproject> {
        let root = Subproject::root(SubprojectId::from("root"), "show");
        let assets = root
            .attach_child(Subproject::new_child(&root, "a".into(), "Assets", Metadata::new()))
            .unwrap();
        assets
            .attach_child(Subproject::new_child(&assets, "c".into(), "Char", Metadata::new()))
            .unwrap();
        root
    }

    #[test]
    fn test_find_by_path() {
        let root = tree();
        assert_eq!(root.find_by_path("").unwrap().id().as_ref(), "root");
        let character = root.find_by_path("Assets/Char").unwrap();
        assert_eq!(character.path(), "Assets/Char");
        assert_eq!(character.parent().unwrap().name(), "Assets");
        assert!(root.find_by_path("Assets/Env").is_none());
    }

    #[test]
    fn test_duplicate_sibling_rejected() {
        let root = tree();
        let err = root
            .attach_child(Subproject::new_child(&root, "x".into(), "Assets", Metadata::new()))
            .unwrap_err();
        assert!(err.is_consistency());
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn test_metadata_inherits_through_tree() {
        let root = tree();
        root.set("fps", 25);
        let character = root.find_by_path("Assets/Char").unwrap();
        assert_eq!(character.lookup("fps"), Some(MetaValue::Int(25)));
        assert_eq!(character.walk_chain().len(), 2);
    }

    #[test]
    fn test_record_round_trip() {
        let root = tree();
        root.find_by_path("Assets").unwrap().set("mode", "asset");
        let record = root.to_record();
        let json = serde_json::to_string(&record).unwrap();
        let restored: SubprojectRecord = serde_json::from_str(&json).unwrap();
        let rebuilt = restored.into_root().unwrap();
        let assets = rebuilt.find_by_path("Assets").unwrap();
        assert_eq!(assets.metadata().get_local("mode"), Some("asset".into()));
        assert!(rebuilt.find_by_path("Assets/Char").is_some());
        assert_eq!(rebuilt.descendants().len(), 3);
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("Char*", "Characters"));
        assert!(wildcard_match("*ar", "Char"));
        assert!(wildcard_match("C?ar", "Char"));
        assert!(wildcard_match("*", ""));
        assert!(!wildcard_match("Env*", "Char"));
        assert!(!wildcard_match("C?ar", "Chair"));
        assert!(wildcard_match("*h*r*", "Character"));
    }
}
