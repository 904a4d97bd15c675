//! Tasks: units of work under a subproject

use crate::category::{Category, CategoryDefinitions};
use crate::error::{RegistryError, Result};
use crate::layout::join_relative;
use crate::subproject::Subproject;
use lineage::{Metadata, MetadataNode, NamingConvention};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for a task, stable across renames and rescans
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn generate() -> Self {
        TaskId(Uuid::new_v4().to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted form of a task: `<db>/<subproject>/<task>.task.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A task with its categories
pub struct Task {
    id: TaskId,
    name: String,
    path: String,
    task_type: Option<String>,
    creator: String,
    created_at: OffsetDateTime,
    parent: Weak<Subproject>,
    categories: RwLock<Vec<Arc<Category>>>,
    naming: NamingConvention,
    metadata: Metadata,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish()
    }
}

impl Task {
    /// Build a task with its categories; nothing is attached to `parent`
    pub(crate) fn build(
        parent: &Arc<Subproject>,
        record: TaskRecord,
        definitions: &CategoryDefinitions,
        naming: NamingConvention,
    ) -> Arc<Self> {
        let path = join_relative(parent.path(), &record.name);
        Arc::new_cyclic(|this: &Weak<Task>| {
            let mut categories: Vec<Arc<Category>> = Vec::new();
            for name in &record.categories {
                if categories.iter().any(|category| category.name() == name) {
                    continue;
                }
                categories.push(Arc::new(Category::new(
                    this.clone(),
                    &path,
                    name,
                    definitions.resolve(name),
                    naming,
                )));
            }
            Task {
                id: record.id,
                name: record.name,
                path,
                task_type: record.task_type,
                creator: record.creator,
                created_at: record.created_at,
                parent: Arc::downgrade(parent),
                categories: RwLock::new(categories),
                naming,
                metadata: record.metadata,
            }
        })
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory of the task relative to the project root
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn task_type(&self) -> Option<&str> {
        self.task_type.as_deref()
    }

    pub fn creator(&self) -> &str {
        &self.creator
    }

    pub fn subproject(&self) -> Option<Arc<Subproject>> {
        self.parent.upgrade()
    }

    /// Categories in the order they were declared
    pub fn categories(&self) -> Vec<Arc<Category>> {
        self.categories.read().clone()
    }

    pub fn category_names(&self) -> Vec<String> {
        self.categories
            .read()
            .iter()
            .map(|category| category.name().to_string())
            .collect()
    }

    pub fn category(&self, name: &str) -> Option<Arc<Category>> {
        self.categories
            .read()
            .iter()
            .find(|category| category.name() == name)
            .cloned()
    }

    /// Append a new, empty category
    pub fn add_category(
        self: &Arc<Self>,
        name: &str,
        definitions: &CategoryDefinitions,
    ) -> Result<Arc<Category>> {
        let mut categories = self.categories.write();
        if categories.iter().any(|category| category.name() == name) {
            return Err(RegistryError::DuplicateName {
                parent: format!("task {}", self.path),
                name: name.to_string(),
            });
        }
        let category = Arc::new(Category::new(
            Arc::downgrade(self),
            &self.path,
            name,
            definitions.resolve(name),
            self.naming,
        ));
        categories.push(category.clone());
        Ok(category)
    }

    pub fn to_record(&self) -> TaskRecord {
        TaskRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            task_type: self.task_type.clone(),
            creator: self.creator.clone(),
            categories: self.category_names(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
        }
    }
}

impl MetadataNode for Task {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn parent_node(&self) -> Option<Arc<dyn MetadataNode>> {
        self.parent
            .upgrade()
            .map(|parent| parent as Arc<dyn MetadataNode>)
    }
}
