//! Categories of a task and the behaviors declared for them

use crate::error::{RegistryError, Result};
use crate::layout::join_relative;
use crate::task::Task;
use crate::work::Work;
use lineage::{Metadata, MetadataNode, NamingConvention};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Extraction and validation steps that apply to a category's works
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    #[serde(default)]
    pub extracts: Vec<String>,
    #[serde(default)]
    pub validations: Vec<String>,
}

impl CategoryDefinition {
    pub fn new<E, V>(extracts: E, validations: V) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self {
            extracts: extracts.into_iter().map(Into::into).collect(),
            validations: validations.into_iter().map(Into::into).collect(),
        }
    }
}

/// Category name to definition, with a fallback for unknown names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinitions {
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryDefinition>,
    #[serde(default)]
    pub fallback: CategoryDefinition,
}

impl Default for CategoryDefinitions {
    fn default() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(
            "Model".to_string(),
            CategoryDefinition::new(["source", "alembic", "usd"], ["unique_names", "frozen_transforms"]),
        );
        categories.insert(
            "Rig".to_string(),
            CategoryDefinition::new(["source"], ["unique_names"]),
        );
        categories.insert(
            "LookDev".to_string(),
            CategoryDefinition::new(["source", "usd"], ["texture_paths"]),
        );
        categories.insert(
            "Layout".to_string(),
            CategoryDefinition::new(["source", "usd"], Vec::<String>::new()),
        );
        categories.insert(
            "Animation".to_string(),
            CategoryDefinition::new(["source", "alembic"], ["frame_range"]),
        );
        categories.insert(
            "Lighting".to_string(),
            CategoryDefinition::new(["source"], ["frame_range"]),
        );
        categories.insert(
            "Fx".to_string(),
            CategoryDefinition::new(["source", "alembic", "vdb"], ["frame_range"]),
        );
        Self {
            categories,
            fallback: CategoryDefinition::new(["source"], Vec::<String>::new()),
        }
    }
}

impl CategoryDefinitions {
    /// Definition for `name`, or the fallback
    pub fn resolve(&self, name: &str) -> CategoryDefinition {
        self.categories
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// A named subdivision of a task holding works
pub struct Category {
    name: String,
    path: String,
    definition: CategoryDefinition,
    naming: NamingConvention,
    parent: Weak<Task>,
    works: RwLock<BTreeMap<String, Arc<Work>>>,
    metadata: Metadata,
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Category")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

impl Category {
    pub(crate) fn new(
        parent: Weak<Task>,
        task_path: &str,
        name: &str,
        definition: CategoryDefinition,
        naming: NamingConvention,
    ) -> Self {
        Self {
            name: name.to_string(),
            path: join_relative(task_path, name),
            definition,
            naming,
            parent,
            works: RwLock::new(BTreeMap::new()),
            metadata: Metadata::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory of the category relative to the project root
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn definition(&self) -> &CategoryDefinition {
        &self.definition
    }

    pub fn task(&self) -> Option<Arc<Task>> {
        self.parent.upgrade()
    }

    pub fn work(&self, name: &str) -> Option<Arc<Work>> {
        self.works.read().get(name).cloned()
    }

    pub fn works(&self) -> Vec<Arc<Work>> {
        self.works.read().values().cloned().collect()
    }

    pub fn work_names(&self) -> Vec<String> {
        self.works.read().keys().cloned().collect()
    }

    /// Create a new, empty work
    pub fn add_work(self: &Arc<Self>, name: &str) -> Result<Arc<Work>> {
        let mut works = self.works.write();
        if works.contains_key(name) {
            return Err(RegistryError::DuplicateName {
                parent: format!("category {}", self.path),
                name: name.to_string(),
            });
        }
        let work = Arc::new(Work::new(Arc::downgrade(self), &self.path, name, self.naming));
        works.insert(name.to_string(), work.clone());
        Ok(work)
    }

    /// The named work, created when unknown
    pub(crate) fn ensure_work(self: &Arc<Self>, name: &str) -> (Arc<Work>, bool) {
        let mut works = self.works.write();
        if let Some(work) = works.get(name) {
            return (work.clone(), false);
        }
        let work = Arc::new(Work::new(Arc::downgrade(self), &self.path, name, self.naming));
        works.insert(name.to_string(), work.clone());
        (work, true)
    }
}

impl MetadataNode for Category {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn parent_node(&self) -> Option<Arc<dyn MetadataNode>> {
        self.parent
            .upgrade()
            .map(|parent| parent as Arc<dyn MetadataNode>)
    }
}
