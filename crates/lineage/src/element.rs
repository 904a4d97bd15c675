//! Named output elements of a publish version

use crate::error::{LineageError, Result};
use crate::path::PathResolver;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Maps an element type ("alembic", "usd", "textures") to one or more paths.
///
/// Paths are stored the way they were given, normally project-relative.
/// An index without elements is valid: the publish exists but has not
/// produced outputs yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementIndex {
    elements: BTreeMap<String, Vec<String>>,
}

impl ElementIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the single path of an element type, replacing earlier paths
    pub fn set_element(&mut self, element_type: impl Into<String>, path: impl Into<String>) {
        self.elements.insert(element_type.into(), vec![path.into()]);
    }

    /// Append a path to an element type (bundled outputs)
    pub fn add_element_path(&mut self, element_type: impl Into<String>, path: impl Into<String>) {
        let paths = self.elements.entry(element_type.into()).or_default();
        let path = path.into();
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    /// First stored path of the element type
    pub fn get_element(&self, element_type: &str) -> Option<&str> {
        self.elements
            .get(element_type)
            .and_then(|paths| paths.first())
            .map(String::as_str)
    }

    pub fn get_paths(&self, element_type: &str) -> &[String] {
        self.elements
            .get(element_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn element_types(&self) -> BTreeSet<String> {
        self.elements.keys().cloned().collect()
    }

    pub fn contains(&self, element_type: &str) -> bool {
        self.elements.contains_key(element_type)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Resolve an element path, relative for storage or absolute for access.
    ///
    /// A relative request for a path outside the project yields the stored
    /// path; an absolute request for an unresolvable token fails.
    pub fn resolve_path(
        &self,
        element_type: &str,
        relative: bool,
        resolver: &PathResolver,
    ) -> Result<PathBuf> {
        let stored = self
            .get_element(element_type)
            .ok_or_else(|| LineageError::ElementNotFound {
                owner: "element index".to_string(),
                element: element_type.to_string(),
            })?;

        if relative {
            let absolute = resolver.to_absolute_lossy(stored);
            return Ok(PathBuf::from(resolver.to_relative(absolute)));
        }
        resolver.to_absolute(stored)
    }
}
