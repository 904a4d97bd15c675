//! Level-by-level selection of a published element
//!
//! Host integrations offer one dropdown per level: task, category, work,
//! publish version and element. Each level lists the options under the
//! level selected above it. A level that is unset or unresolved yields an
//! empty list and leaves every level below it empty.

use crate::subproject::Subproject;
use crate::work::WorkState;
use lineage::{PathResolver, VersionSelector};
use std::path::PathBuf;
use std::sync::Arc;

/// Selections made so far, top down
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeQuery {
    /// Subproject path; `""` is the project root
    pub subproject: String,
    pub task: Option<String>,
    pub category: Option<String>,
    pub work: Option<String>,
    pub version: Option<VersionSelector>,
    pub element: Option<String>,
}

impl CascadeQuery {
    pub fn new(subproject: impl Into<String>) -> Self {
        Self {
            subproject: subproject.into(),
            ..Self::default()
        }
    }

    pub fn task(mut self, name: impl Into<String>) -> Self {
        self.task = Some(name.into());
        self
    }

    pub fn category(mut self, name: impl Into<String>) -> Self {
        self.category = Some(name.into());
        self
    }

    pub fn work(mut self, name: impl Into<String>) -> Self {
        self.work = Some(name.into());
        self
    }

    pub fn version(mut self, selector: impl Into<VersionSelector>) -> Self {
        self.version = Some(selector.into());
        self
    }

    pub fn element(mut self, element_type: impl Into<String>) -> Self {
        self.element = Some(element_type.into());
        self
    }
}

/// Options at every level of a [`CascadeQuery`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeResult {
    pub tasks: Vec<String>,
    pub categories: Vec<String>,
    /// Works with at least one publish version that are not omitted
    pub works: Vec<String>,
    pub versions: Vec<u64>,
    pub elements: Vec<String>,
    /// Absolute path of the selected element
    pub element_path: Option<PathBuf>,
}

pub(crate) fn resolve(
    root: &Arc<Subproject>,
    resolver: &PathResolver,
    query: &CascadeQuery,
) -> CascadeResult {
    let mut result = CascadeResult::default();
    let Some(subproject) = root.find_by_path(&query.subproject) else {
        return result;
    };
    result.tasks = subproject.task_names();

    let Some(task) = query.task.as_deref().and_then(|name| subproject.task(name)) else {
        return result;
    };
    result.categories = task.category_names();

    let Some(category) = query.category.as_deref().and_then(|name| task.category(name)) else {
        return result;
    };
    result.works = category
        .works()
        .iter()
        .filter(|work| work.state() == WorkState::Published)
        .map(|work| work.name().to_string())
        .collect();

    let publish = query
        .work
        .as_deref()
        .filter(|name| result.works.iter().any(|work| work == name))
        .and_then(|name| category.work(name))
        .and_then(|work| work.publish());
    let Some(publish) = publish else {
        return result;
    };
    result.versions = publish
        .versions()
        .iter()
        .map(|version| version.number)
        .collect();

    let Some(version) = query
        .version
        .and_then(|selector| publish.get_version(selector).ok())
    else {
        return result;
    };
    result.elements = version.element_types();

    result.element_path = query
        .element
        .as_deref()
        .and_then(|element| version.get_element_path(element, false, resolver).ok());
    result
}
