//! Where things live on disk
//!
//! ```text
//! <root>/
//! ├── Char/Hero/Model/hero_model/
//! │   ├── hero_model_v001.ma
//! │   ├── hero_model_v002.ma
//! │   └── publish/
//! │       └── v001/
//! │           ├── hero_model_v001_alembic.abc
//! │           └── hero_model_v001_usd.usda
//! └── .lineage/
//!     ├── project.json
//!     ├── category_definitions.json
//!     └── Char/
//!         ├── Hero.task.json
//!         └── Hero/Model/hero_model/
//!             ├── work.json
//!             ├── hero_model_v001.json
//!             └── publish/
//!                 ├── publish.json
//!                 └── hero_model_v001.json
//! ```
//!
//! Scenes and publishes sit in the project tree; the database directory
//! mirrors it with JSON records. Removed records are moved under
//! `<root>/.purgatory/<database dir>/` with the same relative layout.

use crate::config::RegistryConfig;
use lineage::{NamingConvention, PathResolver};
use std::path::PathBuf;

pub const STRUCTURE_FILE: &str = "project.json";
pub const CATEGORY_DEFINITIONS_FILE: &str = "category_definitions.json";
pub const TASK_RECORD_SUFFIX: &str = ".task.json";
pub const PUBLISH_DIR: &str = "publish";
pub const PURGATORY_DIR: &str = ".purgatory";
pub const WORK_STATE_FILE: &str = "work.json";
pub const PUBLISH_STATE_FILE: &str = "publish.json";

/// Join two project-relative posix paths, either of which may be empty
pub fn join_relative(base: &str, name: &str) -> String {
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}/{name}"),
    }
}

/// Path conventions of one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    resolver: PathResolver,
    naming: NamingConvention,
    database_dir: String,
}

impl ProjectLayout {
    pub fn new(resolver: PathResolver, naming: NamingConvention, database_dir: impl Into<String>) -> Self {
        Self {
            resolver,
            naming,
            database_dir: database_dir.into(),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(
            PathResolver::with_root_token(&config.project_root, config.root_token.clone()),
            NamingConvention::new(config.version_padding),
            config.database_dir.clone(),
        )
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn naming(&self) -> NamingConvention {
        self.naming
    }

    /// Absolute path of a project-relative path
    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.resolver.to_absolute_lossy(relative)
    }

    pub fn database_root(&self) -> PathBuf {
        self.absolute(&self.database_dir)
    }

    /// Absolute path of a record mirroring a project-relative location
    pub fn database_path(&self, relative: &str) -> PathBuf {
        self.absolute(&join_relative(&self.database_dir, relative))
    }

    pub fn structure_file(&self) -> PathBuf {
        self.database_path(STRUCTURE_FILE)
    }

    pub fn category_definitions_file(&self) -> PathBuf {
        self.database_path(CATEGORY_DEFINITIONS_FILE)
    }

    /// Directory holding the task records of a subproject
    pub fn task_record_dir(&self, subproject_path: &str) -> PathBuf {
        self.database_path(subproject_path)
    }

    pub fn task_record_file(&self, subproject_path: &str, task_name: &str) -> PathBuf {
        self.task_record_dir(subproject_path)
            .join(format!("{task_name}{TASK_RECORD_SUFFIX}"))
    }

    /// Where a removed record mirroring `relative` is kept
    pub fn purgatory_path(&self, relative: &str) -> PathBuf {
        self.absolute(&join_relative(
            &join_relative(PURGATORY_DIR, &self.database_dir),
            relative,
        ))
    }

    pub fn purgatory_task_record_file(&self, subproject_path: &str, task_name: &str) -> PathBuf {
        self.purgatory_path(subproject_path)
            .join(format!("{task_name}{TASK_RECORD_SUFFIX}"))
    }

    /// Directory holding the version records of a work
    pub fn version_record_dir(&self, work_path: &str) -> PathBuf {
        self.database_path(work_path)
    }

    pub fn version_record_file(&self, work_path: &str, work_name: &str, number: u64) -> PathBuf {
        self.version_record_dir(work_path)
            .join(self.naming.record_file(work_name, number))
    }

    /// Omitted or active state of a work
    pub fn work_state_file(&self, work_path: &str) -> PathBuf {
        self.version_record_dir(work_path).join(WORK_STATE_FILE)
    }

    /// Directory holding the version records of a publish
    pub fn publish_record_dir(&self, publish_path: &str) -> PathBuf {
        self.database_path(publish_path)
    }

    pub fn publish_record_file(&self, publish_path: &str, work_name: &str, number: u64) -> PathBuf {
        self.publish_record_dir(publish_path)
            .join(self.naming.record_file(work_name, number))
    }

    /// Live and promoted pointers of a publish
    pub fn publish_state_file(&self, publish_path: &str) -> PathBuf {
        self.publish_record_dir(publish_path).join(PUBLISH_STATE_FILE)
    }

    /// Project-relative directory of a work's publishes
    pub fn publish_path(&self, work_path: &str) -> String {
        join_relative(work_path, PUBLISH_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ProjectLayout {
        ProjectLayout::from_config(&RegistryConfig::new("/projects/show"))
    }

    #[test]
    fn test_join_relative() {
        assert_eq!(join_relative("", "Char"), "Char");
        assert_eq!(join_relative("Char", ""), "Char");
        assert_eq!(join_relative("Char", "Hero"), "Char/Hero");
    }

    #[test]
    fn test_record_locations() {
        let layout = layout();
        assert_eq!(
            layout.structure_file(),
            PathBuf::from("/projects/show/.lineage/project.json")
        );
        assert_eq!(
            layout.task_record_file("Char", "Hero"),
            PathBuf::from("/projects/show/.lineage/Char/Hero.task.json")
        );
        assert_eq!(
            layout.task_record_file("", "Edit"),
            PathBuf::from("/projects/show/.lineage/Edit.task.json")
        );
        assert_eq!(
            layout.version_record_file("Char/Hero/Model/hero_model", "hero_model", 2),
            PathBuf::from("/projects/show/.lineage/Char/Hero/Model/hero_model/hero_model_v002.json")
        );
        assert_eq!(
            layout.publish_record_file("Char/Hero/Model/hero_model/publish", "hero_model", 1),
            PathBuf::from(
                "/projects/show/.lineage/Char/Hero/Model/hero_model/publish/hero_model_v001.json"
            )
        );
        assert_eq!(
            layout.publish_state_file("Char/Hero/Model/hero_model/publish"),
            PathBuf::from("/projects/show/.lineage/Char/Hero/Model/hero_model/publish/publish.json")
        );
        assert_eq!(
            layout.purgatory_task_record_file("Char", "Hero"),
            PathBuf::from("/projects/show/.purgatory/.lineage/Char/Hero.task.json")
        );
    }

    #[test]
    fn test_publish_paths() {
        let layout = layout();
        assert_eq!(
            layout.publish_path("Char/Hero/Model/hero_model"),
            "Char/Hero/Model/hero_model/publish"
        );
        assert_eq!(
            layout.database_root(),
            PathBuf::from("/projects/show/.lineage")
        );
    }
}
