//! # Lineage Registry
//!
//! The project hierarchy on top of the `lineage` core:
//! - Subprojects, tasks, categories and works with layered metadata
//! - Work versions and publishes discovered from the project tree
//! - JSON records of the structure, tasks and versions in a database directory
//! - Lookups from a scene file on disk back to its work and version
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use lineage_registry::*;
//! use lineage_registry::storage::LocalFileSystem;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<()> {
//! let registry = Registry::open(LocalFileSystem::new(), RegistryConfig::from_env()?).await?;
//! let report = registry.scan_tree(&CancellationToken::new()).await?;
//! println!("{} work versions", report.versions);
//!
//! let scene = "/projects/show/Char/Hero/Model/hero_model/hero_model_v002.ma";
//! if let Some((work, version)) = registry.find_work_by_absolute_path(scene) {
//!     println!("{} v{}", work.name(), version.number);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cascade;
pub mod category;
pub mod config;
pub mod error;
pub mod layout;
pub mod publish;
pub mod registry;
pub mod scanner;
pub mod storage;
pub mod subproject;
pub mod task;
pub mod work;

pub use cascade::{CascadeQuery, CascadeResult};
pub use category::{Category, CategoryDefinition, CategoryDefinitions};
pub use config::{RegistryConfig, Session};
pub use error::{RegistryError, Result};
pub use layout::ProjectLayout;
pub use publish::{ElementOutput, Publish, PublishRecord, PublishRequest, PublishScope};
pub use registry::{MODE_KEY, Registry};
pub use scanner::{ScanOutcome, Scanner, TreeScanReport};
pub use storage::{DirEntry, EntryKind, LocalFileSystem, MemoryFileSystem, ProjectFileSystem, StorageError};
pub use subproject::{Subproject, SubprojectId, SubprojectRecord};
pub use task::{Task, TaskId, TaskRecord};
pub use work::{NewVersion, VersionScope, Work, WorkRecord, WorkState};
