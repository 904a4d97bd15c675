//! Work and publish version records

use crate::element::ElementIndex;
use crate::error::{LineageError, Result};
use crate::ledger::VersionRecord;
use crate::metadata::Metadata;
use crate::path::PathResolver;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::OffsetDateTime;

/// Inclusive frame range of a saved scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: i64,
    pub end: i64,
}

impl FrameRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn frame_count(&self) -> u64 {
        self.end.abs_diff(self.start).saturating_add(1)
    }
}

/// One saved iteration of a work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkVersion {
    /// 1-based, strictly increasing within the work
    pub number: u64,

    /// Scene file path relative to the project root
    pub relative_path: String,

    pub user: String,
    pub workstation: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub ranges: Option<FrameRange>,
    #[serde(default)]
    pub file_format: Option<String>,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Version-level metadata overrides
    #[serde(default)]
    pub metadata: Metadata,
}

impl WorkVersion {
    pub fn new(number: u64, relative_path: impl Into<String>) -> Self {
        let relative_path = relative_path.into();
        let file_format = PathBuf::from(&relative_path)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()));
        Self {
            number,
            relative_path,
            user: String::new(),
            workstation: String::new(),
            note: String::new(),
            thumbnail: None,
            preview: None,
            ranges: None,
            file_format,
            created_at: OffsetDateTime::now_utc(),
            metadata: Metadata::new(),
        }
    }

    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    /// Absolute path of the scene file
    pub fn get_resolved_path(&self, resolver: &PathResolver) -> Result<PathBuf> {
        resolver.to_absolute(&self.relative_path)
    }
}

impl VersionRecord for WorkVersion {
    fn number(&self) -> u64 {
        self.number
    }

    fn relative_path(&self) -> &str {
        &self.relative_path
    }
}

/// One published iteration of a work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishVersion {
    pub number: u64,

    /// Directory holding this version's element files, relative to the project root
    pub relative_path: String,

    /// Work version the publish was made from, when known
    #[serde(default)]
    pub work_version: Option<u64>,

    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub note: String,

    #[serde(default)]
    pub elements: ElementIndex,

    /// Effective metadata at publish time
    #[serde(default)]
    pub metadata: Metadata,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PublishVersion {
    pub fn new(number: u64, relative_path: impl Into<String>) -> Self {
        Self {
            number,
            relative_path: relative_path.into(),
            work_version: None,
            user: String::new(),
            note: String::new(),
            elements: ElementIndex::new(),
            metadata: Metadata::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn element_types(&self) -> Vec<String> {
        self.elements.element_types().into_iter().collect()
    }

    /// Path of one element, project-relative or absolute
    pub fn get_element_path(
        &self,
        element_type: &str,
        relative: bool,
        resolver: &PathResolver,
    ) -> Result<PathBuf> {
        self.elements
            .resolve_path(element_type, relative, resolver)
            .map_err(|err| match err {
                LineageError::ElementNotFound { element, .. } => LineageError::ElementNotFound {
                    owner: format!("publish version {}", self.number),
                    element,
                },
                other => other,
            })
    }
}

impl VersionRecord for PublishVersion {
    fn number(&self) -> u64 {
        self.number
    }

    fn relative_path(&self) -> &str {
        &self.relative_path
    }
}
