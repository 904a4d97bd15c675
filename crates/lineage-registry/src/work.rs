//! Works: lineages of one authored scene file

use crate::category::Category;
use crate::config::Session;
use crate::error::Result;
use crate::layout::{PUBLISH_DIR, join_relative};
use crate::publish::Publish;
use lineage::{
    FrameRange, LedgerKind, Metadata, MetadataNode, NamingConvention, PathResolver,
    VersionLedger, VersionSelector, WorkVersion,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

/// What a host application reports when it saves a scene
#[derive(Debug, Clone)]
pub struct NewVersion {
    /// Where the scene was written, absolute or project-relative
    pub path: PathBuf,
    pub session: Session,
    pub note: String,
    pub thumbnail: Option<PathBuf>,
    pub preview: Option<PathBuf>,
    pub ranges: Option<FrameRange>,
}

impl NewVersion {
    pub fn new(path: impl Into<PathBuf>, session: Session) -> Self {
        Self {
            path: path.into(),
            session,
            note: String::new(),
            thumbnail: None,
            preview: None,
            ranges: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_thumbnail(mut self, path: impl Into<PathBuf>) -> Self {
        self.thumbnail = Some(path.into());
        self
    }

    pub fn with_preview(mut self, path: impl Into<PathBuf>) -> Self {
        self.preview = Some(path.into());
        self
    }

    pub fn with_ranges(mut self, start: i64, end: i64) -> Self {
        self.ranges = Some(FrameRange::new(start, end));
        self
    }
}

/// Lifecycle of a work as pickers see it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkState {
    #[default]
    Active,
    /// Hidden from pickers; versions and publishes stay on disk
    Omitted,
    /// Active with at least one publish version on disk
    Published,
}

/// Stored state of a work
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRecord {
    #[serde(default)]
    pub state: WorkState,
}

/// One authored scene file and its saved versions
pub struct Work {
    name: String,
    path: String,
    naming: NamingConvention,
    parent: Weak<Category>,
    ledger: VersionLedger<WorkVersion>,
    publish: RwLock<Option<Arc<Publish>>>,
    omitted: RwLock<bool>,
    metadata: Metadata,
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Work")
            .field("path", &self.path)
            .field("state", &self.state())
            .field("ledger", &self.ledger)
            .finish()
    }
}

impl Work {
    pub(crate) fn new(
        parent: Weak<Category>,
        category_path: &str,
        name: &str,
        naming: NamingConvention,
    ) -> Self {
        let path = join_relative(category_path, name);
        Self {
            name: name.to_string(),
            ledger: VersionLedger::new(LedgerKind::Work, format!("work {path}")),
            path,
            naming,
            parent,
            publish: RwLock::new(None),
            omitted: RwLock::new(false),
            metadata: Metadata::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory of the work relative to the project root
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn naming(&self) -> NamingConvention {
        self.naming
    }

    pub fn category(&self) -> Option<Arc<Category>> {
        self.parent.upgrade()
    }

    pub fn ledger(&self) -> &VersionLedger<WorkVersion> {
        &self.ledger
    }

    /// Versions present on disk, ascending
    pub fn versions(&self) -> Vec<Arc<WorkVersion>> {
        self.ledger.versions()
    }

    pub fn get_version(&self, selector: impl Into<VersionSelector>) -> Result<Arc<WorkVersion>> {
        Ok(self.ledger.get(selector)?)
    }

    pub fn publish(&self) -> Option<Arc<Publish>> {
        self.publish.read().clone()
    }

    pub fn state(&self) -> WorkState {
        if *self.omitted.read() {
            return WorkState::Omitted;
        }
        let published = self
            .publish()
            .is_some_and(|publish| !publish.versions().is_empty());
        if published {
            WorkState::Published
        } else {
            WorkState::Active
        }
    }

    pub fn is_omitted(&self) -> bool {
        *self.omitted.read()
    }

    pub fn omit(&self) {
        *self.omitted.write() = true;
    }

    /// Back to active, or published when publish versions exist
    pub fn revive(&self) {
        *self.omitted.write() = false;
    }

    pub fn to_record(&self) -> WorkRecord {
        WorkRecord {
            state: self.state(),
        }
    }

    pub(crate) fn apply_record(&self, record: &WorkRecord) {
        *self.omitted.write() = record.state == WorkState::Omitted;
    }

    /// The work's publish, created on first use
    pub fn ensure_publish(self: &Arc<Self>) -> Arc<Publish> {
        let mut publish = self.publish.write();
        publish
            .get_or_insert_with(|| {
                Arc::new(Publish::new(
                    Arc::downgrade(self),
                    &join_relative(&self.path, PUBLISH_DIR),
                    &self.name,
                    self.naming,
                ))
            })
            .clone()
    }

    /// Project-relative path of a version's scene file
    pub fn version_file_path(&self, number: u64, extension: Option<&str>) -> String {
        join_relative(
            &self.path,
            &self.naming.version_file(&self.name, number, extension),
        )
    }

    /// Absolute path the next saved version should be written to
    pub fn next_version_path(&self, resolver: &PathResolver, extension: Option<&str>) -> PathBuf {
        resolver.to_absolute_lossy(&self.version_file_path(self.ledger.next_number(), extension))
    }

    /// Register a saved scene as the next version.
    ///
    /// A file named after the convention keeps the number in its name and
    /// must extend the ledger; any other file name gets the next number.
    pub fn save_version(
        &self,
        resolver: &PathResolver,
        request: NewVersion,
    ) -> Result<Arc<WorkVersion>> {
        let relative_path = resolver.to_relative(&request.path);
        let embedded = Path::new(&relative_path)
            .file_name()
            .and_then(|name| self.naming.parse_file(&self.name, &name.to_string_lossy()))
            .filter(|parsed| parsed.element.is_none())
            .map(|parsed| parsed.number);

        let NewVersion {
            session,
            note,
            thumbnail,
            preview,
            ranges,
            ..
        } = request;
        let build = |number: u64| {
            let mut version = WorkVersion::new(number, relative_path);
            version.user = session.user;
            version.workstation = session.workstation;
            version.note = note;
            version.thumbnail = thumbnail.map(|path| resolver.to_relative(path));
            version.preview = preview.map(|path| resolver.to_relative(path));
            version.ranges = ranges;
            version
        };

        let version = match embedded {
            Some(number) => self.ledger.append(build(number))?,
            None => self.ledger.append_with(build)?,
        };
        Ok(version)
    }

    /// Mark an unsaved edit as the in-progress version
    pub fn begin_edit(&self, session: &Session, extension: Option<&str>) -> Arc<WorkVersion> {
        self.ledger.set_in_progress(|number| {
            let mut version = WorkVersion::new(number, self.version_file_path(number, extension));
            version.user = session.user.clone();
            version.workstation = session.workstation.clone();
            version
        })
    }

    /// Fill in a thumbnail or preview generated after the save
    pub fn backfill_media(
        &self,
        number: u64,
        thumbnail: Option<String>,
        preview: Option<String>,
    ) -> Result<Arc<WorkVersion>> {
        Ok(self.ledger.backfill(number, |version| {
            if thumbnail.is_some() {
                version.thumbnail = thumbnail;
            }
            if preview.is_some() {
                version.preview = preview;
            }
        })?)
    }

    /// Metadata view of one version, inheriting from this work
    pub fn version_scope(
        self: &Arc<Self>,
        selector: impl Into<VersionSelector>,
    ) -> Result<VersionScope> {
        Ok(VersionScope {
            version: self.ledger.get(selector)?,
            work: self.clone(),
        })
    }
}

impl MetadataNode for Work {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn parent_node(&self) -> Option<Arc<dyn MetadataNode>> {
        self.parent
            .upgrade()
            .map(|parent| parent as Arc<dyn MetadataNode>)
    }
}

/// A work version placed at the bottom of the metadata chain
#[derive(Debug, Clone)]
pub struct VersionScope {
    pub work: Arc<Work>,
    pub version: Arc<WorkVersion>,
}

impl MetadataNode for VersionScope {
    fn metadata(&self) -> &Metadata {
        &self.version.metadata
    }

    fn parent_node(&self) -> Option<Arc<dyn MetadataNode>> {
        Some(self.work.clone() as Arc<dyn MetadataNode>)
    }
}
