//! On-demand reconciliation of registry state with the project tree
//!
//! Scans never run implicitly. A missing directory is an empty result; an
//! entry that cannot be read is logged, skipped and reported through
//! [`ScanOutcome::partial`]. Every scan checks its cancellation token
//! between entries and applies nothing to a ledger once cancelled.

use crate::category::Category;
use crate::error::{RegistryError, Result};
use crate::layout::{ProjectLayout, TASK_RECORD_SUFFIX, join_relative};
use crate::publish::{Publish, PublishRecord};
use crate::storage::{DirEntry, ProjectFileSystem};
use crate::subproject::Subproject;
use crate::task::TaskRecord;
use crate::work::{Work, WorkRecord};
use lineage::{
    DiskScan, ElementIndex, NamingConvention, PublishVersion, RescanSummary, WorkVersion,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result of a scan that tolerates unreadable entries
#[derive(Debug, Clone)]
pub struct ScanOutcome<T> {
    pub value: T,

    /// Set when at least one entry was skipped
    pub partial: bool,

    /// Entries that could not be read
    pub skipped: Vec<PathBuf>,

    /// Ledger changes, for version scans
    pub summary: RescanSummary,
}

impl<T> ScanOutcome<T> {
    pub fn complete(value: T) -> Self {
        Self {
            value,
            partial: false,
            skipped: Vec::new(),
            summary: RescanSummary::default(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ScanOutcome<U> {
        ScanOutcome {
            value: f(self.value),
            partial: self.partial,
            skipped: self.skipped,
            summary: self.summary,
        }
    }
}

/// Totals of a whole-project scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeScanReport {
    pub subprojects: usize,
    pub tasks: usize,
    pub works: usize,
    pub versions: usize,
    pub publish_versions: usize,
    pub added_versions: usize,
    pub flagged_missing: usize,
    pub partial: bool,
    pub skipped: Vec<PathBuf>,
}

impl TreeScanReport {
    pub(crate) fn absorb<T>(&mut self, outcome: &ScanOutcome<T>) {
        self.partial |= outcome.partial;
        self.skipped.extend(outcome.skipped.iter().cloned());
        self.added_versions += outcome.summary.added.len();
        self.flagged_missing += outcome.summary.flagged_missing.len();
    }
}

enum Listing {
    Entries(Vec<DirEntry>),
    Unreadable,
}

/// Whether a listing of the work directory would find this version
fn listable(work: &Work, naming: NamingConvention, version: &WorkVersion) -> bool {
    let path = Path::new(&version.relative_path);
    if path.parent() != Some(Path::new(work.path())) {
        return false;
    }
    path.file_name()
        .and_then(|name| naming.parse_file(work.name(), &name.to_string_lossy()))
        .is_some_and(|parsed| parsed.element.is_none() && parsed.number == version.number)
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(RegistryError::Cancelled);
    }
    Ok(())
}

/// Walks the project tree through a [`ProjectFileSystem`]
pub struct Scanner<F> {
    fs: Arc<F>,
    layout: ProjectLayout,
}

impl<F: ProjectFileSystem> Scanner<F> {
    pub fn new(fs: Arc<F>, layout: ProjectLayout) -> Self {
        Self { fs, layout }
    }

    pub fn fs(&self) -> &Arc<F> {
        &self.fs
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    async fn list(&self, dir: &Path) -> Listing {
        match self.fs.list_dir(dir).await {
            Ok(entries) => Listing::Entries(entries),
            Err(err) if err.is_not_found() => Listing::Entries(Vec::new()),
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "Skipping unreadable directory");
                Listing::Unreadable
            }
        }
    }

    /// Read and parse a JSON record; `None` when it does not exist
    pub(crate) async fn read_record<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match self.fs.read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Reconcile a work's ledger with the scene files in its directory
    pub async fn scan_versions(
        &self,
        work: &Work,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome<Vec<Arc<WorkVersion>>>> {
        check_cancelled(cancel)?;
        let mark = work.ledger().mark();
        let dir = self.layout.absolute(work.path());
        let naming = self.layout.naming();

        let entries = match self.list(&dir).await {
            Listing::Entries(entries) => entries,
            Listing::Unreadable => {
                return Ok(ScanOutcome {
                    value: work.versions(),
                    partial: true,
                    skipped: vec![dir],
                    summary: RescanSummary::default(),
                });
            }
        };

        let mut found: Vec<(u64, DirEntry)> = entries
            .into_iter()
            .filter(DirEntry::is_file)
            .filter_map(|entry| {
                let parsed = naming.parse_file(work.name(), &entry.name)?;
                parsed.element.is_none().then_some((parsed.number, entry))
            })
            .collect();
        found.sort_by(|(a, a_entry), (b, b_entry)| a.cmp(b).then_with(|| a_entry.name.cmp(&b_entry.name)));

        let mut records = Vec::with_capacity(found.len());
        let mut unreadable = BTreeSet::new();
        let mut skipped = Vec::new();
        let mut partial = false;

        for (number, entry) in found {
            check_cancelled(cancel)?;
            if let Err(err) = self.fs.check_readable(&entry.path).await {
                warn!(path = %entry.path.display(), error = %err, "Skipping unreadable version");
                unreadable.insert(number);
                skipped.push(entry.path);
                continue;
            }

            let relative_path = join_relative(work.path(), &entry.name);
            let record_file = self
                .layout
                .version_record_file(work.path(), work.name(), number);
            let mut version = match self.read_record::<WorkVersion>(&record_file).await {
                Ok(Some(version)) => version,
                Ok(None) => WorkVersion::new(number, relative_path.clone()),
                Err(err) => {
                    warn!(path = %record_file.display(), error = %err, "Ignoring unreadable version record");
                    partial = true;
                    skipped.push(record_file);
                    WorkVersion::new(number, relative_path.clone())
                }
            };
            version.number = number;
            version.relative_path = relative_path;
            records.push(version);
        }

        // versions saved under another name or elsewhere are checked one by one
        let listed: BTreeSet<u64> = records.iter().map(|version| version.number).collect();
        for known in work.ledger().all_versions() {
            if listed.contains(&known.number)
                || unreadable.contains(&known.number)
                || listable(work, naming, &known)
            {
                continue;
            }
            check_cancelled(cancel)?;
            let path = self.layout.absolute(&known.relative_path);
            match self.fs.check_readable(&path).await {
                Ok(()) => records.push(WorkVersion::clone(&known)),
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Skipping unreadable version");
                    unreadable.insert(known.number);
                    skipped.push(path);
                }
            }
        }

        check_cancelled(cancel)?;
        let summary = work.ledger().rescan(DiskScan {
            entries: records,
            unreadable,
            mark,
        });
        debug!(
            work = work.path(),
            added = summary.added.len(),
            missing = summary.flagged_missing.len(),
            restored = summary.restored.len(),
            "Scanned work versions"
        );

        Ok(ScanOutcome {
            value: work.versions(),
            partial: partial || !skipped.is_empty(),
            skipped,
            summary,
        })
    }

    /// Reconcile a publish's ledger with its version directories
    pub async fn scan_publish_versions(
        &self,
        publish: &Publish,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome<Vec<Arc<PublishVersion>>>> {
        check_cancelled(cancel)?;
        let mark = publish.ledger().mark();
        let dir = self.layout.absolute(publish.path());
        let naming = self.layout.naming();
        let work_name = publish.work_name();

        let entries = match self.list(&dir).await {
            Listing::Entries(entries) => entries,
            Listing::Unreadable => {
                return Ok(ScanOutcome {
                    value: publish.versions(),
                    partial: true,
                    skipped: vec![dir],
                    summary: RescanSummary::default(),
                });
            }
        };

        let mut found: Vec<(u64, DirEntry)> = entries
            .into_iter()
            .filter(DirEntry::is_dir)
            .filter_map(|entry| Some((naming.parse_version_tag(&entry.name)?, entry)))
            .collect();
        found.sort_by(|(a, a_entry), (b, b_entry)| a.cmp(b).then_with(|| a_entry.name.cmp(&b_entry.name)));

        let mut records = Vec::with_capacity(found.len());
        let mut unreadable = BTreeSet::new();
        let mut skipped = Vec::new();
        let mut partial = false;

        for (number, entry) in found {
            check_cancelled(cancel)?;
            let files = match self.fs.list_dir(&entry.path).await {
                Ok(files) => files,
                Err(err) if err.is_not_found() => continue,
                Err(err) => {
                    warn!(path = %entry.path.display(), error = %err, "Skipping unreadable publish version");
                    unreadable.insert(number);
                    skipped.push(entry.path);
                    continue;
                }
            };

            let version_path = join_relative(publish.path(), &entry.name);
            let mut elements: Vec<(String, DirEntry)> = files
                .into_iter()
                .filter(DirEntry::is_file)
                .filter_map(|file| {
                    let parsed = naming.parse_file(work_name, &file.name)?;
                    match parsed.element {
                        Some(element) if parsed.number == number => Some((element, file)),
                        _ => None,
                    }
                })
                .collect();
            elements.sort_by(|a, b| a.1.name.cmp(&b.1.name));

            let record_file = self
                .layout
                .publish_record_file(publish.path(), work_name, number);
            let mut version = match self.read_record::<PublishVersion>(&record_file).await {
                Ok(Some(version)) => version,
                Ok(None) => PublishVersion::new(number, version_path.clone()),
                Err(err) => {
                    warn!(path = %record_file.display(), error = %err, "Ignoring unreadable publish record");
                    partial = true;
                    skipped.push(record_file);
                    PublishVersion::new(number, version_path.clone())
                }
            };

            let mut index: ElementIndex = std::mem::take(&mut version.elements);
            for (element_type, file) in elements {
                index.add_element_path(element_type, join_relative(&version_path, &file.name));
            }
            version.number = number;
            version.relative_path = version_path;
            version.elements = index;
            records.push(version);
        }

        check_cancelled(cancel)?;
        let summary = publish.ledger().rescan(DiskScan {
            entries: records,
            unreadable,
            mark,
        });

        let state_file = self.layout.publish_state_file(publish.path());
        match self.read_record::<PublishRecord>(&state_file).await {
            Ok(Some(record)) => publish.apply_record(&record),
            Ok(None) => {}
            Err(err) => {
                warn!(path = %state_file.display(), error = %err, "Ignoring unreadable publish state");
                partial = true;
                skipped.push(state_file);
            }
        }
        debug!(
            publish = publish.path(),
            added = summary.added.len(),
            missing = summary.flagged_missing.len(),
            "Scanned publish versions"
        );

        Ok(ScanOutcome {
            value: publish.versions(),
            partial: partial || !skipped.is_empty(),
            skipped,
            summary,
        })
    }

    /// Register work directories found under a category
    pub async fn scan_works(
        &self,
        category: &Arc<Category>,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome<Vec<Arc<Work>>>> {
        check_cancelled(cancel)?;
        let dir = self.layout.absolute(category.path());
        let entries = match self.list(&dir).await {
            Listing::Entries(entries) => entries,
            Listing::Unreadable => {
                return Ok(ScanOutcome {
                    value: category.works(),
                    partial: true,
                    skipped: vec![dir],
                    summary: RescanSummary::default(),
                });
            }
        };

        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.is_dir() && !entry.name.starts_with('.'))
            .map(|entry| entry.name)
            .collect();
        names.sort();

        let mut added = 0;
        let mut outcome = ScanOutcome::complete(());
        for name in &names {
            check_cancelled(cancel)?;
            let (work, created) = category.ensure_work(name);
            if created {
                added += 1;
            }

            let state_file = self.layout.work_state_file(work.path());
            match self.read_record::<WorkRecord>(&state_file).await {
                Ok(Some(record)) => work.apply_record(&record),
                Ok(None) => {}
                Err(err) => {
                    warn!(path = %state_file.display(), error = %err, "Ignoring unreadable work state");
                    outcome.partial = true;
                    outcome.skipped.push(state_file);
                }
            }
        }
        debug!(category = category.path(), added, "Scanned works");
        Ok(outcome.map(|()| category.works()))
    }

    /// Task records stored for a subproject, in file name order
    pub async fn read_task_records(
        &self,
        subproject: &Subproject,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome<Vec<TaskRecord>>> {
        check_cancelled(cancel)?;
        let dir = self.layout.task_record_dir(subproject.path());
        let entries = match self.list(&dir).await {
            Listing::Entries(entries) => entries,
            Listing::Unreadable => {
                return Ok(ScanOutcome {
                    value: Vec::new(),
                    partial: true,
                    skipped: vec![dir],
                    summary: RescanSummary::default(),
                });
            }
        };

        let mut files: Vec<DirEntry> = entries
            .into_iter()
            .filter(|entry| entry.is_file() && entry.name.ends_with(TASK_RECORD_SUFFIX))
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));

        let mut outcome = ScanOutcome::complete(Vec::with_capacity(files.len()));
        for file in files {
            check_cancelled(cancel)?;
            match self.read_record::<TaskRecord>(&file.path).await {
                Ok(Some(record)) => outcome.value.push(record),
                Ok(None) => {}
                Err(err) => {
                    warn!(path = %file.path.display(), error = %err, "Skipping unreadable task record");
                    outcome.partial = true;
                    outcome.skipped.push(file.path);
                }
            }
        }
        Ok(outcome)
    }

    /// Whether a work has a publish directory on disk
    pub async fn has_publish_dir(&self, work: &Work) -> bool {
        let dir = self.layout.absolute(&self.layout.publish_path(work.path()));
        self.fs.exists(&dir).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryDefinition;
    use crate::config::RegistryConfig;
    use crate::storage::MemoryFileSystem;
    use lineage::{NamingConvention, VersionSelector};
    use std::sync::Weak;

    const ROOT: &str = "/projects/show";

    fn scanner() -> (Arc<MemoryFileSystem>, Scanner<MemoryFileSystem>) {
        let fs = Arc::new(MemoryFileSystem::new());
        let layout = ProjectLayout::from_config(&RegistryConfig::new(ROOT));
        (fs.clone(), Scanner::new(fs, layout))
    }

    fn category() -> Arc<Category> {
        Arc::new(Category::new(
            Weak::new(),
            "Char/Hero",
            "Model",
            CategoryDefinition::default(),
            NamingConvention::default(),
        ))
    }

    fn work_dir() -> String {
        format!("{ROOT}/Char/Hero/Model/hero_model")
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let (_fs, scanner) = scanner();
        let category = category();
        let work = category.add_work("hero_model").unwrap();
        let outcome = scanner
            .scan_versions(&work, &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.value.is_empty());
        assert!(!outcome.partial);
    }

    #[tokio::test]
    async fn test_scan_versions_sorted_and_filtered() {
        let (fs, scanner) = scanner();
        let dir = work_dir();
        fs.insert_file(format!("{dir}/hero_model_v010.ma"), "scene");
        fs.insert_file(format!("{dir}/hero_model_v002.ma"), "scene");
        fs.insert_file(format!("{dir}/hero_model_v001.ma"), "scene");
        fs.insert_file(format!("{dir}/notes.txt"), "todo");
        fs.insert_file(format!("{dir}/villain_v001.ma"), "scene");

        let category = category();
        let work = category.add_work("hero_model").unwrap();
        let outcome = scanner
            .scan_versions(&work, &CancellationToken::new())
            .await
            .unwrap();
        let numbers: Vec<u64> = outcome.value.iter().map(|v| v.number).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
        assert_eq!(outcome.summary.added, vec![1, 2, 10]);
        assert_eq!(work.ledger().next_number(), 11);
        assert_eq!(work.get_version(VersionSelector::Latest).unwrap().number, 10);
    }

    #[tokio::test]
    async fn test_sidecar_record_supplies_authorship() {
        let (fs, scanner) = scanner();
        fs.insert_file(format!("{}/hero_model_v001.ma", work_dir()), "scene");
        fs.insert_file(
            format!("{ROOT}/.lineage/Char/Hero/Model/hero_model/hero_model_v001.json"),
            r#"{"number": 1, "relative_path": "old/place.ma", "user": "bob",
                "workstation": "ws-07", "note": "first pass",
                "created_at": "2024-03-01T10:00:00Z"}"#,
        );

        let category = category();
        let work = category.add_work("hero_model").unwrap();
        let outcome = scanner
            .scan_versions(&work, &CancellationToken::new())
            .await
            .unwrap();
        let version = &outcome.value[0];
        assert_eq!(version.user, "bob");
        assert_eq!(version.note, "first pass");
        assert_eq!(version.relative_path, "Char/Hero/Model/hero_model/hero_model_v001.ma");
    }

    #[tokio::test]
    async fn test_unreadable_entry_marks_partial() {
        let (fs, scanner) = scanner();
        let dir = work_dir();
        for number in 1..=3 {
            fs.insert_file(format!("{dir}/hero_model_v{number:03}.ma"), "scene");
        }
        fs.deny(format!("{dir}/hero_model_v002.ma"));

        let category = category();
        let work = category.add_work("hero_model").unwrap();
        let outcome = scanner
            .scan_versions(&work, &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.partial);
        assert_eq!(outcome.skipped.len(), 1);
        let numbers: Vec<u64> = outcome.value.iter().map(|v| v.number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_cancelled_scan_applies_nothing() {
        let (fs, scanner) = scanner();
        fs.insert_file(format!("{}/hero_model_v001.ma", work_dir()), "scene");
        let category = category();
        let work = category.add_work("hero_model").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = scanner.scan_versions(&work, &cancel).await.unwrap_err();
        assert!(matches!(err, RegistryError::Cancelled));
        assert!(work.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_scan_publish_versions_collects_elements() {
        let (fs, scanner) = scanner();
        let publish_dir = format!("{}/publish", work_dir());
        fs.insert_file(format!("{publish_dir}/v001/hero_model_v001_alembic.abc"), "abc");
        fs.insert_file(format!("{publish_dir}/v001/hero_model_v001_usd.usda"), "usd");
        fs.insert_file(format!("{publish_dir}/v002/hero_model_v002_usd.usda"), "usd");
        fs.insert_file(format!("{publish_dir}/v002/hero_model_v001_usd.usda"), "stray");
        fs.insert_dir(format!("{publish_dir}/scratch"));

        let category = category();
        let work = category.add_work("hero_model").unwrap();
        let publish = work.ensure_publish();
        let outcome = scanner
            .scan_publish_versions(&publish, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.value.len(), 2);
        let first = &outcome.value[0];
        assert_eq!(
            first.element_types(),
            vec!["alembic".to_string(), "usd".to_string()]
        );
        let second = &outcome.value[1];
        assert_eq!(second.element_types(), vec!["usd".to_string()]);
        assert_eq!(
            second.elements.get_element("usd"),
            Some("Char/Hero/Model/hero_model/publish/v002/hero_model_v002_usd.usda")
        );
    }

    #[tokio::test]
    async fn test_scan_works_registers_directories() {
        let (fs, scanner) = scanner();
        fs.insert_dir(format!("{ROOT}/Char/Hero/Model/hero_model"));
        fs.insert_dir(format!("{ROOT}/Char/Hero/Model/hero_body"));
        fs.insert_dir(format!("{ROOT}/Char/Hero/Model/.cache"));
        fs.insert_file(format!("{ROOT}/Char/Hero/Model/readme.txt"), "");

        let category = category();
        category.add_work("hero_model").unwrap();
        let outcome = scanner
            .scan_works(&category, &CancellationToken::new())
            .await
            .unwrap();
        let names: Vec<&str> = outcome.value.iter().map(|work| work.name()).collect();
        assert_eq!(names, vec!["hero_body", "hero_model"]);
    }
}
