//! Project registry: the hierarchy, its records and its scans

use crate::cascade::{self, CascadeQuery, CascadeResult};
use crate::category::{Category, CategoryDefinitions};
use crate::config::{RegistryConfig, Session};
use crate::error::{RegistryError, Result};
use crate::layout::{ProjectLayout, join_relative};
use crate::publish::{Publish, PublishRecord, PublishRequest};
use crate::scanner::{ScanOutcome, Scanner, TreeScanReport};
use crate::storage::ProjectFileSystem;
use crate::subproject::{Subproject, SubprojectId, SubprojectRecord, wildcard_match};
use crate::task::{Task, TaskId, TaskRecord};
use crate::work::{NewVersion, Work, WorkRecord, WorkState};
use lineage::{Metadata, MetadataLookup, PathResolver, PublishVersion, WorkVersion};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Weak};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Metadata key a subproject uses to give its tasks a default type
pub const MODE_KEY: &str = "mode";

/// Whether `path` lies strictly below the directory `dir`
fn is_below(path: &str, dir: &str) -> bool {
    dir.is_empty()
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// One project: its subproject tree and everything below it
pub struct Registry<F: ProjectFileSystem> {
    config: RegistryConfig,
    scanner: Scanner<F>,
    root: Arc<Subproject>,
    definitions: CategoryDefinitions,
    task_index: Mutex<HashMap<TaskId, Weak<Task>>>,
}

impl<F: ProjectFileSystem> Registry<F> {
    /// An empty project with the built-in category definitions
    pub fn new(fs: F, config: RegistryConfig) -> Self {
        let name = config
            .project_root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let root = Subproject::root(SubprojectId::generate(), name);
        Self::with_root(Arc::new(fs), config, root, CategoryDefinitions::default())
    }

    fn with_root(
        fs: Arc<F>,
        config: RegistryConfig,
        root: Arc<Subproject>,
        definitions: CategoryDefinitions,
    ) -> Self {
        let layout = ProjectLayout::from_config(&config);
        Self {
            config,
            scanner: Scanner::new(fs, layout),
            root,
            definitions,
            task_index: Mutex::new(HashMap::new()),
        }
    }

    /// Load the project structure and category definitions from the
    /// database directory.
    ///
    /// Tasks, works and versions are not loaded; run a scan for those.
    pub async fn open(fs: F, config: RegistryConfig) -> Result<Self> {
        let registry = Self::new(fs, config);
        let definitions_file = registry.layout().category_definitions_file();
        let structure_file = registry.layout().structure_file();

        let definitions = registry
            .scanner
            .read_record::<CategoryDefinitions>(&definitions_file)
            .await?
            .unwrap_or_default();

        let root = match registry
            .scanner
            .read_record::<SubprojectRecord>(&structure_file)
            .await?
        {
            Some(record) => record.into_root()?,
            None => {
                debug!(root = %registry.config.project_root.display(), "No project structure yet");
                return Ok(Self { definitions, ..registry });
            }
        };

        info!(
            root = %registry.config.project_root.display(),
            subprojects = root.descendants().len(),
            "Opened project"
        );
        Ok(Self {
            root,
            definitions,
            ..registry
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn layout(&self) -> &ProjectLayout {
        self.scanner.layout()
    }

    pub fn resolver(&self) -> &PathResolver {
        self.scanner.layout().resolver()
    }

    pub fn fs(&self) -> &Arc<F> {
        self.scanner.fs()
    }

    pub fn root(&self) -> &Arc<Subproject> {
        &self.root
    }

    pub fn definitions(&self) -> &CategoryDefinitions {
        &self.definitions
    }

    // === Lookups ===

    pub fn find_sub_by_path(&self, path: &str) -> Option<Arc<Subproject>> {
        self.root.find_by_path(path)
    }

    pub fn find_sub_by_id(&self, id: &SubprojectId) -> Option<Arc<Subproject>> {
        self.root
            .descendants()
            .into_iter()
            .find(|subproject| subproject.id() == id)
    }

    /// Subprojects whose name matches a `*`/`?` pattern, breadth first
    pub fn find_subs_by_wildcard(&self, pattern: &str) -> Vec<Arc<Subproject>> {
        self.root
            .descendants()
            .into_iter()
            .filter(|subproject| !subproject.is_root() && wildcard_match(pattern, subproject.name()))
            .collect()
    }

    pub fn find_task_by_id(&self, id: &TaskId) -> Option<Arc<Task>> {
        self.task_index.lock().get(id).and_then(Weak::upgrade)
    }

    /// The work and version a scene file on disk belongs to
    pub fn find_work_by_absolute_path(
        &self,
        path: impl AsRef<Path>,
    ) -> Option<(Arc<Work>, Arc<WorkVersion>)> {
        let resolver = self.resolver();
        if !resolver.is_managed(path.as_ref()) {
            return None;
        }
        let relative = resolver.to_relative(path);

        for subproject in self.root.descendants() {
            if !is_below(&relative, subproject.path()) {
                continue;
            }
            for task in subproject.tasks() {
                if !is_below(&relative, task.path()) {
                    continue;
                }
                for category in task.categories() {
                    if !is_below(&relative, category.path()) {
                        continue;
                    }
                    for work in category.works() {
                        if !is_below(&relative, work.path()) {
                            continue;
                        }
                        if let Some(version) = work.ledger().find_by_path(&relative) {
                            return Some((work, version));
                        }
                    }
                }
            }
        }
        None
    }

    /// A work by its place in the hierarchy
    pub fn find_work(
        &self,
        subproject_path: &str,
        task: &str,
        category: &str,
        work: &str,
    ) -> Result<Arc<Work>> {
        let subproject = self
            .find_sub_by_path(subproject_path)
            .ok_or_else(|| RegistryError::SubprojectNotFound(subproject_path.to_string()))?;
        let task_path = join_relative(subproject_path, task);
        let found = subproject
            .task(task)
            .ok_or_else(|| RegistryError::TaskNotFound(task_path.clone()))?
            .category(category)
            .and_then(|category| category.work(work));
        found.ok_or_else(|| RegistryError::WorkNotFound(format!("{task_path}/{category}/{work}")))
    }

    pub fn cascade(&self, query: &CascadeQuery) -> CascadeResult {
        cascade::resolve(&self.root, self.resolver(), query)
    }

    // === Hierarchy mutations ===

    /// Create a subproject under `parent_path`, optionally with a default
    /// task type for the tasks created below it
    pub fn create_sub_project(
        &self,
        name: &str,
        parent_path: &str,
        mode: Option<&str>,
    ) -> Result<Arc<Subproject>> {
        let parent = self
            .find_sub_by_path(parent_path)
            .ok_or_else(|| RegistryError::SubprojectNotFound(parent_path.to_string()))?;

        let metadata = Metadata::new();
        if let Some(mode) = mode {
            metadata.set(MODE_KEY, mode);
        }
        let child = Subproject::new_child(&parent, SubprojectId::generate(), name, metadata);
        let child = parent.attach_child(child)?;
        debug!(path = child.path(), "Created subproject");
        Ok(child)
    }

    /// Create a task with its categories.
    ///
    /// A task without an explicit type takes the `mode` of its subproject,
    /// looked up through the subproject chain.
    pub fn add_task(
        &self,
        session: &Session,
        parent_path: &str,
        name: &str,
        categories: &[&str],
        uid: Option<TaskId>,
    ) -> Result<Arc<Task>> {
        let parent = self
            .find_sub_by_path(parent_path)
            .ok_or_else(|| RegistryError::SubprojectNotFound(parent_path.to_string()))?;

        let task_type = parent
            .lookup(MODE_KEY)
            .and_then(|value| value.as_str().map(str::to_string));
        let record = TaskRecord {
            id: uid.unwrap_or_else(TaskId::generate),
            name: name.to_string(),
            task_type,
            creator: session.user.clone(),
            categories: categories.iter().map(|category| category.to_string()).collect(),
            metadata: Metadata::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.insert_task(&parent, record)
    }

    fn insert_task(&self, parent: &Arc<Subproject>, record: TaskRecord) -> Result<Arc<Task>> {
        let mut index = self.task_index.lock();
        if index.get(&record.id).and_then(Weak::upgrade).is_some() {
            return Err(RegistryError::DuplicateId(record.id.to_string()));
        }
        let task = Task::build(parent, record, &self.definitions, self.layout().naming());
        let task = parent.attach_task(task)?;
        index.insert(task.id().clone(), Arc::downgrade(&task));
        Ok(task)
    }

    /// Remove a task and move its record to the purgatory.
    ///
    /// Work files on disk are left alone. The task stays in memory when
    /// its record cannot be moved.
    pub async fn remove_task(&self, subproject_path: &str, name: &str) -> Result<Arc<Task>> {
        let parent = self
            .find_sub_by_path(subproject_path)
            .ok_or_else(|| RegistryError::SubprojectNotFound(subproject_path.to_string()))?;
        let not_found = || RegistryError::TaskNotFound(join_relative(subproject_path, name));
        if parent.task(name).is_none() {
            return Err(not_found());
        }

        let record = self.layout().task_record_file(parent.path(), name);
        if self.fs().exists(&record).await? {
            let target = self.layout().purgatory_task_record_file(parent.path(), name);
            if let Some(dir) = target.parent() {
                self.fs().create_dir_all(dir).await?;
            }
            self.fs().rename(&record, &target).await?;
            debug!(from = %record.display(), to = %target.display(), "Moved task record to purgatory");
        }

        let task = parent.detach_task(name).ok_or_else(not_found)?;
        self.task_index.lock().remove(task.id());
        info!(task = task.path(), "Removed task");
        Ok(task)
    }

    /// Add a category to an existing task
    pub fn add_category(&self, task: &Arc<Task>, name: &str) -> Result<Arc<Category>> {
        task.add_category(name, &self.definitions)
    }

    // === Versions ===

    /// Register a saved scene and write its version record.
    ///
    /// The version is taken back out of the ledger when its record cannot
    /// be written, so a retry gets the same number.
    pub async fn save_version(&self, work: &Work, request: NewVersion) -> Result<Arc<WorkVersion>> {
        let reservation = work.ledger().in_progress();
        let version = work.save_version(self.resolver(), request)?;
        if let Err(err) = self.record_version(work, &version).await {
            warn!(work = work.path(), version = version.number, error = %err, "Version record not written");
            work.ledger().retract(&version, reservation);
            return Err(err);
        }
        Ok(version)
    }

    /// Commit a publish version and write its record; undone like
    /// [`save_version`](Self::save_version) when the write fails
    pub async fn publish(
        &self,
        work: &Arc<Work>,
        request: PublishRequest,
    ) -> Result<Arc<PublishVersion>> {
        let publish = work.ensure_publish();
        let reservation = publish.ledger().in_progress();
        let version = publish.commit(self.resolver(), request)?;
        if let Err(err) = self.record_publish(&publish, &version).await {
            warn!(publish = publish.path(), version = version.number, error = %err, "Publish record not written");
            publish.ledger().retract(&version, reservation);
            return Err(err);
        }
        info!(
            publish = publish.path(),
            version = version.number,
            elements = version.elements.len(),
            "Published"
        );
        Ok(version)
    }

    /// Make a publish version live and store the choice
    pub async fn set_live(&self, publish: &Publish, number: u64) -> Result<Arc<PublishVersion>> {
        let version = publish.get_version(number)?;
        let record = PublishRecord {
            live: Some(number),
            ..publish.to_record()
        };
        self.save_publish_state(publish, &record).await?;
        publish.set_live(number)?;
        info!(publish = publish.path(), version = number, "Set live version");
        Ok(version)
    }

    /// Promote a publish version and store the choice
    pub async fn promote(&self, publish: &Publish, number: u64) -> Result<Arc<PublishVersion>> {
        let version = publish.get_version(number)?;
        let record = PublishRecord {
            promoted: Some(number),
            ..publish.to_record()
        };
        self.save_publish_state(publish, &record).await?;
        publish.promote(number)?;
        info!(publish = publish.path(), version = number, "Promoted version");
        Ok(version)
    }

    /// Hide a work from pickers; nothing is deleted
    pub async fn omit_work(&self, work: &Work) -> Result<()> {
        let record = WorkRecord {
            state: WorkState::Omitted,
        };
        self.save_work_state(work, &record).await?;
        work.omit();
        info!(work = work.path(), "Omitted work");
        Ok(())
    }

    pub async fn revive_work(&self, work: &Work) -> Result<()> {
        self.save_work_state(work, &WorkRecord::default()).await?;
        work.revive();
        info!(work = work.path(), state = ?work.state(), "Revived work");
        Ok(())
    }

    // === Persistence ===

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.fs().create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(value)?;
        self.fs().write(path, data).await?;
        Ok(())
    }

    /// Write the subproject tree to the database directory
    pub async fn save_structure(&self) -> Result<()> {
        let path = self.layout().structure_file();
        self.write_json(&path, &self.root.to_record()).await?;
        info!(path = %path.display(), "Saved project structure");
        Ok(())
    }

    pub async fn save_category_definitions(&self) -> Result<()> {
        let path = self.layout().category_definitions_file();
        self.write_json(&path, &self.definitions).await
    }

    pub async fn save_task(&self, task: &Task) -> Result<()> {
        let subproject = task
            .subproject()
            .ok_or_else(|| RegistryError::SubprojectNotFound(task.path().to_string()))?;
        let path = self
            .layout()
            .task_record_file(subproject.path(), task.name());
        self.write_json(&path, &task.to_record()).await
    }

    pub async fn record_version(&self, work: &Work, version: &WorkVersion) -> Result<()> {
        let path = self
            .layout()
            .version_record_file(work.path(), work.name(), version.number);
        self.write_json(&path, version).await
    }

    async fn save_work_state(&self, work: &Work, record: &WorkRecord) -> Result<()> {
        self.write_json(&self.layout().work_state_file(work.path()), record)
            .await
    }

    async fn save_publish_state(&self, publish: &Publish, record: &PublishRecord) -> Result<()> {
        self.write_json(&self.layout().publish_state_file(publish.path()), record)
            .await
    }

    pub async fn record_publish(&self, publish: &Publish, version: &PublishVersion) -> Result<()> {
        let path = self
            .layout()
            .publish_record_file(publish.path(), publish.work_name(), version.number);
        self.write_json(&path, version).await
    }

    // === Scans ===

    /// Load task records of a subproject that are not in memory yet
    pub async fn scan_tasks(
        &self,
        subproject: &Arc<Subproject>,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome<Vec<Arc<Task>>>> {
        let outcome = self.scanner.read_task_records(subproject, cancel).await?;
        if cancel.is_cancelled() {
            return Err(RegistryError::Cancelled);
        }

        let ScanOutcome {
            value: records,
            mut partial,
            mut skipped,
            summary,
        } = outcome;
        for record in records {
            if subproject.task(&record.name).is_some() {
                continue;
            }
            let name = record.name.clone();
            match self.insert_task(subproject, record) {
                Ok(_) => {}
                Err(err) if err.is_consistency() => {
                    warn!(subproject = subproject.path(), task = %name, error = %err, "Skipping task record");
                    partial = true;
                    skipped.push(self.layout().task_record_file(subproject.path(), &name));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(ScanOutcome {
            value: subproject.tasks(),
            partial,
            skipped,
            summary,
        })
    }

    pub async fn scan_works(
        &self,
        category: &Arc<Category>,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome<Vec<Arc<Work>>>> {
        self.scanner.scan_works(category, cancel).await
    }

    pub async fn scan_versions(
        &self,
        work: &Work,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome<Vec<Arc<WorkVersion>>>> {
        self.scanner.scan_versions(work, cancel).await
    }

    pub async fn scan_publish_versions(
        &self,
        publish: &Publish,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome<Vec<Arc<PublishVersion>>>> {
        self.scanner.scan_publish_versions(publish, cancel).await
    }

    /// Scan every level of the project.
    ///
    /// Ledgers reconciled before a cancellation keep their changes; the
    /// ledger being scanned when it arrives is left untouched.
    pub async fn scan_tree(&self, cancel: &CancellationToken) -> Result<TreeScanReport> {
        let mut report = TreeScanReport::default();

        for subproject in self.root.descendants() {
            report.subprojects += 1;
            let tasks = self.scan_tasks(&subproject, cancel).await?;
            report.absorb(&tasks);

            for task in tasks.value {
                report.tasks += 1;
                for category in task.categories() {
                    let works = self.scan_works(&category, cancel).await?;
                    report.absorb(&works);

                    for work in works.value {
                        report.works += 1;
                        let versions = self.scan_versions(&work, cancel).await?;
                        report.absorb(&versions);
                        report.versions += versions.value.len();

                        if work.publish().is_none() && !self.scanner.has_publish_dir(&work).await {
                            continue;
                        }
                        let publish = work.ensure_publish();
                        let publishes = self.scan_publish_versions(&publish, cancel).await?;
                        report.absorb(&publishes);
                        report.publish_versions += publishes.value.len();
                    }
                }
            }
        }

        info!(
            subprojects = report.subprojects,
            tasks = report.tasks,
            works = report.works,
            versions = report.versions,
            publish_versions = report.publish_versions,
            partial = report.partial,
            "Scanned project"
        );
        Ok(report)
    }
}
