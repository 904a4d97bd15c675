//! Publishes: the approved output lineage of a work

use crate::config::Session;
use crate::error::Result;
use crate::layout::join_relative;
use crate::work::Work;
use lineage::{
    ElementIndex, LedgerKind, Metadata, MetadataLookup, MetadataNode, NamingConvention,
    PathResolver, PublishVersion, VersionLedger, VersionSelector,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tracing::warn;

/// Where one element of a publish is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementOutput {
    /// `<work>_vNNN_<element>.<ext>` in the version directory
    Canonical { extension: Option<String> },
    /// A file the exporter wrote somewhere else
    Path(PathBuf),
}

impl ElementOutput {
    pub fn canonical(extension: impl Into<String>) -> Self {
        ElementOutput::Canonical {
            extension: Some(extension.into()),
        }
    }
}

/// Everything needed to commit one publish version
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Number taken from a reservation; `None` takes the next number
    pub number: Option<u64>,
    pub session: Session,
    pub note: String,
    pub work_version: Option<u64>,
    pub elements: Vec<(String, ElementOutput)>,
}

impl PublishRequest {
    pub fn new(session: Session) -> Self {
        Self {
            number: None,
            session,
            note: String::new(),
            work_version: None,
            elements: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn from_work_version(mut self, number: u64) -> Self {
        self.work_version = Some(number);
        self
    }

    pub fn reserved(mut self, number: u64) -> Self {
        self.number = Some(number);
        self
    }

    pub fn with_element(mut self, element_type: impl Into<String>, output: ElementOutput) -> Self {
        self.elements.push((element_type.into(), output));
        self
    }
}

/// Stored live and promoted pointers of a publish
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRecord {
    #[serde(default)]
    pub live: Option<u64>,
    #[serde(default)]
    pub promoted: Option<u64>,
}

/// The publish lineage of one work
pub struct Publish {
    work_name: String,
    path: String,
    naming: NamingConvention,
    parent: Weak<Work>,
    ledger: VersionLedger<PublishVersion>,
}

impl fmt::Debug for Publish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publish")
            .field("path", &self.path)
            .field("ledger", &self.ledger)
            .finish()
    }
}

impl Publish {
    pub(crate) fn new(
        parent: Weak<Work>,
        path: &str,
        work_name: &str,
        naming: NamingConvention,
    ) -> Self {
        Self {
            work_name: work_name.to_string(),
            path: path.to_string(),
            naming,
            parent,
            ledger: VersionLedger::new(LedgerKind::Publish, format!("publish {path}")),
        }
    }

    /// Directory of the publish relative to the project root
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn work(&self) -> Option<Arc<Work>> {
        self.parent.upgrade()
    }

    pub fn work_name(&self) -> &str {
        &self.work_name
    }

    pub fn ledger(&self) -> &VersionLedger<PublishVersion> {
        &self.ledger
    }

    pub fn versions(&self) -> Vec<Arc<PublishVersion>> {
        self.ledger.versions()
    }

    pub fn get_version(&self, selector: impl Into<VersionSelector>) -> Result<Arc<PublishVersion>> {
        Ok(self.ledger.get(selector)?)
    }

    /// Project-relative directory of one version
    pub fn version_path(&self, number: u64) -> String {
        join_relative(&self.path, &self.naming.version_tag(number))
    }

    /// Project-relative canonical element file of one version
    pub fn element_path(&self, number: u64, element_type: &str, extension: Option<&str>) -> String {
        join_relative(
            &self.version_path(number),
            &self
                .naming
                .element_file(&self.work_name, number, element_type, extension),
        )
    }

    /// Absolute path an exporter should write an element to
    pub fn element_target(
        &self,
        resolver: &PathResolver,
        number: u64,
        element_type: &str,
        extension: Option<&str>,
    ) -> PathBuf {
        resolver.to_absolute_lossy(&self.element_path(number, element_type, extension))
    }

    /// Claim the next number as an in-progress publish
    pub fn reserve(&self, session: &Session, note: &str) -> Arc<PublishVersion> {
        self.ledger.set_in_progress(|number| {
            let mut version = PublishVersion::new(number, self.version_path(number));
            version.user = session.user.clone();
            version.note = note.to_string();
            version
        })
    }

    /// Append a publish version with its elements.
    ///
    /// The effective metadata of the work is copied onto the version so the
    /// record keeps the values it was published with.
    pub fn commit(
        &self,
        resolver: &PathResolver,
        request: PublishRequest,
    ) -> Result<Arc<PublishVersion>> {
        let snapshot = self
            .work()
            .map(|work| Metadata::from_map(work.flatten()))
            .unwrap_or_default();

        let PublishRequest {
            number,
            session,
            note,
            work_version,
            elements,
        } = request;
        let build = |number: u64| {
            let mut index = ElementIndex::new();
            for (element_type, output) in &elements {
                let path = match output {
                    ElementOutput::Canonical { extension } => {
                        self.element_path(number, element_type, extension.as_deref())
                    }
                    ElementOutput::Path(path) => resolver.to_relative(path),
                };
                index.add_element_path(element_type.clone(), path);
            }
            let mut version = PublishVersion::new(number, self.version_path(number));
            version.work_version = work_version;
            version.user = session.user;
            version.note = note;
            version.elements = index;
            version.metadata = snapshot;
            version
        };

        let version = match number {
            Some(number) => self.ledger.append(build(number))?,
            None => self.ledger.append_with(build)?,
        };
        Ok(version)
    }

    /// Make `number` the version `Latest` resolves to
    pub fn set_live(&self, number: u64) -> Result<Arc<PublishVersion>> {
        Ok(self.ledger.set_live(number)?)
    }

    pub fn live(&self) -> Option<Arc<PublishVersion>> {
        self.ledger.live().and_then(|number| self.ledger.get(number).ok())
    }

    /// Make `number` the version `Promoted` resolves to
    pub fn promote(&self, number: u64) -> Result<Arc<PublishVersion>> {
        Ok(self.ledger.set_promoted(number)?)
    }

    pub fn promoted(&self) -> Option<Arc<PublishVersion>> {
        self.ledger.get(VersionSelector::Promoted).ok()
    }

    pub fn to_record(&self) -> PublishRecord {
        PublishRecord {
            live: self.ledger.live(),
            promoted: self.ledger.promoted(),
        }
    }

    /// Restore stored pointers; a pointer to an unknown version is dropped
    pub(crate) fn apply_record(&self, record: &PublishRecord) {
        if let Some(number) = record.live {
            if let Err(err) = self.ledger.set_live(number) {
                warn!(publish = self.path(), error = %err, "Ignoring stored live version");
            }
        }
        if let Some(number) = record.promoted {
            if let Err(err) = self.ledger.set_promoted(number) {
                warn!(publish = self.path(), error = %err, "Ignoring stored promoted version");
            }
        }
    }

    /// Metadata view of one publish version, inheriting from the work
    pub fn version_scope(&self, selector: impl Into<VersionSelector>) -> Result<Option<PublishScope>> {
        let version = self.ledger.get(selector)?;
        Ok(self.work().map(|work| PublishScope { work, version }))
    }
}

/// A publish version placed at the bottom of the metadata chain
#[derive(Debug, Clone)]
pub struct PublishScope {
    pub work: Arc<Work>,
    pub version: Arc<PublishVersion>,
}

impl MetadataNode for PublishScope {
    fn metadata(&self) -> &Metadata {
        &self.version.metadata
    }

    fn parent_node(&self) -> Option<Arc<dyn MetadataNode>> {
        Some(self.work.clone() as Arc<dyn MetadataNode>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{Category, CategoryDefinition};
    use lineage::MetaValue;

    fn fixture() -> (Arc<Category>, Arc<Work>, Arc<Publish>) {
        let category = Arc::new(Category::new(
            Weak::new(),
            "Char/Hero",
            "Model",
            CategoryDefinition::default(),
            NamingConvention::default(),
        ));
        let work = category.add_work("hero_model").unwrap();
        let publish = work.ensure_publish();
        (category, work, publish)
    }

    fn session() -> Session {
        Session::new("alice", "ws-01")
    }

    #[test]
    fn test_commit_builds_canonical_elements() {
        let resolver = PathResolver::new("/projects/show");
        let (_category, _work, publish) = fixture();
        let version = publish
            .commit(
                &resolver,
                PublishRequest::new(session())
                    .with_element("alembic", ElementOutput::canonical("abc"))
                    .with_element("usd", ElementOutput::canonical("usda")),
            )
            .unwrap();

        assert_eq!(version.number, 1);
        assert_eq!(version.relative_path, "Char/Hero/Model/hero_model/publish/v001");
        assert_eq!(
            version.elements.get_element("usd"),
            Some("Char/Hero/Model/hero_model/publish/v001/hero_model_v001_usd.usda")
        );
        assert_eq!(
            version.get_element_path("alembic", false, &resolver).unwrap(),
            PathBuf::from(
                "/projects/show/Char/Hero/Model/hero_model/publish/v001/hero_model_v001_alembic.abc"
            )
        );
    }

    #[test]
    fn test_publish_without_elements_is_valid() {
        let resolver = PathResolver::new("/projects/show");
        let (_category, _work, publish) = fixture();
        let version = publish
            .commit(&resolver, PublishRequest::new(session()))
            .unwrap();
        assert!(version.elements.is_empty());
        assert!(version.get_element_path("usd", true, &resolver).unwrap_err().is_not_found());
    }

    #[test]
    fn test_reserve_then_commit() {
        let resolver = PathResolver::new("/projects/show");
        let (_category, _work, publish) = fixture();
        let reserved = publish.reserve(&session(), "lookdev pass");
        assert_eq!(publish.get_version(VersionSelector::InProgress).unwrap().number, 1);
        assert!(publish.get_version(VersionSelector::Latest).is_err());

        let target = publish.element_target(&resolver, reserved.number, "usd", Some("usda"));
        let version = publish
            .commit(
                &resolver,
                PublishRequest::new(session())
                    .reserved(reserved.number)
                    .with_element("usd", ElementOutput::Path(target)),
            )
            .unwrap();
        assert_eq!(version.number, 1);
        assert_eq!(
            version.elements.get_element("usd"),
            Some("Char/Hero/Model/hero_model/publish/v001/hero_model_v001_usd.usda")
        );
        assert!(publish.ledger().in_progress().is_none());

        // the reservation was consumed
        let err = publish
            .commit(&resolver, PublishRequest::new(session()).reserved(1))
            .unwrap_err();
        assert!(err.is_consistency());
    }

    #[test]
    fn test_live_version_and_snapshot() {
        let resolver = PathResolver::new("/projects/show");
        let (category, work, publish) = fixture();
        category.set("fps", 24);
        publish.commit(&resolver, PublishRequest::new(session())).unwrap();
        work.set("fps", 30);
        publish.commit(&resolver, PublishRequest::new(session())).unwrap();

        assert_eq!(publish.get_version(VersionSelector::Latest).unwrap().number, 2);
        publish.set_live(1).unwrap();
        let live = publish.get_version(VersionSelector::Latest).unwrap();
        assert_eq!(live.number, 1);
        assert_eq!(live.metadata.get_local("fps"), Some(MetaValue::Int(24)));

        let scope = publish.version_scope(2u64).unwrap().unwrap();
        assert_eq!(scope.lookup("fps"), Some(MetaValue::Int(30)));
    }

    #[test]
    fn test_promoted_pointer() {
        let resolver = PathResolver::new("/projects/show");
        let (_category, _work, publish) = fixture();
        for _ in 0..3 {
            publish.commit(&resolver, PublishRequest::new(session())).unwrap();
        }
        assert!(publish.promoted().is_none());

        publish.set_live(3).unwrap();
        publish.promote(1).unwrap();
        let promoted = publish
            .get_version(VersionSelector::from_publish_code(0).unwrap())
            .unwrap();
        assert_eq!(promoted.number, 1);
        assert_eq!(publish.live().unwrap().number, 3);
        assert_eq!(
            publish.to_record(),
            PublishRecord {
                live: Some(3),
                promoted: Some(1),
            }
        );
        assert!(publish.promote(8).unwrap_err().is_not_found());
    }
}
