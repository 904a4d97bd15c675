//! Lineage tracks numbered versions of work files, their publishes and the
//! named elements a publish produces, with layered metadata and paths that
//! survive moving a project between machines.
//!
//! This crate holds the in-memory core and performs no I/O. Discovery from
//! disk and the project hierarchy live in `lineage-registry`.

pub mod element;
pub mod error;
pub mod ledger;
pub mod metadata;
pub mod naming;
pub mod path;
pub mod version;

// Re-export core types
pub use element::ElementIndex;
pub use error::{LineageError, Result};
pub use ledger::{
    DiskScan, LedgerEntry, LedgerKind, LedgerMark, RescanSummary, VersionLedger, VersionRecord,
    VersionSelector,
};
pub use metadata::{MetaValue, Metadata, MetadataLookup, MetadataNode};
pub use naming::{NamingConvention, ParsedName};
pub use path::{DEFAULT_ROOT_TOKEN, PathResolver};
pub use version::{FrameRange, PublishVersion, WorkVersion};

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
