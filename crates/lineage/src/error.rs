//! Error types for the lineage core
//!
//! Errors fall in two families. The not-found family describes routine
//! "nothing here yet" states an interactive caller is expected to handle.
//! The consistency family describes caller mistakes; an operation failing
//! with one of them leaves the ledger exactly as it was.

use thiserror::Error;

/// Main error type for the lineage core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineageError {
    /// A literal version number or sentinel did not resolve
    #[error("Version {selector} not found in {owner}")]
    VersionNotFound { owner: String, selector: String },

    /// The element type is not part of the publish version
    #[error("Element '{element}' not found in {owner}")]
    ElementNotFound { owner: String, element: String },

    /// A caller-numbered record does not extend the ledger
    #[error("Version {attempted} of {owner} is not above the current maximum {current}")]
    NonMonotonicVersion {
        owner: String,
        attempted: u64,
        current: u64,
    },

    /// Two versions of one ledger would share a file path
    #[error("Path {path} is already registered as version {existing} of {owner}")]
    DuplicateVersionPath {
        owner: String,
        path: String,
        existing: u64,
    },

    /// An edit tried to change the number or path of a stored version
    #[error("Version {number} of {owner} cannot change its number or path")]
    ImmutableVersion { owner: String, number: u64 },

    /// A portable path token has no substitution
    #[error("Unresolved path token '{token}' in {path}")]
    UnresolvedPath { path: String, token: String },

    /// A version selector string or code could not be parsed
    #[error("Invalid version selector: {0}")]
    InvalidSelector(String),
}

impl LineageError {
    /// Whether this is an expected "nothing here yet" condition
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LineageError::VersionNotFound { .. } | LineageError::ElementNotFound { .. }
        )
    }

    /// Whether this indicates a usage error by the caller
    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            LineageError::NonMonotonicVersion { .. }
                | LineageError::DuplicateVersionPath { .. }
                | LineageError::ImmutableVersion { .. }
        )
    }
}

/// Result type for lineage core operations
pub type Result<T> = std::result::Result<T, LineageError>;
