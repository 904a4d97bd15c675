//! Error types for the lineage registry

use crate::storage::StorageError;
use lineage::LineageError;
use thiserror::Error;

/// Registry-specific errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Work not found: {0}")]
    WorkNotFound(String),

    #[error("Subproject not found: {0}")]
    SubprojectNotFound(String),

    /// A sibling with this name already exists
    #[error("Duplicate name '{name}' under {parent}")]
    DuplicateName { parent: String, name: String },

    /// The id is already used somewhere in the project
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// A scan was abandoned through its cancellation token
    #[error("Scan cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Lineage(#[from] LineageError),
}

impl RegistryError {
    /// Whether this is an expected "nothing here yet" condition
    pub fn is_not_found(&self) -> bool {
        match self {
            RegistryError::TaskNotFound(_)
            | RegistryError::WorkNotFound(_)
            | RegistryError::SubprojectNotFound(_) => true,
            RegistryError::Lineage(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// Whether this indicates a usage error by the caller
    pub fn is_consistency(&self) -> bool {
        match self {
            RegistryError::DuplicateName { .. } | RegistryError::DuplicateId(_) => true,
            RegistryError::Lineage(err) => err.is_consistency(),
            _ => false,
        }
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
