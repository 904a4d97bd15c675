//! Filesystem abstraction used by the scanner and record persistence

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

pub mod local;
pub mod memory;

pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub(crate) fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.display().to_string();
        match err.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(path),
            io::ErrorKind::PermissionDenied => StorageError::AccessDenied(path),
            _ => StorageError::Backend(format!("{path}: {err}")),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Other,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Access to the project tree on disk
///
/// All paths are absolute.
#[async_trait]
pub trait ProjectFileSystem: Send + Sync {
    /// Entries of a directory, in no particular order
    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError>;

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Write a file, replacing any previous content
    async fn write(&self, path: &Path, data: Vec<u8>) -> Result<(), StorageError>;

    async fn exists(&self, path: &Path) -> Result<bool, StorageError>;

    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError>;

    /// Move a file or directory; the parent of `to` must exist
    async fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError>;

    /// Fail unless the entry at `path` can be opened for reading
    async fn check_readable(&self, path: &Path) -> Result<(), StorageError>;
}
