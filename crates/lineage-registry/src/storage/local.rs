//! Project tree on the local filesystem

use super::{DirEntry, EntryKind, ProjectFileSystem, StorageError};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

/// [`ProjectFileSystem`] backed by `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProjectFileSystem for LocalFileSystem {
    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError> {
        let mut reader = fs::read_dir(path)
            .await
            .map_err(|err| StorageError::from_io(path, err))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|err| StorageError::from_io(path, err))?
        {
            let kind = match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => EntryKind::Dir,
                Ok(file_type) if file_type.is_file() => EntryKind::File,
                _ => EntryKind::Other,
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                kind,
            });
        }
        Ok(entries)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        fs::read(path)
            .await
            .map_err(|err| StorageError::from_io(path, err))
    }

    async fn write(&self, path: &Path, data: Vec<u8>) -> Result<(), StorageError> {
        fs::write(path, data)
            .await
            .map_err(|err| StorageError::from_io(path, err))
    }

    async fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        fs::try_exists(path)
            .await
            .map_err(|err| StorageError::from_io(path, err))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        fs::create_dir_all(path)
            .await
            .map_err(|err| StorageError::from_io(path, err))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        fs::rename(from, to)
            .await
            .map_err(|err| StorageError::from_io(from, err))
    }

    async fn check_readable(&self, path: &Path) -> Result<(), StorageError> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|err| StorageError::from_io(path, err))?;
        if metadata.is_dir() {
            fs::read_dir(path)
                .await
                .map_err(|err| StorageError::from_io(path, err))?;
        } else {
            fs::File::open(path)
                .await
                .map_err(|err| StorageError::from_io(path, err))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_round_trip() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let nested = dir.path().join("db/Char");
        fs.create_dir_all(&nested).await.unwrap();

        let file = nested.join("Hero.task.json");
        fs.write(&file, b"{}".to_vec()).await.unwrap();
        assert_eq!(fs.read(&file).await.unwrap(), b"{}".to_vec());
        assert!(fs.exists(&file).await.unwrap());
        fs.check_readable(&file).await.unwrap();

        let entries = fs.list_dir(&nested).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Hero.task.json");
        assert!(entries[0].is_file());

        let moved = dir.path().join("Hero.task.json");
        fs.rename(&file, &moved).await.unwrap();
        assert!(!fs.exists(&file).await.unwrap());
        assert_eq!(fs.read(&moved).await.unwrap(), b"{}".to_vec());
    }

    #[tokio::test]
    async fn test_local_missing_dir_is_not_found() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let err = fs.list_dir(&dir.path().join("nope")).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!fs.exists(&dir.path().join("nope")).await.unwrap());
    }
}
