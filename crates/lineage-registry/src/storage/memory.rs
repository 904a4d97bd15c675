//! In-memory project tree for testing
//!
//! Paths can be marked as denied to simulate entries the current user
//! cannot read.

use super::{DirEntry, EntryKind, ProjectFileSystem, StorageError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    denied: BTreeSet<PathBuf>,
}

impl Tree {
    fn add_dir(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }

    fn is_denied(&self, path: &Path) -> bool {
        path.ancestors().any(|ancestor| self.denied.contains(ancestor))
    }

    fn check(&self, path: &Path) -> Result<(), StorageError> {
        if self.is_denied(path) {
            return Err(StorageError::AccessDenied(path.display().to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    tree: Mutex<Tree>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tree>, StorageError> {
        self.tree
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))
    }

    /// Add a file and its parent directories
    pub fn insert_file(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) {
        if let Ok(mut tree) = self.lock() {
            let path = path.as_ref();
            if let Some(parent) = path.parent() {
                tree.add_dir(parent);
            }
            tree.files.insert(path.to_path_buf(), data.into());
        }
    }

    pub fn insert_dir(&self, path: impl AsRef<Path>) {
        if let Ok(mut tree) = self.lock() {
            tree.add_dir(path.as_ref());
        }
    }

    /// Remove a file or a directory with everything beneath it
    pub fn remove(&self, path: impl AsRef<Path>) {
        if let Ok(mut tree) = self.lock() {
            let path = path.as_ref();
            tree.files.retain(|file, _| !file.starts_with(path));
            tree.dirs.retain(|dir| !dir.starts_with(path));
        }
    }

    /// Make the path and everything beneath it unreadable
    pub fn deny(&self, path: impl AsRef<Path>) {
        if let Ok(mut tree) = self.lock() {
            tree.denied.insert(path.as_ref().to_path_buf());
        }
    }

    pub fn allow(&self, path: impl AsRef<Path>) {
        if let Ok(mut tree) = self.lock() {
            tree.denied.remove(path.as_ref());
        }
    }

    /// Paths of all stored files (useful for testing)
    pub fn files(&self) -> Vec<PathBuf> {
        self.lock()
            .map(|tree| tree.files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProjectFileSystem for MemoryFileSystem {
    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError> {
        let tree = self.lock()?;
        tree.check(path)?;
        if !tree.dirs.contains(path) {
            return Err(StorageError::NotFound(path.display().to_string()));
        }

        let child = |candidate: &Path| candidate.parent() == Some(path);
        let name = |candidate: &Path| {
            candidate
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        let mut entries: Vec<DirEntry> = tree
            .dirs
            .iter()
            .filter(|dir| child(dir.as_path()))
            .map(|dir| DirEntry {
                name: name(dir.as_path()),
                path: dir.clone(),
                kind: EntryKind::Dir,
            })
            .collect();
        entries.extend(tree.files.keys().filter(|file| child(file.as_path())).map(|file| DirEntry {
            name: name(file.as_path()),
            path: file.clone(),
            kind: EntryKind::File,
        }));
        Ok(entries)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        let tree = self.lock()?;
        tree.check(path)?;
        tree.files
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.display().to_string()))
    }

    async fn write(&self, path: &Path, data: Vec<u8>) -> Result<(), StorageError> {
        let mut tree = self.lock()?;
        tree.check(path)?;
        if let Some(parent) = path.parent() {
            if !tree.dirs.contains(parent) {
                return Err(StorageError::NotFound(parent.display().to_string()));
            }
        }
        tree.files.insert(path.to_path_buf(), data);
        Ok(())
    }

    async fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        let tree = self.lock()?;
        Ok(tree.files.contains_key(path) || tree.dirs.contains(path))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        let mut tree = self.lock()?;
        tree.check(path)?;
        tree.add_dir(path);
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        let mut tree = self.lock()?;
        tree.check(from)?;
        tree.check(to)?;
        if let Some(parent) = to.parent() {
            if !tree.dirs.contains(parent) {
                return Err(StorageError::NotFound(parent.display().to_string()));
            }
        }

        let moved = |path: &Path| -> Option<PathBuf> {
            path.strip_prefix(from).ok().map(|rest| {
                if rest.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(rest)
                }
            })
        };
        let files: Vec<PathBuf> = tree
            .files
            .keys()
            .filter(|file| file.starts_with(from))
            .cloned()
            .collect();
        let dirs: Vec<PathBuf> = tree
            .dirs
            .iter()
            .filter(|dir| dir.starts_with(from))
            .cloned()
            .collect();
        if files.is_empty() && dirs.is_empty() {
            return Err(StorageError::NotFound(from.display().to_string()));
        }

        for file in files {
            if let (Some(data), Some(target)) = (tree.files.remove(&file), moved(&file)) {
                tree.files.insert(target, data);
            }
        }
        for dir in dirs {
            tree.dirs.remove(&dir);
            if let Some(target) = moved(&dir) {
                tree.dirs.insert(target);
            }
        }
        Ok(())
    }

    async fn check_readable(&self, path: &Path) -> Result<(), StorageError> {
        let tree = self.lock()?;
        tree.check(path)?;
        if tree.files.contains_key(path) || tree.dirs.contains(path) {
            Ok(())
        } else {
            Err(StorageError::NotFound(path.display().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_listing() {
        let fs = MemoryFileSystem::new();
        fs.insert_file("/show/Char/hero/hero_v001.ma", "scene");
        fs.insert_dir("/show/Char/hero/publish");

        let mut names: Vec<String> = fs
            .list_dir(Path::new("/show/Char/hero"))
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["hero_v001.ma".to_string(), "publish".to_string()]);
        assert!(fs.exists(Path::new("/show/Char")).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_denied_paths() {
        let fs = MemoryFileSystem::new();
        fs.insert_file("/show/a/b.ma", "scene");
        fs.deny("/show/a");

        let err = fs.read(Path::new("/show/a/b.ma")).await.unwrap_err();
        assert!(matches!(err, StorageError::AccessDenied(_)));
        assert!(fs.list_dir(Path::new("/show/a")).await.is_err());
        assert_eq!(fs.list_dir(Path::new("/show")).await.unwrap().len(), 1);

        fs.allow("/show/a");
        assert!(fs.check_readable(Path::new("/show/a/b.ma")).await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_write_needs_parent() {
        let fs = MemoryFileSystem::new();
        let err = fs
            .write(Path::new("/db/Char/Hero.task.json"), b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        fs.create_dir_all(Path::new("/db/Char")).await.unwrap();
        fs.write(Path::new("/db/Char/Hero.task.json"), b"{}".to_vec())
            .await
            .unwrap();
        assert_eq!(fs.files().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_rename() {
        let fs = MemoryFileSystem::new();
        fs.insert_file("/db/Char/Hero.task.json", "{}");
        fs.insert_dir("/trash/Char");

        let err = fs
            .rename(Path::new("/db/Char/Villain.task.json"), Path::new("/trash/Char/Villain.task.json"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        fs.rename(Path::new("/db/Char/Hero.task.json"), Path::new("/trash/Char/Hero.task.json"))
            .await
            .unwrap();
        assert_eq!(fs.files(), vec![PathBuf::from("/trash/Char/Hero.task.json")]);
        assert!(fs.list_dir(Path::new("/db/Char")).await.unwrap().is_empty());
    }
}
