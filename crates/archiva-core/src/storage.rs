//! Repository storage
//!
//! Storage is addressed with repository-relative paths. All paths are
//! resolved below the storage root; absolute paths and `..` components are
//! rejected so a request can never reach outside the repository.
//!
//! Local copy and move operations take a read lock on the source and a write
//! lock on the destination, so a reader never observes a half-written file
//! and two writers of the same destination are serialized.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::{CoreError, Result};

/// Trait for repository content backends
pub trait RepositoryStorage: Send + Sync {
    /// Root location, used for diagnostics
    fn location(&self) -> &Path;

    /// Handle to the asset at a repository-relative path
    fn asset(&self, path: &str) -> Result<StorageAsset>;

    /// Read an asset fully
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Write an asset, replacing any previous content
    fn write(&self, path: &str, data: &[u8]) -> Result<StorageAsset>;

    /// Move a local file (e.g. a finished download) into the storage,
    /// replacing the destination atomically where the platform allows it
    fn move_in(&self, source: &Path, path: &str) -> Result<StorageAsset>;

    /// Copy one asset to another path inside the storage
    fn copy(&self, from: &str, to: &str) -> Result<StorageAsset>;

    /// Move one asset to another path inside the storage
    fn rename(&self, from: &str, to: &str) -> Result<StorageAsset>;

    /// Remove an asset; returns whether it existed
    fn remove(&self, path: &str) -> Result<bool>;

    /// List the files below a directory, as repository-relative paths
    fn list(&self, path: &str, recursive: bool) -> Result<Vec<String>>;
}

/// A file inside a repository storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAsset {
    /// Repository-relative path, using `/` separators
    path: String,
    /// Location on the local filesystem
    file_path: PathBuf,
}

impl StorageAsset {
    pub fn new(path: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_path: file_path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn exists(&self) -> bool {
        self.file_path.is_file()
    }

    pub fn size(&self) -> Option<u64> {
        std::fs::metadata(&self.file_path).ok().map(|m| m.len())
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.file_path)
            .and_then(|m| m.modified())
            .ok()
    }

    /// File name component of the path
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Keyed reader/writer locks for paths
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, path: &Path) -> Result<Arc<RwLock<()>>> {
        let mut locks = self.locks.lock().map_err(|_| CoreError::LockPoisoned {
            resource: "path locks".to_string(),
        })?;
        // Drop entries nobody holds any more
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone())
    }

    /// Run `f` holding a read lock on `source` and a write lock on `target`
    pub fn with_transfer_locks<T>(
        &self,
        source: &Path,
        target: &Path,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let poisoned = || CoreError::LockPoisoned {
            resource: target.display().to_string(),
        };

        if source == target {
            let lock = self.lock_for(target)?;
            let _guard = lock.write().map_err(|_| poisoned())?;
            return f();
        }

        let source_lock = self.lock_for(source)?;
        let target_lock = self.lock_for(target)?;

        // Acquire in path order so two opposite transfers cannot deadlock
        if source < target {
            let _read = source_lock.read().map_err(|_| poisoned())?;
            let _write = target_lock.write().map_err(|_| poisoned())?;
            f()
        } else {
            let _write = target_lock.write().map_err(|_| poisoned())?;
            let _read = source_lock.read().map_err(|_| poisoned())?;
            f()
        }
    }

    /// Run `f` holding a write lock on `target`
    pub fn with_write_lock<T>(&self, target: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.lock_for(target)?;
        let _guard = lock.write().map_err(|_| CoreError::LockPoisoned {
            resource: target.display().to_string(),
        })?;
        f()
    }
}

/// Storage backed by a local directory
#[derive(Debug)]
pub struct FilesystemStorage {
    root: PathBuf,
    locks: PathLocks,
}

impl FilesystemStorage {
    /// Create a storage rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: PathLocks::new(),
        })
    }

    /// Resolve a repository-relative path below the root
    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let trimmed = relative.trim_start_matches('/');
        let requested = Path::new(trimmed);

        for component in requested.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(CoreError::PathTraversal {
                        path: relative.to_string(),
                    });
                }
            }
        }

        Ok(self.root.join(requested))
    }

    fn normalize(relative: &str) -> String {
        relative.trim_start_matches('/').to_string()
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Rename, falling back to copy + rename when crossing filesystems
fn replace_file(source: &Path, target: &Path) -> Result<()> {
    if std::fs::rename(source, target).is_ok() {
        return Ok(());
    }

    // Stage next to the target so the final rename stays on one filesystem
    let mut staging = target.as_os_str().to_os_string();
    staging.push(".part");
    let staging = PathBuf::from(staging);
    std::fs::copy(source, &staging)?;
    if let Err(e) = std::fs::rename(&staging, target) {
        let _ = std::fs::remove_file(&staging);
        return Err(e.into());
    }
    std::fs::remove_file(source)?;
    Ok(())
}

impl RepositoryStorage for FilesystemStorage {
    fn location(&self) -> &Path {
        &self.root
    }

    fn asset(&self, path: &str) -> Result<StorageAsset> {
        let file_path = self.resolve(path)?;
        Ok(StorageAsset::new(Self::normalize(path), file_path))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let file_path = self.resolve(path)?;
        Ok(std::fs::read(file_path)?)
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<StorageAsset> {
        let file_path = self.resolve(path)?;
        Self::ensure_parent(&file_path)?;
        self.locks.with_write_lock(&file_path, || {
            std::fs::write(&file_path, data)?;
            Ok(())
        })?;
        Ok(StorageAsset::new(Self::normalize(path), file_path))
    }

    fn move_in(&self, source: &Path, path: &str) -> Result<StorageAsset> {
        let target = self.resolve(path)?;
        Self::ensure_parent(&target)?;
        self.locks
            .with_transfer_locks(source, &target, || replace_file(source, &target))?;
        Ok(StorageAsset::new(Self::normalize(path), target))
    }

    fn copy(&self, from: &str, to: &str) -> Result<StorageAsset> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        Self::ensure_parent(&target)?;
        self.locks.with_transfer_locks(&source, &target, || {
            std::fs::copy(&source, &target)?;
            Ok(())
        })?;
        Ok(StorageAsset::new(Self::normalize(to), target))
    }

    fn rename(&self, from: &str, to: &str) -> Result<StorageAsset> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        Self::ensure_parent(&target)?;
        self.locks
            .with_transfer_locks(&source, &target, || replace_file(&source, &target))?;
        Ok(StorageAsset::new(Self::normalize(to), target))
    }

    fn remove(&self, path: &str) -> Result<bool> {
        let file_path = self.resolve(path)?;
        self.locks.with_write_lock(&file_path, || {
            if file_path.is_dir() {
                std::fs::remove_dir_all(&file_path)?;
                Ok(true)
            } else if file_path.exists() {
                std::fs::remove_file(&file_path)?;
                Ok(true)
            } else {
                Ok(false)
            }
        })
    }

    fn list(&self, path: &str, recursive: bool) -> Result<Vec<String>> {
        let dir = self.resolve(path)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut entries: Vec<String> = WalkDir::new(&dir)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect();

        // Sort for deterministic output
        entries.sort();
        Ok(entries)
    }
}
