//! Managed repository content: a repository bound to its storage and layout

use std::sync::Arc;

use crate::artifact::ArtifactReference;
use crate::error::Result;
use crate::layout::{RepositoryLayout, layout_for};
use crate::repository::ManagedRepository;
use crate::storage::{FilesystemStorage, RepositoryStorage, StorageAsset};

/// A managed repository ready for content access
#[derive(Clone)]
pub struct ManagedRepositoryContent {
    repository: ManagedRepository,
    storage: Arc<dyn RepositoryStorage>,
    layout: Arc<dyn RepositoryLayout>,
}

impl std::fmt::Debug for ManagedRepositoryContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedRepositoryContent")
            .field("id", &self.repository.id)
            .field("location", &self.storage.location())
            .field("layout", &self.layout.id())
            .finish()
    }
}

impl ManagedRepositoryContent {
    /// Open the repository on the local filesystem
    pub fn open(repository: ManagedRepository) -> Result<Self> {
        let layout = layout_for(&repository.layout)?;
        let storage = Arc::new(FilesystemStorage::new(&repository.location)?);
        Ok(Self {
            repository,
            storage,
            layout,
        })
    }

    /// Bind a repository to an explicit storage backend
    pub fn with_storage(
        repository: ManagedRepository,
        storage: Arc<dyn RepositoryStorage>,
    ) -> Result<Self> {
        let layout = layout_for(&repository.layout)?;
        Ok(Self {
            repository,
            storage,
            layout,
        })
    }

    pub fn id(&self) -> &str {
        &self.repository.id
    }

    pub fn repository(&self) -> &ManagedRepository {
        &self.repository
    }

    pub fn storage(&self) -> &dyn RepositoryStorage {
        self.storage.as_ref()
    }

    pub fn layout(&self) -> &dyn RepositoryLayout {
        self.layout.as_ref()
    }

    /// Repository-relative path of an artifact
    pub fn to_path(&self, artifact: &ArtifactReference) -> String {
        self.layout.to_path(artifact)
    }

    /// Local asset of an artifact (which may not exist yet)
    pub fn artifact_asset(&self, artifact: &ArtifactReference) -> Result<StorageAsset> {
        self.storage.asset(&self.to_path(artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let content =
            ManagedRepositoryContent::open(ManagedRepository::new("internal", dir.path())).unwrap();

        let artifact = ArtifactReference::new("org.example", "app", "1.0", "jar");
        let asset = content.artifact_asset(&artifact).unwrap();
        assert_eq!(asset.path(), "org/example/app/1.0/app-1.0.jar");
        assert!(!asset.exists());
        assert_eq!(content.id(), "internal");
    }

    #[test]
    fn test_unknown_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut repository = ManagedRepository::new("legacy", dir.path());
        repository.layout = "legacy".to_string();
        assert!(ManagedRepositoryContent::open(repository).is_err());
    }
}
