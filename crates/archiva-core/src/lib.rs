//! Archiva Core - Core types for the Maven repository proxy
//!
//! This crate provides the foundational types used throughout Archiva:
//! - `ManagedRepository` / `RemoteRepository`: repository identities
//! - `ArtifactReference` and `RepositoryLayout`: coordinates and path mapping
//! - `ChecksummedFile`: checksum calculation, validation and repair
//! - `RepositoryStorage`: local asset storage with atomic moves
//! - `ManagedRepositoryContent`: a repository bound to storage and layout
//! - `RepositoryMetadata`: `maven-metadata.xml` reading and merging
//! - `ArchivaConfig`: the YAML configuration file

pub mod artifact;
pub mod checksum;
pub mod config;
pub mod content;
pub mod credentials;
pub mod error;
pub mod layout;
pub mod metadata;
pub mod repository;
pub mod storage;

pub use artifact::{ArtifactReference, base_version, compare_versions, is_snapshot};
pub use checksum::{ChecksumAlgorithm, ChecksummedFile};
pub use config::{ArchivaConfig, EngineSettings, ProxyConnectorConfig};
pub use content::ManagedRepositoryContent;
pub use credentials::{Credentials, ResolvedCredentials};
pub use error::{CoreError, Result};
pub use layout::{DefaultLayout, RepositoryLayout, layout_for};
pub use metadata::RepositoryMetadata;
pub use repository::{
    IndexingConfig, ManagedRepository, NetworkProxy, RemoteIndexConfig, RemoteRepository,
    RepositoryGroup,
};
pub use storage::{FilesystemStorage, PathLocks, RepositoryStorage, StorageAsset};
