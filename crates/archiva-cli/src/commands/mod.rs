//! CLI commands

pub mod connectors;
pub mod daemon;
pub mod fetch;
pub mod merge_index;
pub mod metadata;
pub mod remote_index;
pub mod scan;
pub mod search;

use std::path::Path;
use std::sync::Arc;

use archiva_core::{ArchivaConfig, ManagedRepositoryContent};
use archiva_indexer::packer::read_properties;
use archiva_indexer::{IndexEngine, RemoteIndexDownloader};
use archiva_proxy::{ConnectorRegistry, FailureCache, HttpTransport, RepositoryProxyHandler};

use crate::error::Result;

/// Load the configuration from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> Result<ArchivaConfig> {
    let config = match path {
        Some(path) => ArchivaConfig::load_from(path)?,
        None => ArchivaConfig::load()?,
    };
    for problem in config.validate() {
        tracing::warn!("{}", problem);
    }
    Ok(config)
}

pub fn open_repository(config: &ArchivaConfig, id: &str) -> Result<ManagedRepositoryContent> {
    let repository = config.managed_repository(id)?.clone();
    Ok(ManagedRepositoryContent::open(repository)?)
}

/// Proxy handler wired from the configuration
pub fn proxy_handler(config: &ArchivaConfig) -> RepositoryProxyHandler {
    RepositoryProxyHandler::new(
        Arc::new(ConnectorRegistry::from_config(config)),
        Arc::new(FailureCache::new(config.settings.failure_cache_ttl)),
        Arc::new(HttpTransport::new()),
    )
    .with_work_dir(config.settings.work_directory())
}

/// Remote index downloader sharing `engine`
pub fn remote_index_downloader(
    config: &ArchivaConfig,
    engine: &Arc<IndexEngine>,
) -> RemoteIndexDownloader {
    RemoteIndexDownloader::new(
        Arc::new(HttpTransport::new()),
        Arc::new(ConnectorRegistry::from_config(config)),
        Arc::clone(engine),
        config.settings.work_directory(),
    )
}

/// Open the indexing contexts already present on disk.
///
/// Every managed repository gets a context; remote repositories only when a
/// downloaded index exists.
pub fn open_indexing_contexts(
    config: &ArchivaConfig,
    engine: &IndexEngine,
    downloader: &RemoteIndexDownloader,
) -> Result<usize> {
    let mut opened = 0;
    for repository in &config.managed_repositories {
        engine.get_or_add_indexing_context(
            &repository.id,
            &repository.id,
            repository.index_directory(),
        )?;
        opened += 1;
    }
    for remote in config
        .remote_repositories
        .iter()
        .filter(|r| r.remote_index.is_some())
    {
        let directory = downloader.local_directory(remote);
        if read_properties(&directory)?.is_some() {
            engine.get_or_add_indexing_context(&remote.id, &remote.id, directory)?;
            opened += 1;
        }
    }
    tracing::debug!("Opened {} indexing contexts", opened);
    Ok(opened)
}
