//! Download of indexes published by remote repositories

use std::path::PathBuf;
use std::sync::Arc;

use archiva_core::RemoteRepository;
use archiva_proxy::{ConnectorRegistry, TransferRequest, TransferStatus, Transport};

use crate::context::IndexingContext;
use crate::engine::IndexEngine;
use crate::error::{IndexError, Result};
use crate::packer::{IndexPacker, IndexProperties, PACKED_INDEX_FILE};

/// Result of one remote index download
#[derive(Debug)]
pub enum RemoteIndexUpdate {
    /// A newer index was unpacked and its context reopened
    Updated {
        properties: IndexProperties,
        context: Arc<IndexingContext>,
    },
    /// The local copy is current
    NotModified,
    /// The remote does not publish an index at the configured location
    NotAvailable,
}

/// Fetches remote indexes into local indexing contexts
pub struct RemoteIndexDownloader {
    transport: Arc<dyn Transport>,
    registry: Arc<ConnectorRegistry>,
    engine: Arc<IndexEngine>,
    packer: IndexPacker,
    work_dir: PathBuf,
}

impl std::fmt::Debug for RemoteIndexDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteIndexDownloader")
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

impl RemoteIndexDownloader {
    /// Network proxies are looked up in `registry`; indexes without an
    /// explicit local directory go below `work_dir`
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<ConnectorRegistry>,
        engine: Arc<IndexEngine>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            registry,
            engine,
            packer: IndexPacker::new(),
            work_dir: work_dir.into(),
        }
    }

    /// Local directory receiving the index of `remote`
    pub fn local_directory(&self, remote: &RemoteRepository) -> PathBuf {
        remote
            .remote_index
            .as_ref()
            .and_then(|index| index.local_dir.clone())
            .unwrap_or_else(|| self.work_dir.join("remote-indexes").join(&remote.id))
    }

    /// Download the index of `remote` if it is newer than the local copy
    pub async fn download(&self, remote: &RemoteRepository) -> Result<RemoteIndexUpdate> {
        let index = remote
            .remote_index
            .as_ref()
            .ok_or_else(|| IndexError::RemoteIndexNotConfigured {
                id: remote.id.clone(),
            })?;

        // The index download has its own timeout
        let mut descriptor = remote.clone();
        descriptor.timeout = index.timeout;

        let network_proxy = index.network_proxy.as_deref().and_then(|id| {
            let proxy = self.registry.network_proxy(id);
            if proxy.is_none() {
                tracing::warn!("Unknown network proxy '{}' for index of {}", id, remote.id);
            }
            proxy
        });

        let mut request = TransferRequest::new(&descriptor, &index.url)
            .with_network_proxy(network_proxy.as_ref());
        if index.url.contains("://") {
            request.url = index.url.clone();
        }

        let directory = self.local_directory(remote);
        std::fs::create_dir_all(&directory)?;
        let archive = directory.join(PACKED_INDEX_FILE);
        let staging = tempfile::Builder::new()
            .prefix(".archiva-index-download-")
            .tempdir_in(&directory)?;
        let staged = staging.path().join(PACKED_INDEX_FILE);

        let since = archive.metadata().and_then(|m| m.modified()).ok();

        tracing::debug!("Downloading remote index of {} from {}", remote.id, request.url);
        let status = match since {
            Some(since) => self.transport.get_if_newer(&request, &staged, since).await,
            None => self.transport.get(&request, &staged).await,
        }
        .map_err(|source| IndexError::Download {
            url: request.url.clone(),
            source,
        })?;

        match status {
            TransferStatus::NotFound => {
                tracing::warn!("Remote index of {} not found at {}", remote.id, request.url);
                Ok(RemoteIndexUpdate::NotAvailable)
            }
            TransferStatus::NotModified => {
                tracing::debug!("Remote index of {} is up to date", remote.id);
                Ok(RemoteIndexUpdate::NotModified)
            }
            TransferStatus::Downloaded => {
                // The current context stays registered until the archive has unpacked
                let properties = self.packer.unpack(&staged, &directory)?;
                std::fs::rename(&staged, &archive)?;
                let context = self
                    .engine
                    .replace_indexing_context(&remote.id, &remote.id, &directory)?;

                tracing::info!(
                    "Updated remote index of {} ({} artifacts)",
                    remote.id,
                    properties.artifact_count
                );
                Ok(RemoteIndexUpdate::Updated {
                    properties,
                    context,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ArtifactRecord;
    use archiva_core::{ArtifactReference, RemoteIndexConfig};
    use archiva_proxy::HttpTransport;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn published_index(dir: &TempDir) -> Vec<u8> {
        let context =
            IndexingContext::open("central", "central", dir.path().join("published")).unwrap();
        let reference: ArtifactReference = "org.example:app:1.0:jar".parse().unwrap();
        context
            .add(&ArtifactRecord::new(&reference, "central"))
            .unwrap();
        let packed = IndexPacker::new()
            .pack(&context, &dir.path().join("published"))
            .unwrap();
        std::fs::read(packed.archive).unwrap()
    }

    fn downloader(dir: &TempDir) -> RemoteIndexDownloader {
        RemoteIndexDownloader::new(
            Arc::new(HttpTransport::new()),
            Arc::new(ConnectorRegistry::new()),
            Arc::new(IndexEngine::new()),
            dir.path().join("work"),
        )
    }

    fn remote(server: &MockServer) -> RemoteRepository {
        let mut remote = RemoteRepository::new("central", format!("{}/maven2", server.uri()));
        remote.remote_index = Some(RemoteIndexConfig::default());
        remote
    }

    #[tokio::test]
    async fn test_download_unpacks_index() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maven2/.index/archiva-index.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(published_index(&dir)))
            .mount(&server)
            .await;

        let downloader = downloader(&dir);
        let update = downloader.download(&remote(&server)).await.unwrap();

        let RemoteIndexUpdate::Updated { properties, context } = update else {
            panic!("expected an update, got {:?}", update);
        };
        assert_eq!(properties.artifact_count, 1);
        assert_eq!(context.search("app").unwrap().len(), 1);
        assert!(downloader.engine.indexing_context("central").is_some());
        assert!(
            downloader
                .local_directory(&remote(&server))
                .join(PACKED_INDEX_FILE)
                .is_file()
        );
    }

    #[tokio::test]
    async fn test_download_only_if_newer() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maven2/.index/archiva-index.tar.gz"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(published_index(&dir))
                    .insert_header("Last-Modified", "Mon, 01 Jan 2024 00:00:00 GMT"),
            )
            .mount(&server)
            .await;

        let downloader = downloader(&dir);
        let remote = remote(&server);
        assert!(matches!(
            downloader.download(&remote).await.unwrap(),
            RemoteIndexUpdate::Updated { .. }
        ));
        assert!(matches!(
            downloader.download(&remote).await.unwrap(),
            RemoteIndexUpdate::NotModified
        ));
    }

    #[tokio::test]
    async fn test_corrupt_archive_keeps_current_index() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maven2/.index/archiva-index.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(published_index(&dir)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/maven2/.index/archiva-index.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not a gzip archive".to_vec()))
            .mount(&server)
            .await;

        let downloader = downloader(&dir);
        let remote = remote(&server);
        downloader.download(&remote).await.unwrap();
        // Without a local archive the next download is unconditional
        std::fs::remove_file(downloader.local_directory(&remote).join(PACKED_INDEX_FILE)).unwrap();

        assert!(downloader.download(&remote).await.is_err());

        let context = downloader.engine.indexing_context("central").unwrap();
        assert_eq!(context.search("app").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_index() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;

        let update = downloader(&dir).download(&remote(&server)).await.unwrap();
        assert!(matches!(update, RemoteIndexUpdate::NotAvailable));
    }

    #[tokio::test]
    async fn test_remote_without_index() {
        let dir = TempDir::new().unwrap();
        let remote = RemoteRepository::new("central", "https://repo.example.com");
        let err = downloader(&dir).download(&remote).await.unwrap_err();
        assert!(matches!(err, IndexError::RemoteIndexNotConfigured { .. }));
    }
}
