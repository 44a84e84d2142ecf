//! The proxy fetch pipeline
//!
//! A request for content of a managed repository walks the repository's proxy
//! connectors in order. Each connector is gated by its path filter and its
//! pre-download policies, then asked for the resource; downloads land in a
//! staging directory, get their checksum siblings, pass the checksum policy
//! and are finally moved into the managed repository.
//!
//! Artifacts and plain paths stop at the first connector that delivers.
//! Metadata is fetched from every connector, each copy kept as
//! `maven-metadata-<remote>.xml`, and the copies are merged into
//! `maven-metadata.xml`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use archiva_core::checksum::{ChecksumAlgorithm, ChecksummedFile, checksum_path_for};
use archiva_core::layout::{METADATA_FILENAME, is_checksum};
use archiva_core::{ArtifactReference, ManagedRepositoryContent, RepositoryMetadata, StorageAsset};
use tokio::sync::OwnedMutexGuard;

use crate::connector::{ConnectorRegistry, ProxyConnector};
use crate::error::{ProxyError, RemoteFailure, Result};
use crate::failure_cache::FailureCache;
use crate::policy::{
    CacheFailuresOption, ErrorDecision, NotModifiedDecision, PolicyId, PolicyViolation,
    apply_cache_failures_policy, apply_checksum_policy, apply_update_policy, decide_on_error,
    decide_on_not_modified,
};
use crate::transport::{TransferRequest, TransferStatus, Transport};

/// Result of a metadata fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyFetchResult {
    /// The local file after the fetch, if there is one
    pub asset: Option<StorageAsset>,
    /// Whether any local content changed
    pub modified: bool,
}

/// What one connector did for one request
#[derive(Debug)]
enum ConnectorOutcome {
    Fetched(StorageAsset),
    NotFound,
    NotModified,
    /// A pre-download policy refused the attempt
    Skipped(PolicyViolation),
    /// Transport error or post-download policy violation
    Failed(ProxyError),
}

/// Serializes fetches of the same destination path
#[derive(Debug, Default)]
struct FetchLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FetchLocks {
    async fn acquire(&self, repository: &str, path: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(
                locks
                    .entry(format!("{}:{}", repository, path))
                    .or_default(),
            )
        };
        lock.lock_owned().await
    }
}

/// Fetches content of managed repositories through their proxy connectors
pub struct RepositoryProxyHandler {
    registry: Arc<ConnectorRegistry>,
    failures: Arc<FailureCache>,
    transport: Arc<dyn Transport>,
    fetch_locks: FetchLocks,
    work_dir: Option<PathBuf>,
}

impl std::fmt::Debug for RepositoryProxyHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryProxyHandler")
            .field("registry", &self.registry)
            .field("failures", &self.failures.len())
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

impl RepositoryProxyHandler {
    pub fn new(
        registry: Arc<ConnectorRegistry>,
        failures: Arc<FailureCache>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            registry,
            failures,
            transport,
            fetch_locks: FetchLocks::default(),
            work_dir: None,
        }
    }

    /// Stage downloads below `dir` instead of the system temp directory
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    pub fn failure_cache(&self) -> &FailureCache {
        &self.failures
    }

    pub fn get_proxy_connectors(&self, managed_repo_id: &str) -> Vec<Arc<ProxyConnector>> {
        self.registry.get_proxy_connectors(managed_repo_id)
    }

    pub fn has_proxies(&self, managed_repo_id: &str) -> bool {
        self.registry.has_proxies(managed_repo_id)
    }

    /// Fetch an artifact; `Ok(None)` when no connector delivered it
    pub async fn fetch_from_proxies(
        &self,
        content: &ManagedRepositoryContent,
        artifact: &ArtifactReference,
    ) -> Result<Option<StorageAsset>> {
        let path = content.to_path(artifact);
        self.fetch_resource(content, &path, Some(&artifact.version))
            .await
    }

    /// Fetch any repository path; release and snapshot policies do not apply
    pub async fn fetch_path_from_proxies(
        &self,
        content: &ManagedRepositoryContent,
        path: &str,
    ) -> Result<Option<StorageAsset>> {
        self.fetch_resource(content, normalize(path), None).await
    }

    async fn fetch_resource(
        &self,
        content: &ManagedRepositoryContent,
        path: &str,
        version: Option<&str>,
    ) -> Result<Option<StorageAsset>> {
        let connectors = self.registry.get_proxy_connectors(content.id());
        if connectors.is_empty() {
            tracing::debug!("No proxy connectors for {}", content.id());
            return Ok(None);
        }

        let _guard = self.fetch_locks.acquire(content.id(), path).await;
        let local = content.storage().asset(path)?;
        let mut queued: Vec<RemoteFailure> = Vec::new();

        for connector in &connectors {
            let remote_id = connector.target.id.as_str();
            if !connector.admits(path) {
                tracing::debug!("Path {} rejected by filters of {}", path, connector.key());
                continue;
            }

            let outcome = self
                .fetch_with_connector(content, connector, path, path, version, &local, true)
                .await;

            match outcome {
                ConnectorOutcome::Fetched(asset) => {
                    tracing::info!("Proxied {} from {}", path, remote_id);
                    return Ok(Some(asset));
                }
                ConnectorOutcome::Skipped(violation) => {
                    tracing::debug!("Skipping {}: {}", connector.key(), violation);
                    if local.exists() {
                        return Ok(Some(local));
                    }
                }
                ConnectorOutcome::NotFound => {
                    tracing::debug!("{} not found on {}", path, remote_id);
                    self.failures
                        .cache_failure(&connector.target.resource_url(path));
                }
                ConnectorOutcome::NotModified => {
                    match decide_on_not_modified(connector.policies.propagate_errors_on_update) {
                        NotModifiedDecision::Continue => {
                            tracing::debug!("{} not modified on {}, continuing", path, remote_id);
                        }
                        NotModifiedDecision::Stop => {
                            tracing::debug!("{} not modified on {}", path, remote_id);
                            return Ok(local.exists().then_some(local));
                        }
                    }
                }
                ConnectorOutcome::Failed(error) => {
                    if !matches!(error, ProxyError::PolicyViolation(_)) {
                        self.failures
                            .cache_failure(&connector.target.resource_url(path));
                    }

                    queued.retain(|f| f.remote_id != remote_id);
                    let decision = decide_on_error(
                        connector.policies.propagate_errors,
                        connector.policies.propagate_errors_on_update,
                        local.exists(),
                    );
                    match decision {
                        ErrorDecision::Abort => {
                            tracing::warn!(
                                "Transfer of {} from {} failed, aborting: {}",
                                path,
                                remote_id,
                                error
                            );
                            queued.push(RemoteFailure::new(remote_id, &error));
                            return Err(ProxyError::Download {
                                path: path.to_string(),
                                causes: queued,
                            });
                        }
                        ErrorDecision::Queue => {
                            tracing::warn!(
                                "Transfer of {} from {} failed, trying next connector: {}",
                                path,
                                remote_id,
                                error
                            );
                            queued.push(RemoteFailure::new(remote_id, &error));
                        }
                        ErrorDecision::Skip => {
                            tracing::warn!(
                                "Transfer of {} from {} failed, ignored: {}",
                                path,
                                remote_id,
                                error
                            );
                        }
                    }
                }
            }
        }

        if !queued.is_empty() {
            return Err(ProxyError::Download {
                path: path.to_string(),
                causes: queued,
            });
        }

        tracing::debug!("No proxy connector of {} delivered {}", content.id(), path);
        Ok(None)
    }

    /// Fetch metadata from every connector and merge the copies.
    ///
    /// Metadata failures are never cached and never propagated.
    pub async fn fetch_metadata_from_proxies(
        &self,
        content: &ManagedRepositoryContent,
        logical_path: &str,
    ) -> Result<ProxyFetchResult> {
        let path = normalize(logical_path);
        let connectors = self.registry.get_proxy_connectors(content.id());
        let _guard = self.fetch_locks.acquire(content.id(), path).await;

        let mut remote_modified = false;
        for connector in &connectors {
            if !connector.admits(path) {
                tracing::debug!("Path {} rejected by filters of {}", path, connector.key());
                continue;
            }

            let proxied_path = proxied_metadata_path(path, &connector.target.id);
            let proxied = content.storage().asset(&proxied_path)?;
            let outcome = self
                .fetch_with_connector(content, connector, path, &proxied_path, None, &proxied, false)
                .await;

            match outcome {
                ConnectorOutcome::Fetched(_) => {
                    tracing::debug!("Updated {} from {}", proxied_path, connector.target.id);
                    remote_modified = true;
                }
                ConnectorOutcome::NotModified | ConnectorOutcome::NotFound => {}
                ConnectorOutcome::Skipped(violation) => {
                    tracing::debug!("Skipping {}: {}", connector.key(), violation);
                }
                ConnectorOutcome::Failed(error) => {
                    tracing::warn!(
                        "Transfer error from repository {} for metadata {}, failure is ignored: {}",
                        connector.target.id,
                        path,
                        error
                    );
                }
            }
        }

        let merged = content.storage().asset(path)?;
        let mut modified = remote_modified;
        if remote_modified || !merged.exists() {
            modified |= merge_metadata(content, path)?;
        }

        Ok(ProxyFetchResult {
            asset: merged.exists().then_some(merged),
            modified,
        })
    }

    /// Run one connector for one resource.
    ///
    /// `remote_path` is requested from the remote and stored at `local_path`;
    /// `local` is the current local copy used for conditional requests.
    #[allow(clippy::too_many_arguments)]
    async fn fetch_with_connector(
        &self,
        content: &ManagedRepositoryContent,
        connector: &ProxyConnector,
        remote_path: &str,
        local_path: &str,
        version: Option<&str>,
        local: &StorageAsset,
        use_failure_cache: bool,
    ) -> ConnectorOutcome {
        let network_proxy = connector.proxy_id.as_deref().and_then(|id| {
            let proxy = self.registry.network_proxy(id);
            if proxy.is_none() {
                tracing::warn!("Unknown network proxy '{}' on {}, connecting directly", id, connector.key());
            }
            proxy
        });
        let request = TransferRequest::new(&connector.target, remote_path)
            .with_network_proxy(network_proxy.as_ref());

        if let Err(violation) =
            self.apply_pre_download_policies(connector, &request, version, local, use_failure_cache)
        {
            return ConnectorOutcome::Skipped(violation);
        }

        let staging = match self.staging_dir() {
            Ok(dir) => dir,
            Err(e) => return ConnectorOutcome::Failed(e),
        };
        let file_name = remote_path.rsplit('/').next().unwrap_or(remote_path);
        let staged = staging.path().join(file_name);

        let status = match local.last_modified().filter(|_| local.exists()) {
            Some(since) => self.transport.get_if_newer(&request, &staged, since).await,
            None => self.transport.get(&request, &staged).await,
        };

        match status {
            Err(e) => ConnectorOutcome::Failed(e),
            Ok(TransferStatus::NotFound) => ConnectorOutcome::NotFound,
            Ok(TransferStatus::NotModified) => ConnectorOutcome::NotModified,
            Ok(TransferStatus::Downloaded) => {
                if !is_checksum(remote_path) {
                    for algorithm in ChecksumAlgorithm::PROXIED {
                        self.fetch_checksum(connector, &request, algorithm, &staged, use_failure_cache)
                            .await;
                    }
                    if let Err(violation) =
                        apply_checksum_policy(connector.policies.checksum, remote_path, &staged)
                    {
                        return ConnectorOutcome::Failed(violation.into());
                    }
                }

                match commit(content, &staged, local_path) {
                    Ok(asset) => {
                        if use_failure_cache {
                            self.failures.remove_failure(&request.url);
                        }
                        ConnectorOutcome::Fetched(asset)
                    }
                    Err(e) => ConnectorOutcome::Failed(e),
                }
            }
        }
    }

    fn apply_pre_download_policies(
        &self,
        connector: &ProxyConnector,
        request: &TransferRequest<'_>,
        version: Option<&str>,
        local: &StorageAsset,
        use_failure_cache: bool,
    ) -> std::result::Result<(), PolicyViolation> {
        let policies = &connector.policies;
        apply_update_policy(
            PolicyId::Releases,
            policies.releases,
            version,
            request.path,
            local.file_path(),
        )?;
        apply_update_policy(
            PolicyId::Snapshots,
            policies.snapshots,
            version,
            request.path,
            local.file_path(),
        )?;
        if use_failure_cache {
            apply_cache_failures_policy(
                policies.cache_failures,
                request.path,
                &request.url,
                &self.failures,
            )?;
        }
        Ok(())
    }

    /// Download one checksum sibling next to the staged file.
    ///
    /// Checksums are optional: failures are logged, and transport errors are
    /// remembered in the failure cache.
    async fn fetch_checksum(
        &self,
        connector: &ProxyConnector,
        request: &TransferRequest<'_>,
        algorithm: ChecksumAlgorithm,
        staged: &Path,
        use_failure_cache: bool,
    ) {
        let checksum_path = format!("{}.{}", request.path, algorithm.extension());
        let checksum_request = TransferRequest::new(request.remote, &checksum_path)
            .with_network_proxy(request.network_proxy);

        if use_failure_cache
            && connector.policies.cache_failures == CacheFailuresOption::Cache
            && self.failures.has_failed_before(&checksum_request.url)
        {
            tracing::debug!("Skipping {}, failed recently", checksum_request.url);
            return;
        }

        let destination = checksum_path_for(staged, algorithm);
        match self.transport.get(&checksum_request, &destination).await {
            Ok(TransferStatus::Downloaded) => {
                tracing::debug!("Fetched {} checksum for {}", algorithm, request.path);
            }
            Ok(_) => {
                tracing::debug!("No {} checksum on {} for {}", algorithm, request.remote.id, request.path);
            }
            Err(e) => {
                if use_failure_cache {
                    self.failures.cache_failure(&checksum_request.url);
                }
                tracing::warn!(
                    "Failed to fetch {} checksum of {} from {}: {}",
                    algorithm,
                    request.path,
                    request.remote.id,
                    e
                );
            }
        }
    }

    fn staging_dir(&self) -> Result<tempfile::TempDir> {
        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix(".archiva-fetch-");
            builder
        };
        Ok(match &self.work_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)?
            }
            None => builder.tempdir()?,
        })
    }
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Move a staged download and its checksums into the repository
fn commit(
    content: &ManagedRepositoryContent,
    staged: &Path,
    local_path: &str,
) -> Result<StorageAsset> {
    let storage = content.storage();
    let asset = storage.move_in(staged, local_path)?;

    if !is_checksum(local_path) {
        for algorithm in ChecksumAlgorithm::PROXIED {
            let staged_checksum = checksum_path_for(staged, algorithm);
            let local_checksum = format!("{}.{}", local_path, algorithm.extension());
            if staged_checksum.is_file() {
                storage.move_in(&staged_checksum, &local_checksum)?;
            } else {
                // A checksum of the previous content would no longer match
                storage.remove(&local_checksum)?;
            }
        }
    }

    Ok(asset)
}

/// `a/b/maven-metadata.xml` becomes `a/b/maven-metadata-<remote>.xml`
pub fn proxied_metadata_path(path: &str, remote_id: &str) -> String {
    let name = format!("maven-metadata-{}.xml", remote_id);
    match path.rsplit_once('/') {
        Some((dir, _)) => format!("{}/{}", dir, name),
        None => name,
    }
}

fn is_proxied_metadata(name: &str) -> bool {
    name != METADATA_FILENAME && name.starts_with("maven-metadata-") && name.ends_with(".xml")
}

/// Merge the proxied copies and the existing merged file into `path`.
///
/// Returns whether the merged file changed.
fn merge_metadata(content: &ManagedRepositoryContent, path: &str) -> Result<bool> {
    let storage = content.storage();
    let dir = path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");

    let merged_asset = storage.asset(path)?;
    let previous = if merged_asset.exists() {
        Some(storage.read(path)?)
    } else {
        None
    };

    let mut merged: Option<RepositoryMetadata> = None;
    let mut absorb = |metadata: RepositoryMetadata| match merged.as_mut() {
        Some(current) => current.merge(&metadata),
        None => merged = Some(metadata),
    };

    if let Some(bytes) = &previous {
        match RepositoryMetadata::from_xml(&String::from_utf8_lossy(bytes)) {
            Ok(metadata) => absorb(metadata),
            Err(e) => tracing::warn!("Ignoring unreadable metadata {}: {}", path, e),
        }
    }

    let mut sources: Vec<String> = storage
        .list(dir, false)?
        .into_iter()
        .filter(|p| is_proxied_metadata(p.rsplit('/').next().unwrap_or(p)))
        .collect();
    sources.sort();
    for source in &sources {
        match RepositoryMetadata::read(storage.asset(source)?.file_path()) {
            Ok(metadata) => absorb(metadata),
            Err(e) => tracing::warn!("Ignoring unreadable metadata {}: {}", source, e),
        }
    }

    let Some(mut metadata) = merged else {
        return Ok(false);
    };

    // Project level metadata also lists versions that only exist locally
    if metadata.version.is_none() && metadata.artifact_id.is_some() {
        for version in local_versions(content, dir)? {
            metadata.add_version(&version);
        }
    }

    let xml = metadata.to_xml()?;
    if previous.as_deref() == Some(xml.as_bytes()) {
        return Ok(false);
    }

    let asset = storage.write(path, xml.as_bytes())?;
    ChecksummedFile::new(asset.file_path()).fix_checksums(&ChecksumAlgorithm::PROXIED)?;
    tracing::debug!("Merged {} metadata copies into {}", sources.len(), path);
    Ok(true)
}

/// Version directories below a project directory that hold content
fn local_versions(content: &ManagedRepositoryContent, dir: &str) -> Result<Vec<String>> {
    let prefix = if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir)
    };
    let mut versions: Vec<String> = content
        .storage()
        .list(dir, true)?
        .into_iter()
        .filter_map(|p| {
            let rest = p.strip_prefix(&prefix)?;
            let (version, file) = rest.split_once('/')?;
            (!file.contains('/') && !file.starts_with("maven-metadata")).then(|| version.to_string())
        })
        .collect();
    versions.sort();
    versions.dedup();
    Ok(versions)
}
