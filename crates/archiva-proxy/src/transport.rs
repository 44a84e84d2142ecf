//! Transport abstraction used by the fetch pipeline

use std::path::Path;
use std::time::SystemTime;

use archiva_core::{NetworkProxy, RemoteRepository};
use async_trait::async_trait;

use crate::error::Result;

/// Result of a single successful exchange with a remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Content written to the destination file
    Downloaded,
    /// Conditional request declined: the remote is not newer
    NotModified,
    /// The remote does not have the resource
    NotFound,
}

/// One resource request against one remote repository
#[derive(Debug, Clone)]
pub struct TransferRequest<'a> {
    pub remote: &'a RemoteRepository,
    /// Repository-relative path on the remote
    pub path: &'a str,
    /// Full request URL, query parameters included
    pub url: String,
    pub network_proxy: Option<&'a NetworkProxy>,
}

impl<'a> TransferRequest<'a> {
    pub fn new(remote: &'a RemoteRepository, path: &'a str) -> Self {
        Self {
            remote,
            path,
            url: remote.resource_url(path),
            network_proxy: None,
        }
    }

    pub fn with_network_proxy(mut self, proxy: Option<&'a NetworkProxy>) -> Self {
        self.network_proxy = proxy;
        self
    }
}

/// Moves remote resources into local files.
///
/// Transport failures are returned as errors; "not found" and "not modified"
/// are ordinary statuses.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Download the resource into `destination`
    async fn get(&self, request: &TransferRequest<'_>, destination: &Path)
    -> Result<TransferStatus>;

    /// Download the resource only if the remote copy is newer than `since`
    async fn get_if_newer(
        &self,
        request: &TransferRequest<'_>,
        destination: &Path,
        since: SystemTime,
    ) -> Result<TransferStatus>;
}
