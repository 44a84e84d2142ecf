//! Repository definitions
//!
//! Managed repositories live on local storage and may proxy to remote
//! repositories. Groups aggregate several repositories behind one merged index.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::credentials::Credentials;

/// Default directory (relative to the repository root) holding the index
pub const DEFAULT_INDEX_PATH: &str = ".indexer";

/// A locally hosted repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedRepository {
    /// Unique repository id
    pub id: String,

    /// Human readable name
    #[serde(default)]
    pub name: Option<String>,

    /// Root directory of the repository content
    pub location: PathBuf,

    /// Layout id (only `default` is shipped)
    #[serde(default = "default_layout")]
    pub layout: String,

    /// Accept release versions
    #[serde(default = "default_true")]
    pub releases: bool,

    /// Accept snapshot versions
    #[serde(default)]
    pub snapshots: bool,

    /// Indexing settings
    #[serde(default)]
    pub indexing: IndexingConfig,
}

impl ManagedRepository {
    /// Create a managed repository with default settings
    pub fn new(id: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            name: None,
            location: location.into(),
            layout: default_layout(),
            releases: true,
            snapshots: false,
            indexing: IndexingConfig::default(),
        }
    }

    /// Directory holding this repository's indexing context
    pub fn index_directory(&self) -> PathBuf {
        match &self.indexing.index_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.location.join(dir),
            None => self.location.join(DEFAULT_INDEX_PATH),
        }
    }
}

/// Indexing settings of a managed repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingConfig {
    /// Index directory, relative to the repository root unless absolute
    #[serde(default)]
    pub index_dir: Option<PathBuf>,

    /// Cron expression (seconds resolution) for repository scanning
    #[serde(default = "default_scan_cron")]
    pub cron_expression: String,

    /// Skip creating the packed, downloadable index
    #[serde(default)]
    pub skip_packed_index_creation: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            index_dir: None,
            cron_expression: default_scan_cron(),
            skip_packed_index_creation: false,
        }
    }
}

/// An externally hosted repository reached through a transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRepository {
    /// Unique repository id
    pub id: String,

    /// Human readable name
    #[serde(default)]
    pub name: Option<String>,

    /// Base URL
    pub url: String,

    /// Layout id
    #[serde(default = "default_layout")]
    pub layout: String,

    /// Credentials sent to this repository only
    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// Extra HTTP headers sent with every request
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,

    /// Extra query parameters appended to every request URL
    #[serde(default)]
    pub extra_parameters: BTreeMap<String, String>,

    /// Connect and read timeout for a single request
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Remote index descriptor
    #[serde(default)]
    pub remote_index: Option<RemoteIndexConfig>,
}

impl RemoteRepository {
    /// Create a remote repository with default settings
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            url: url.into(),
            layout: default_layout(),
            credentials: None,
            extra_headers: BTreeMap::new(),
            extra_parameters: BTreeMap::new(),
            timeout: default_timeout(),
            remote_index: None,
        }
    }

    /// Build the request URL for a repository-relative path
    pub fn resource_url(&self, path: &str) -> String {
        let mut url = format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        if !self.extra_parameters.is_empty() {
            let query = self
                .extra_parameters
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query);
        }
        url
    }
}

/// Where and how to download the index published by a remote repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteIndexConfig {
    /// Index archive location, absolute or relative to the repository URL
    #[serde(default = "default_remote_index_path")]
    pub url: String,

    /// Download timeout
    #[serde(default = "default_index_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Network proxy used for index downloads
    #[serde(default)]
    pub network_proxy: Option<String>,

    /// Cron expression for periodic downloads
    #[serde(default = "default_remote_index_cron")]
    pub cron_expression: String,

    /// Download once when the scheduler starts
    #[serde(default)]
    pub download_on_startup: bool,

    /// Local directory receiving the unpacked index
    #[serde(default)]
    pub local_dir: Option<PathBuf>,
}

impl Default for RemoteIndexConfig {
    fn default() -> Self {
        Self {
            url: default_remote_index_path(),
            timeout: default_index_timeout(),
            network_proxy: None,
            cron_expression: default_remote_index_cron(),
            download_on_startup: false,
            local_dir: None,
        }
    }
}

/// An HTTP proxy used to reach remote repositories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProxy {
    pub id: String,

    #[serde(default = "default_proxy_protocol")]
    pub protocol: String,

    pub host: String,

    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl NetworkProxy {
    /// Proxy URL understood by HTTP clients
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// A set of repositories served through one merged index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryGroup {
    pub id: String,

    /// Member repository ids, in resolution order
    #[serde(default)]
    pub repositories: Vec<String>,

    /// Merged index location, relative to the group directory
    #[serde(default = "default_merged_index_path")]
    pub merged_index_path: String,

    /// Lifetime of temporary merged indexes
    #[serde(default = "default_merged_index_ttl", with = "humantime_serde")]
    pub merged_index_ttl: Duration,

    /// Cron expression for rebuilding the merged index
    #[serde(default)]
    pub cron_expression: Option<String>,

    /// Directory holding the group's persistent merged index
    #[serde(default)]
    pub location: Option<PathBuf>,
}

impl RepositoryGroup {
    pub fn new(id: impl Into<String>, repositories: Vec<String>) -> Self {
        Self {
            id: id.into(),
            repositories,
            merged_index_path: default_merged_index_path(),
            merged_index_ttl: default_merged_index_ttl(),
            cron_expression: None,
            location: None,
        }
    }
}

fn default_layout() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

fn default_scan_cron() -> String {
    "0 0,30 * * * *".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_index_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_remote_index_path() -> String {
    ".index/archiva-index.tar.gz".to_string()
}

fn default_remote_index_cron() -> String {
    "0 0 8 * * *".to_string()
}

fn default_proxy_protocol() -> String {
    "http".to_string()
}

fn default_merged_index_path() -> String {
    DEFAULT_INDEX_PATH.to_string()
}

fn default_merged_index_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_url_joins_path() {
        let remote = RemoteRepository::new("central", "https://repo.maven.apache.org/maven2/");
        assert_eq!(
            remote.resource_url("/org/apache/maven/maven-core/3.0/maven-core-3.0.pom"),
            "https://repo.maven.apache.org/maven2/org/apache/maven/maven-core/3.0/maven-core-3.0.pom"
        );
    }

    #[test]
    fn test_resource_url_appends_parameters() {
        let mut remote = RemoteRepository::new("central", "https://repo.example.com");
        remote
            .extra_parameters
            .insert("token".to_string(), "abc".to_string());
        remote
            .extra_parameters
            .insert("mirror".to_string(), "eu".to_string());
        assert_eq!(
            remote.resource_url("a/b.jar"),
            "https://repo.example.com/a/b.jar?mirror=eu&token=abc"
        );
    }

    #[test]
    fn test_index_directory() {
        let mut repo = ManagedRepository::new("internal", "/srv/repos/internal");
        assert_eq!(
            repo.index_directory(),
            PathBuf::from("/srv/repos/internal/.indexer")
        );

        repo.indexing.index_dir = Some(PathBuf::from("/srv/indexes/internal"));
        assert_eq!(
            repo.index_directory(),
            PathBuf::from("/srv/indexes/internal")
        );
    }

    #[test]
    fn test_group_defaults_from_yaml() {
        let group: RepositoryGroup =
            serde_yaml::from_str("id: public\nrepositories: [internal, central]\n").unwrap();
        assert_eq!(group.merged_index_path, ".indexer");
        assert_eq!(group.merged_index_ttl, Duration::from_secs(1800));
        assert_eq!(group.repositories, vec!["internal", "central"]);
    }
}
