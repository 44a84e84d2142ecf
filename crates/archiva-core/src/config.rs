//! Archiva configuration management
//!
//! Stores configuration in `~/.config/archiva/archiva.yaml`

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::repository::{ManagedRepository, NetworkProxy, RemoteRepository, RepositoryGroup};

/// Configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivaConfig {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default)]
    pub managed_repositories: Vec<ManagedRepository>,

    #[serde(default)]
    pub remote_repositories: Vec<RemoteRepository>,

    #[serde(default)]
    pub proxy_connectors: Vec<ProxyConnectorConfig>,

    #[serde(default)]
    pub network_proxies: Vec<NetworkProxy>,

    #[serde(default)]
    pub repository_groups: Vec<RepositoryGroup>,

    #[serde(default)]
    pub settings: EngineSettings,
}

fn default_api_version() -> String {
    "archiva.apache.org/v1".to_string()
}

impl Default for ArchivaConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            managed_repositories: Vec::new(),
            remote_repositories: Vec::new(),
            proxy_connectors: Vec::new(),
            network_proxies: Vec::new(),
            repository_groups: Vec::new(),
            settings: EngineSettings::default(),
        }
    }
}

impl ArchivaConfig {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to default location
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| CoreError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("archiva").join("archiva.yaml"))
    }

    pub fn managed_repository(&self, id: &str) -> Result<&ManagedRepository> {
        self.managed_repositories
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| CoreError::RepositoryNotFound { id: id.to_string() })
    }

    pub fn remote_repository(&self, id: &str) -> Result<&RemoteRepository> {
        self.remote_repositories
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| CoreError::RepositoryNotFound { id: id.to_string() })
    }

    pub fn repository_group(&self, id: &str) -> Result<&RepositoryGroup> {
        self.repository_groups
            .iter()
            .find(|g| g.id == id)
            .ok_or_else(|| CoreError::RepositoryNotFound { id: id.to_string() })
    }

    pub fn network_proxy(&self, id: &str) -> Option<&NetworkProxy> {
        self.network_proxies.iter().find(|p| p.id == id)
    }

    /// Add a managed repository
    pub fn add_managed_repository(&mut self, repo: ManagedRepository) -> Result<()> {
        if self.is_known_id(&repo.id) {
            return Err(CoreError::RepositoryAlreadyExists { id: repo.id });
        }
        self.managed_repositories.push(repo);
        Ok(())
    }

    /// Add a remote repository
    pub fn add_remote_repository(&mut self, repo: RemoteRepository) -> Result<()> {
        if self.is_known_id(&repo.id) {
            return Err(CoreError::RepositoryAlreadyExists { id: repo.id });
        }
        self.remote_repositories.push(repo);
        Ok(())
    }

    fn is_known_id(&self, id: &str) -> bool {
        self.managed_repositories.iter().any(|r| r.id == id)
            || self.remote_repositories.iter().any(|r| r.id == id)
    }

    /// Check cross references between configuration sections
    ///
    /// Returns every problem found rather than stopping at the first one, so
    /// callers can log them all and keep the valid parts running.
    pub fn validate(&self) -> Vec<CoreError> {
        let mut problems = Vec::new();
        let mut ids = HashSet::new();

        for id in self
            .managed_repositories
            .iter()
            .map(|r| &r.id)
            .chain(self.remote_repositories.iter().map(|r| &r.id))
        {
            if !ids.insert(id.as_str()) {
                problems.push(CoreError::RepositoryAlreadyExists { id: id.clone() });
            }
        }

        let proxy_exists = |id: &str| self.network_proxies.iter().any(|p| p.id == id);

        for connector in &self.proxy_connectors {
            if !self
                .managed_repositories
                .iter()
                .any(|r| r.id == connector.source_repo_id)
            {
                problems.push(CoreError::InvalidConfig {
                    message: format!(
                        "proxy connector {} references unknown managed repository '{}'",
                        connector.key(),
                        connector.source_repo_id
                    ),
                });
            }
            if !self
                .remote_repositories
                .iter()
                .any(|r| r.id == connector.target_repo_id)
            {
                problems.push(CoreError::InvalidConfig {
                    message: format!(
                        "proxy connector {} references unknown remote repository '{}'",
                        connector.key(),
                        connector.target_repo_id
                    ),
                });
            }
            if let Some(proxy_id) = &connector.proxy_id
                && !proxy_exists(proxy_id)
            {
                problems.push(CoreError::InvalidConfig {
                    message: format!(
                        "proxy connector {} references unknown network proxy '{}'",
                        connector.key(),
                        proxy_id
                    ),
                });
            }
        }

        for remote in &self.remote_repositories {
            if let Some(proxy_id) = remote
                .remote_index
                .as_ref()
                .and_then(|i| i.network_proxy.as_ref())
                && !proxy_exists(proxy_id)
            {
                problems.push(CoreError::InvalidConfig {
                    message: format!(
                        "remote index of '{}' references unknown network proxy '{}'",
                        remote.id, proxy_id
                    ),
                });
            }
        }

        for group in &self.repository_groups {
            for member in &group.repositories {
                if !ids.contains(member.as_str()) {
                    problems.push(CoreError::InvalidConfig {
                        message: format!(
                            "repository group '{}' references unknown repository '{}'",
                            group.id, member
                        ),
                    });
                }
            }
        }

        problems
    }
}

/// Configured edge from a managed repository to a remote repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConnectorConfig {
    pub source_repo_id: String,

    pub target_repo_id: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Evaluation priority, ascending
    #[serde(default)]
    pub order: i32,

    /// Paths never proxied through this connector
    #[serde(default)]
    pub black_list: Vec<String>,

    /// When non-empty, only matching paths are proxied
    #[serde(default)]
    pub white_list: Vec<String>,

    /// Policy id to option
    #[serde(default)]
    pub policies: BTreeMap<String, String>,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    /// Network proxy used for this connector
    #[serde(default)]
    pub proxy_id: Option<String>,
}

impl ProxyConnectorConfig {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_repo_id: source.into(),
            target_repo_id: target.into(),
            enabled: true,
            order: 0,
            black_list: Vec::new(),
            white_list: Vec::new(),
            policies: BTreeMap::new(),
            properties: BTreeMap::new(),
            proxy_id: None,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_policy(mut self, policy: impl Into<String>, option: impl Into<String>) -> Self {
        self.policies.insert(policy.into(), option.into());
        self
    }

    /// `source->target` identifier used in logs
    pub fn key(&self) -> String {
        format!("{}->{}", self.source_repo_id, self.target_repo_id)
    }
}

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    /// How long a failed URL is not retried
    #[serde(default = "default_failure_cache_ttl", with = "humantime_serde")]
    pub failure_cache_ttl: Duration,

    /// Interval of the temporary group index sweep
    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub temporary_index_sweep: Duration,

    /// Base directory for temporary merged indexes
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            failure_cache_ttl: default_failure_cache_ttl(),
            temporary_index_sweep: default_sweep_interval(),
            work_dir: None,
        }
    }
}

impl EngineSettings {
    /// Directory receiving temporary merged indexes
    pub fn work_directory(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("archiva"))
    }
}

fn default_true() -> bool {
    true
}

fn default_failure_cache_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(5 * 60)
}
