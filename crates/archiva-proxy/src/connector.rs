//! Proxy connectors and the connector registry
//!
//! The registry holds an immutable snapshot behind `RwLock<Arc<_>>`. Readers
//! clone the `Arc` and work on their copy; writers build a new snapshot and
//! swap it in, so a reload never disturbs a fetch that is already running.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use archiva_core::{ArchivaConfig, NetworkProxy, ProxyConnectorConfig, RemoteRepository};
use glob::{MatchOptions, Pattern};

use crate::error::{ProxyError, Result};
use crate::policy::ConnectorPolicies;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Black-list and white-list of repository paths
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    black_list: Vec<Pattern>,
    white_list: Vec<Pattern>,
}

impl PathFilter {
    pub fn new(black_list: &[String], white_list: &[String]) -> Result<Self> {
        Ok(Self {
            black_list: compile(black_list)?,
            white_list: compile(white_list)?,
        })
    }

    /// Whether a path may be proxied.
    ///
    /// A black-list match always rejects, even when the white-list matches too.
    pub fn admits(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        if self.black_list.iter().any(|p| p.matches_with(path, MATCH_OPTIONS)) {
            return false;
        }
        self.white_list.is_empty()
            || self.white_list.iter().any(|p| p.matches_with(path, MATCH_OPTIONS))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p.trim_start_matches('/')).map_err(|e| ProxyError::InvalidConnector {
                connector: String::new(),
                message: format!("invalid path pattern '{}': {}", p, e),
            })
        })
        .collect()
}

/// An active edge from a managed repository to a remote repository
#[derive(Debug, Clone)]
pub struct ProxyConnector {
    pub source_repo_id: String,
    pub target: RemoteRepository,
    pub enabled: bool,
    pub order: i32,
    pub policies: ConnectorPolicies,
    pub properties: BTreeMap<String, String>,
    pub proxy_id: Option<String>,
    filter: PathFilter,
    config: ProxyConnectorConfig,
}

impl ProxyConnector {
    /// Build a connector from its configuration and target repository.
    ///
    /// Invalid policy options are logged and replaced by defaults; invalid
    /// path patterns make the connector unusable.
    pub fn new(config: ProxyConnectorConfig, target: RemoteRepository) -> Result<Self> {
        if config.target_repo_id != target.id {
            return Err(ProxyError::InvalidConnector {
                connector: config.key(),
                message: format!("target repository is '{}'", target.id),
            });
        }

        let filter = PathFilter::new(&config.black_list, &config.white_list).map_err(|e| {
            match e {
                ProxyError::InvalidConnector { message, .. } => ProxyError::InvalidConnector {
                    connector: config.key(),
                    message,
                },
                other => other,
            }
        })?;

        let (policies, problems) = ConnectorPolicies::resolve(&config.policies);
        for problem in problems {
            tracing::warn!("Proxy connector {}: {}, using default", config.key(), problem);
        }

        Ok(Self {
            source_repo_id: config.source_repo_id.clone(),
            target,
            enabled: config.enabled,
            order: config.order,
            policies,
            properties: config.properties.clone(),
            proxy_id: config.proxy_id.clone(),
            filter,
            config,
        })
    }

    /// `source->target` identifier used in logs
    pub fn key(&self) -> String {
        self.config.key()
    }

    pub fn config(&self) -> &ProxyConnectorConfig {
        &self.config
    }

    /// Whether this connector may proxy `path`
    pub fn admits(&self, path: &str) -> bool {
        self.filter.admits(path)
    }

    /// Configuration problems: unknown policies or options and bad patterns
    pub fn validate(&self) -> Vec<ProxyError> {
        validate_config(&self.config)
    }
}

/// Problems in a connector configuration, without building it
pub fn validate_config(config: &ProxyConnectorConfig) -> Vec<ProxyError> {
    let (_, problems) = ConnectorPolicies::resolve(&config.policies);
    let mut errors: Vec<ProxyError> = problems
        .into_iter()
        .map(|message| ProxyError::InvalidConnector {
            connector: config.key(),
            message,
        })
        .collect();

    for pattern in config.black_list.iter().chain(config.white_list.iter()) {
        if let Err(e) = Pattern::new(pattern.trim_start_matches('/')) {
            errors.push(ProxyError::InvalidConnector {
                connector: config.key(),
                message: format!("invalid path pattern '{}': {}", pattern, e),
            });
        }
    }

    errors
}

#[derive(Debug, Default)]
struct RegistrySnapshot {
    /// All connectors in insertion order
    connectors: Vec<Arc<ProxyConnector>>,
    network_proxies: HashMap<String, NetworkProxy>,
}

/// Registry of proxy connectors and network proxies
#[derive(Debug, Default)]
pub struct ConnectorRegistry {
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration
    pub fn from_config(config: &ArchivaConfig) -> Self {
        let registry = Self::new();
        registry.reload(config);
        registry
    }

    /// Replace all connectors and network proxies from configuration.
    ///
    /// Connectors referencing unknown repositories or carrying invalid path
    /// patterns are logged and left out; the rest are activated.
    pub fn reload(&self, config: &ArchivaConfig) {
        let mut connectors = Vec::new();
        for connector_config in &config.proxy_connectors {
            let target = match config.remote_repository(&connector_config.target_repo_id) {
                Ok(target) => target.clone(),
                Err(e) => {
                    tracing::error!(
                        "Proxy connector {} not activated: {}",
                        connector_config.key(),
                        e
                    );
                    continue;
                }
            };
            if config
                .managed_repository(&connector_config.source_repo_id)
                .is_err()
            {
                tracing::error!(
                    "Proxy connector {} not activated: unknown managed repository",
                    connector_config.key()
                );
                continue;
            }
            match ProxyConnector::new(connector_config.clone(), target) {
                Ok(connector) => connectors.push(Arc::new(connector)),
                Err(e) => tracing::error!("Proxy connector not activated: {}", e),
            }
        }

        let network_proxies = config
            .network_proxies
            .iter()
            .map(|p| (p.id.clone(), p.clone()))
            .collect();

        tracing::debug!("Loaded {} proxy connectors", connectors.len());
        self.swap(|_| RegistrySnapshot {
            connectors,
            network_proxies,
        });
    }

    fn current(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn swap(&self, update: impl FnOnce(&RegistrySnapshot) -> RegistrySnapshot) {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let next = update(&guard);
        *guard = Arc::new(next);
    }

    /// Enabled connectors of a managed repository, ascending by order
    pub fn get_proxy_connectors(&self, managed_repo_id: &str) -> Vec<Arc<ProxyConnector>> {
        let snapshot = self.current();
        let mut connectors: Vec<Arc<ProxyConnector>> = snapshot
            .connectors
            .iter()
            .filter(|c| c.enabled && c.source_repo_id == managed_repo_id)
            .cloned()
            .collect();
        // Stable: equal orders keep insertion order
        connectors.sort_by_key(|c| c.order);
        connectors
    }

    pub fn has_proxies(&self, managed_repo_id: &str) -> bool {
        !self.get_proxy_connectors(managed_repo_id).is_empty()
    }

    /// All connectors, enabled or not, in insertion order
    pub fn all_connectors(&self) -> Vec<Arc<ProxyConnector>> {
        self.current().connectors.clone()
    }

    pub fn add_proxy_connector(&self, connector: ProxyConnector) {
        let connector = Arc::new(connector);
        self.swap(|current| {
            let mut connectors = current.connectors.clone();
            connectors.push(connector);
            RegistrySnapshot {
                connectors,
                network_proxies: current.network_proxies.clone(),
            }
        });
    }

    pub fn set_proxy_connectors(&self, connectors: Vec<ProxyConnector>) {
        let connectors = connectors.into_iter().map(Arc::new).collect();
        self.swap(|current| RegistrySnapshot {
            connectors,
            network_proxies: current.network_proxies.clone(),
        });
    }

    pub fn add_network_proxy(&self, proxy: NetworkProxy) {
        self.swap(|current| {
            let mut network_proxies = current.network_proxies.clone();
            network_proxies.insert(proxy.id.clone(), proxy);
            RegistrySnapshot {
                connectors: current.connectors.clone(),
                network_proxies,
            }
        });
    }

    pub fn network_proxy(&self, id: &str) -> Option<NetworkProxy> {
        self.current().network_proxies.get(id).cloned()
    }

    pub fn remove_network_proxy(&self, id: &str) -> Option<NetworkProxy> {
        let mut removed = None;
        self.swap(|current| {
            let mut network_proxies = current.network_proxies.clone();
            removed = network_proxies.remove(id);
            RegistrySnapshot {
                connectors: current.connectors.clone(),
                network_proxies,
            }
        });
        removed
    }
}
