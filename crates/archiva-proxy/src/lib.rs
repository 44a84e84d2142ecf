//! Archiva repository proxying
//!
//! This crate resolves requests for content of a managed repository against
//! its remote repositories:
//!
//! - **Connectors**: ordered, filtered edges from managed to remote repositories
//! - **Policies**: checksum, release/snapshot update, cached failures and
//!   error propagation, evaluated per attempt
//! - **Failure cache**: URLs that failed recently are not retried
//! - **Fetch pipeline**: first successful connector wins for artifacts,
//!   metadata is merged from all of them
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use archiva_core::{ArchivaConfig, ArtifactReference, ManagedRepositoryContent};
//! use archiva_proxy::{ConnectorRegistry, FailureCache, HttpTransport, RepositoryProxyHandler};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ArchivaConfig::load()?;
//! let handler = RepositoryProxyHandler::new(
//!     Arc::new(ConnectorRegistry::from_config(&config)),
//!     Arc::new(FailureCache::new(Duration::from_secs(1800))),
//!     Arc::new(HttpTransport::new()),
//! );
//!
//! let content = ManagedRepositoryContent::open(config.managed_repository("internal")?.clone())?;
//! let artifact: ArtifactReference = "org.example:app:1.0:jar".parse()?;
//! if let Some(asset) = handler.fetch_from_proxies(&content, &artifact).await? {
//!     println!("{}", asset.file_path().display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod connector;
pub mod error;
pub mod failure_cache;
pub mod handler;
pub mod http;
pub mod policy;
pub mod transport;

// Re-exports for convenience
pub use connector::{ConnectorRegistry, PathFilter, ProxyConnector};
pub use error::{ProxyError, RemoteFailure, Result};
pub use failure_cache::FailureCache;
pub use handler::{ProxyFetchResult, RepositoryProxyHandler};
pub use http::HttpTransport;
pub use policy::{ConnectorPolicies, PolicyId, PolicyViolation};
pub use transport::{TransferRequest, TransferStatus, Transport};
