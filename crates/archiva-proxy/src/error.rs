//! Error types for proxy operations

use archiva_core::CoreError;
use thiserror::Error;

use crate::policy::PolicyViolation;

/// Proxy operation errors
#[derive(Debug, Error)]
pub enum ProxyError {
    // ============ Configuration Errors ============
    #[error("Invalid proxy connector {connector}: {message}")]
    InvalidConnector { connector: String, message: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    // ============ Network Errors ============
    #[error("HTTP error: {status} - {url}")]
    HttpError { status: u16, url: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Authentication required for {url}")]
    AuthRequired { url: String },

    #[error("Access denied to {url}")]
    AuthFailed { url: String },

    // ============ Fetch Errors ============
    #[error(transparent)]
    PolicyViolation(#[from] PolicyViolation),

    #[error("Failed to fetch {path} from proxies: {}", describe_failures(.causes))]
    Download {
        path: String,
        causes: Vec<RemoteFailure>,
    },

    // ============ Other ============
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Why one remote failed to deliver a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    pub remote_id: String,
    pub message: String,
}

impl RemoteFailure {
    pub fn new(remote_id: impl Into<String>, error: &ProxyError) -> Self {
        Self {
            remote_id: remote_id.into(),
            message: error.to_string(),
        }
    }
}

fn describe_failures(causes: &[RemoteFailure]) -> String {
    causes
        .iter()
        .map(|c| format!("[{}] {}", c.remote_id, c.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ProxyError {
    /// True for a propagated download failure
    pub fn is_download_error(&self) -> bool {
        matches!(self, ProxyError::Download { .. })
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();
        if e.is_timeout() {
            ProxyError::Timeout { url }
        } else if e.is_connect() {
            ProxyError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            ProxyError::HttpError {
                status: status.as_u16(),
                url,
            }
        } else {
            ProxyError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<url::ParseError> for ProxyError {
    fn from(e: url::ParseError) -> Self {
        ProxyError::InvalidUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}
