//! Error types for indexing operations

use thiserror::Error;

use archiva_core::CoreError;
use archiva_proxy::ProxyError;

#[derive(Debug, Error)]
pub enum IndexError {
    // ============ Context Errors ============
    #[error("Indexing context not found: {id}")]
    ContextNotFound { id: String },

    #[error("Indexing context already exists: {id}")]
    ContextAlreadyExists { id: String },

    #[error("Index database error: {0}")]
    Database(#[from] rusqlite::Error),

    // ============ Packing Errors ============
    #[error("Invalid index archive {path}: {message}")]
    Archive { path: String, message: String },

    // ============ Remote Index Errors ============
    #[error("Repository {id} does not publish a remote index")]
    RemoteIndexNotConfigured { id: String },

    #[error("Failed to download remote index from {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: ProxyError,
    },

    // ============ Scheduling Errors ============
    #[error("Invalid cron expression '{expression}': {message}")]
    InvalidCron { expression: String, message: String },

    #[error("Background task failed: {message}")]
    Task { message: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl From<tokio::task::JoinError> for IndexError {
    fn from(e: tokio::task::JoinError) -> Self {
        IndexError::Task {
            message: e.to_string(),
        }
    }
}
