//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Repository not found: {id}")]
    RepositoryNotFound { id: String },

    #[error("Repository already exists: {id}")]
    RepositoryAlreadyExists { id: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to parse configuration: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Path is not a valid artifact path: {path}")]
    InvalidArtifactPath { path: String },

    #[error("Unsupported repository layout: {layout}")]
    UnsupportedLayout { layout: String },

    #[error("Path escapes the repository root: {path}")]
    PathTraversal { path: String },

    #[error("Invalid metadata at {path}: {message}")]
    InvalidMetadata { path: String, message: String },

    #[error("Checksum error for {path}: {message}")]
    Checksum { path: String, message: String },

    #[error("Lock poisoned: {resource}")]
    LockPoisoned { resource: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl From<quick_xml::DeError> for CoreError {
    fn from(e: quick_xml::DeError) -> Self {
        CoreError::InvalidMetadata {
            path: String::new(),
            message: e.to_string(),
        }
    }
}

impl From<quick_xml::SeError> for CoreError {
    fn from(e: quick_xml::SeError) -> Self {
        CoreError::InvalidMetadata {
            path: String::new(),
            message: e.to_string(),
        }
    }
}
