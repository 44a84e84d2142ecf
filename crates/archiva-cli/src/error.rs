//! CLI error types with exit code handling
//!
//! Errors of the library crates are mapped to a small set of CLI errors,
//! each with its own exit code and an optional hint.

use archiva_core::CoreError;
use archiva_indexer::IndexError;
use archiva_proxy::ProxyError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    #[diagnostic(code(archiva::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Invalid user input (coordinates, paths, ids)
    #[error("Invalid input: {message}")]
    #[diagnostic(code(archiva::cli::input))]
    Input {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// No remote repository delivered the resource
    #[error("{path} is not available in {repository} or any of its remotes")]
    #[diagnostic(code(archiva::cli::not_found))]
    NotFound { repository: String, path: String },

    /// Proxying failed
    #[error("Proxy error: {message}")]
    #[diagnostic(code(archiva::cli::proxy))]
    Proxy {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Indexing failed
    #[error("Index error: {message}")]
    #[diagnostic(code(archiva::cli::index))]
    Index {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(archiva::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(archiva::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Input { .. } => exit_codes::USAGE_ERROR,
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Proxy { .. } => exit_codes::PROXY_ERROR,
            CliError::Index { .. } => exit_codes::INDEX_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an input error with help text
    pub fn input_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn not_found(repository: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NotFound {
            repository: repository.into(),
            path: path.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::RepositoryNotFound { .. } => CliError::Config {
                message: err.to_string(),
                help: Some("Check the repository ids in the configuration file".to_string()),
            },
            CoreError::InvalidConfig { .. } | CoreError::YamlParse(_) => CliError::Config {
                message: err.to_string(),
                help: Some("Pass another configuration file with --config".to_string()),
            },
            CoreError::InvalidArtifactPath { .. } | CoreError::PathTraversal { .. } => {
                CliError::input_with_help(
                    err.to_string(),
                    "Use groupId:artifactId:version[:classifier][:type] or a repository path",
                )
            }
            CoreError::Io(e) => CliError::from(e),
            other => CliError::internal(other.to_string()),
        }
    }
}

impl From<ProxyError> for CliError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Core(e) => CliError::from(e),
            ProxyError::Io(e) => CliError::from(e),
            ProxyError::AuthRequired { .. } | ProxyError::AuthFailed { .. } => CliError::Proxy {
                message: err.to_string(),
                help: Some("Check the credentials of the remote repository".to_string()),
            },
            ProxyError::InvalidConnector { .. } | ProxyError::InvalidUrl { .. } => {
                CliError::Config {
                    message: err.to_string(),
                    help: None,
                }
            }
            other => CliError::Proxy {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

impl From<IndexError> for CliError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Core(e) => CliError::from(e),
            IndexError::Io(e) => CliError::from(e),
            IndexError::InvalidCron { .. } | IndexError::RemoteIndexNotConfigured { .. } => {
                CliError::Config {
                    message: err.to_string(),
                    help: None,
                }
            }
            other => CliError::Index {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_repository_is_config_error() {
        let err = CliError::from(CoreError::RepositoryNotFound {
            id: "nope".to_string(),
        });
        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
    }

    #[test]
    fn test_nested_errors_unwrap() {
        let err = CliError::from(IndexError::Core(CoreError::InvalidArtifactPath {
            path: "x".to_string(),
        }));
        assert!(matches!(err, CliError::Input { .. }));

        let err = CliError::from(ProxyError::NetworkError {
            message: "reset".to_string(),
        });
        assert_eq!(err.exit_code(), exit_codes::PROXY_ERROR);
    }
}
