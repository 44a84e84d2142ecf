//! Repository layouts
//!
//! A layout maps artifact coordinates to repository-relative paths and back.
//! Only the Maven 2 `default` layout ships with the crate.

use std::sync::Arc;

use crate::artifact::{ArtifactReference, base_version, is_snapshot};
use crate::error::{CoreError, Result};

/// File name of merged repository metadata
pub const METADATA_FILENAME: &str = "maven-metadata.xml";

/// Extensions of checksum files published next to artifacts
pub const CHECKSUM_EXTENSIONS: &[&str] = &["sha1", "md5", "sha256"];

/// Maps artifacts to and from repository-relative paths
pub trait RepositoryLayout: Send + Sync {
    /// Layout id as used in configuration
    fn id(&self) -> &str;

    /// Repository-relative path of an artifact
    fn to_path(&self, artifact: &ArtifactReference) -> String;

    /// Parse a repository-relative path back into coordinates
    fn to_artifact(&self, path: &str) -> Result<ArtifactReference>;
}

/// Look up a layout by its configuration id
pub fn layout_for(id: &str) -> Result<Arc<dyn RepositoryLayout>> {
    match id {
        "default" | "maven2" => Ok(Arc::new(DefaultLayout)),
        other => Err(CoreError::UnsupportedLayout {
            layout: other.to_string(),
        }),
    }
}

/// True if the path names a checksum file
pub fn is_checksum(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| CHECKSUM_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// True if the path names repository metadata (merged or per-remote copy)
pub fn is_metadata(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.starts_with("maven-metadata") && name.ends_with(".xml")
}

/// Maven 2 repository layout
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLayout;

impl DefaultLayout {
    fn extension_for(artifact_type: &str) -> &str {
        match artifact_type {
            "maven-plugin" | "ejb" | "ejb-client" | "test-jar" | "java-source" | "javadoc" => {
                "jar"
            }
            other => other,
        }
    }

    fn classifier_for(artifact: &ArtifactReference) -> Option<&str> {
        artifact
            .classifier
            .as_deref()
            .or(match artifact.r#type.as_str() {
                "test-jar" => Some("tests"),
                "java-source" => Some("sources"),
                "javadoc" => Some("javadoc"),
                _ => None,
            })
    }
}

impl RepositoryLayout for DefaultLayout {
    fn id(&self) -> &str {
        "default"
    }

    fn to_path(&self, artifact: &ArtifactReference) -> String {
        let mut path = format!(
            "{}/{}/{}/{}-{}",
            artifact.group_id.replace('.', "/"),
            artifact.artifact_id,
            base_version(&artifact.version),
            artifact.artifact_id,
            artifact.version
        );
        if let Some(classifier) = Self::classifier_for(artifact) {
            path.push('-');
            path.push_str(classifier);
        }
        path.push('.');
        path.push_str(Self::extension_for(&artifact.r#type));
        path
    }

    fn to_artifact(&self, path: &str) -> Result<ArtifactReference> {
        let invalid = || CoreError::InvalidArtifactPath {
            path: path.to_string(),
        };

        let trimmed = path.trim_start_matches('/');
        if is_checksum(trimmed) || is_metadata(trimmed) {
            return Err(invalid());
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.len() < 4 || segments.iter().any(|s| s.is_empty()) {
            return Err(invalid());
        }

        let n = segments.len();
        let filename = segments[n - 1];
        let version_dir = segments[n - 2];
        let artifact_id = segments[n - 3];
        let group_id = segments[..n - 3].join(".");

        let remainder = filename
            .strip_prefix(artifact_id)
            .and_then(|r| r.strip_prefix('-'))
            .ok_or_else(invalid)?;

        let version = if remainder.starts_with(version_dir) {
            version_dir.to_string()
        } else if is_snapshot(version_dir) {
            // Timestamped snapshot inside a -SNAPSHOT directory
            let base = version_dir.trim_end_matches("SNAPSHOT");
            let stamped = remainder.strip_prefix(base).ok_or_else(invalid)?;
            let end = stamped
                .char_indices()
                .skip(8 + 1 + 6 + 1)
                .find(|(_, c)| !c.is_ascii_digit())
                .map(|(i, _)| i)
                .unwrap_or(stamped.len());
            let candidate = format!("{}{}", base, &stamped[..end]);
            if !is_snapshot(&candidate) || base_version(&candidate) != version_dir {
                return Err(invalid());
            }
            candidate
        } else {
            return Err(invalid());
        };

        let rest = &remainder[version.len()..];
        let (classifier, extension) = if let Some(rest) = rest.strip_prefix('-') {
            let (classifier, extension) = rest.split_once('.').ok_or_else(invalid)?;
            (Some(classifier.to_string()), extension)
        } else if let Some(extension) = rest.strip_prefix('.') {
            (None, extension)
        } else {
            return Err(invalid());
        };

        if extension.is_empty() {
            return Err(invalid());
        }

        Ok(ArtifactReference {
            group_id,
            artifact_id: artifact_id.to_string(),
            version,
            classifier,
            r#type: extension.to_string(),
        })
    }
}
