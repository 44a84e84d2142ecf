//! Maven repository metadata (`maven-metadata.xml`)
//!
//! Proxied repositories each contribute their own copy of the metadata; the
//! copies are merged into one local file. Merging is a union: the result does
//! not depend on the order in which remotes are merged.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

use crate::artifact::{compare_versions, is_snapshot};
use crate::error::{CoreError, Result};

/// Format of `lastUpdated` and snapshot `updated` values
pub const LAST_UPDATED_FORMAT: &str = "%Y%m%d%H%M%S";

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "metadata", rename_all = "camelCase")]
pub struct RepositoryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versioning: Option<Versioning>,

    #[serde(default, skip_serializing_if = "Plugins::is_empty")]
    pub plugins: Plugins,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Versioning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,

    #[serde(default, skip_serializing_if = "Versions::is_empty")]
    pub versions: Versions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,

    #[serde(default, skip_serializing_if = "SnapshotVersions::is_empty")]
    pub snapshot_versions: SnapshotVersions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versions {
    #[serde(default)]
    pub version: Vec<String>,
}

impl Versions {
    pub fn is_empty(&self) -> bool {
        self.version.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_copy: Option<bool>,
}

impl Snapshot {
    fn sort_key(&self) -> (&str, u32) {
        (
            self.timestamp.as_deref().unwrap_or(""),
            self.build_number.unwrap_or(0),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVersions {
    #[serde(default, rename = "snapshotVersion")]
    pub entries: Vec<SnapshotVersion>,
}

impl SnapshotVersions {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,

    #[serde(default)]
    pub extension: String,

    #[serde(default)]
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugins {
    #[serde(default)]
    pub plugin: Vec<Plugin>,
}

impl Plugins {
    pub fn is_empty(&self) -> bool {
        self.plugin.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub prefix: String,

    pub artifact_id: String,
}

impl RepositoryMetadata {
    /// Parse metadata XML
    pub fn from_xml(xml: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    /// Serialize to indented XML with declaration
    pub fn to_xml(&self) -> Result<String> {
        let mut body = String::new();
        let mut serializer = quick_xml::se::Serializer::new(&mut body);
        serializer.indent(' ', 2);
        self.serialize(serializer)?;
        Ok(format!("{}{}\n", XML_DECLARATION, body))
    }

    /// Read metadata from a file
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_xml(&content).map_err(|e| match e {
            CoreError::InvalidMetadata { message, .. } => CoreError::InvalidMetadata {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Write metadata to a file
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_xml()?)?;
        Ok(())
    }

    /// All known versions
    pub fn versions(&self) -> &[String] {
        self.versioning
            .as_ref()
            .map(|v| v.versions.version.as_slice())
            .unwrap_or(&[])
    }

    /// Record a version, keeping the version list ordered
    pub fn add_version(&mut self, version: &str) {
        let versioning = self.versioning.get_or_insert_with(Versioning::default);
        if !versioning.versions.version.iter().any(|v| v == version) {
            versioning.versions.version.push(version.to_string());
        }
        versioning.refresh_latest_release();
    }

    /// Merge another copy of the same metadata into this one
    pub fn merge(&mut self, other: &RepositoryMetadata) {
        if self.group_id.is_none() {
            self.group_id = other.group_id.clone();
        }
        if self.artifact_id.is_none() {
            self.artifact_id = other.artifact_id.clone();
        }
        if self.version.is_none() {
            self.version = other.version.clone();
        }

        for plugin in &other.plugins.plugin {
            if !self.plugins.plugin.iter().any(|p| p.prefix == plugin.prefix) {
                self.plugins.plugin.push(plugin.clone());
            }
        }
        self.plugins.plugin.sort_by(|a, b| a.prefix.cmp(&b.prefix));

        if let Some(theirs) = &other.versioning {
            self.versioning
                .get_or_insert_with(Versioning::default)
                .merge(theirs);
        }
    }

    /// Set `lastUpdated` to the current time
    pub fn touch(&mut self) {
        let versioning = self.versioning.get_or_insert_with(Versioning::default);
        versioning.last_updated = Some(Utc::now().format(LAST_UPDATED_FORMAT).to_string());
    }
}

fn max_version<'a>(candidates: impl Iterator<Item = &'a String>) -> Option<String> {
    candidates
        .max_by(|a, b| compare_versions(a, b))
        .cloned()
}

impl Versioning {
    fn merge(&mut self, other: &Versioning) {
        for version in &other.versions.version {
            if !self.versions.version.contains(version) {
                self.versions.version.push(version.clone());
            }
        }

        if let Some(latest) = &other.latest {
            let newer = self
                .latest
                .as_ref()
                .is_none_or(|current| compare_versions(latest, current) == Ordering::Greater);
            if newer {
                self.latest = Some(latest.clone());
            }
        }

        if let Some(release) = &other.release {
            let newer = self
                .release
                .as_ref()
                .is_none_or(|current| compare_versions(release, current) == Ordering::Greater);
            if newer {
                self.release = Some(release.clone());
            }
        }

        match (&self.snapshot, &other.snapshot) {
            (None, Some(theirs)) => self.snapshot = Some(theirs.clone()),
            (Some(ours), Some(theirs)) if theirs.sort_key() > ours.sort_key() => {
                self.snapshot = Some(theirs.clone());
            }
            _ => {}
        }

        for entry in &other.snapshot_versions.entries {
            match self
                .snapshot_versions
                .entries
                .iter_mut()
                .find(|e| e.classifier == entry.classifier && e.extension == entry.extension)
            {
                Some(existing) => {
                    if entry.updated > existing.updated {
                        *existing = entry.clone();
                    }
                }
                None => self.snapshot_versions.entries.push(entry.clone()),
            }
        }

        if other.last_updated > self.last_updated {
            self.last_updated = other.last_updated.clone();
        }

        self.refresh_latest_release();
    }

    /// Sort versions and derive `latest`/`release` from them
    fn refresh_latest_release(&mut self) {
        self.versions
            .version
            .sort_by(|a, b| compare_versions(a, b));

        let candidates: Vec<String> = self
            .versions
            .version
            .iter()
            .chain(self.latest.iter())
            .cloned()
            .collect();
        self.latest = max_version(candidates.iter());

        let releases: Vec<String> = self
            .versions
            .version
            .iter()
            .chain(self.release.iter())
            .filter(|v| !is_snapshot(v))
            .cloned()
            .collect();
        if let Some(release) = max_version(releases.iter()) {
            self.release = Some(release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTRAL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.example</groupId>
  <artifactId>app</artifactId>
  <versioning>
    <latest>1.1</latest>
    <release>1.1</release>
    <versions>
      <version>1.0</version>
      <version>1.1</version>
    </versions>
    <lastUpdated>20240101000000</lastUpdated>
  </versioning>
</metadata>
"#;

    const MIRROR: &str = r#"<metadata>
  <groupId>org.example</groupId>
  <artifactId>app</artifactId>
  <versioning>
    <versions>
      <version>1.1</version>
      <version>1.2-SNAPSHOT</version>
      <version>1.0.1</version>
    </versions>
    <lastUpdated>20240301000000</lastUpdated>
  </versioning>
</metadata>"#;

    #[test]
    fn test_parse() {
        let metadata = RepositoryMetadata::from_xml(CENTRAL).unwrap();
        assert_eq!(metadata.group_id.as_deref(), Some("org.example"));
        assert_eq!(metadata.versions(), ["1.0", "1.1"]);
        let versioning = metadata.versioning.unwrap();
        assert_eq!(versioning.release.as_deref(), Some("1.1"));
        assert_eq!(versioning.last_updated.as_deref(), Some("20240101000000"));
    }

    #[test]
    fn test_merge_is_union() {
        let mut merged = RepositoryMetadata::from_xml(CENTRAL).unwrap();
        merged.merge(&RepositoryMetadata::from_xml(MIRROR).unwrap());

        assert_eq!(merged.versions(), ["1.0", "1.0.1", "1.1", "1.2-SNAPSHOT"]);
        let versioning = merged.versioning.as_ref().unwrap();
        assert_eq!(versioning.latest.as_deref(), Some("1.2-SNAPSHOT"));
        assert_eq!(versioning.release.as_deref(), Some("1.1"));
        assert_eq!(versioning.last_updated.as_deref(), Some("20240301000000"));
    }

    #[test]
    fn test_merge_order_independent() {
        let mut left = RepositoryMetadata::from_xml(CENTRAL).unwrap();
        left.merge(&RepositoryMetadata::from_xml(MIRROR).unwrap());

        let mut right = RepositoryMetadata::from_xml(MIRROR).unwrap();
        right.merge(&RepositoryMetadata::from_xml(CENTRAL).unwrap());

        assert_eq!(left.versions(), right.versions());
        assert_eq!(
            left.versioning.as_ref().unwrap().release,
            right.versioning.as_ref().unwrap().release
        );
    }

    #[test]
    fn test_snapshot_merge_keeps_newest_build() {
        let mut ours = RepositoryMetadata {
            version: Some("1.0-SNAPSHOT".to_string()),
            versioning: Some(Versioning {
                snapshot: Some(Snapshot {
                    timestamp: Some("20240101.120000".to_string()),
                    build_number: Some(3),
                    local_copy: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let theirs = RepositoryMetadata {
            versioning: Some(Versioning {
                snapshot: Some(Snapshot {
                    timestamp: Some("20240102.080000".to_string()),
                    build_number: Some(1),
                    local_copy: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        ours.merge(&theirs);
        let snapshot = ours.versioning.unwrap().snapshot.unwrap();
        assert_eq!(snapshot.timestamp.as_deref(), Some("20240102.080000"));
        assert_eq!(snapshot.build_number, Some(1));
    }

    #[test]
    fn test_xml_output_parses_back() {
        let mut metadata = RepositoryMetadata::from_xml(CENTRAL).unwrap();
        metadata.plugins.plugin.push(Plugin {
            name: Some("Demo Plugin".to_string()),
            prefix: "demo".to_string(),
            artifact_id: "demo-maven-plugin".to_string(),
        });
        let xml = metadata.to_xml().unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<version>1.1</version>"));
        assert!(xml.contains("<prefix>demo</prefix>"));

        let parsed = RepositoryMetadata::from_xml(&xml).unwrap();
        assert_eq!(parsed, metadata);
    }

    #[test]
    fn test_add_version() {
        let mut metadata = RepositoryMetadata::default();
        metadata.add_version("2.0");
        metadata.add_version("1.5");
        metadata.add_version("2.0");
        assert_eq!(metadata.versions(), ["1.5", "2.0"]);
        assert_eq!(
            metadata.versioning.unwrap().latest.as_deref(),
            Some("2.0")
        );
    }
}
