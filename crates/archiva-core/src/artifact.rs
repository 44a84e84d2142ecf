//! Artifact coordinates and version handling

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Suffix of a moving snapshot version
pub const SNAPSHOT: &str = "SNAPSHOT";

static TIMESTAMPED_SNAPSHOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*)-(\d{8}\.\d{6})-(\d+)$").expect("valid snapshot pattern"));

/// Coordinates of a single artifact file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactReference {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default)]
    pub classifier: Option<String>,
    /// Artifact type, used as the file extension by the default layout
    #[serde(default = "default_type")]
    pub r#type: String,
}

fn default_type() -> String {
    "jar".to_string()
}

impl ArtifactReference {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        r#type: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            classifier: None,
            r#type: r#type.into(),
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn is_snapshot(&self) -> bool {
        is_snapshot(&self.version)
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        write!(f, ":{}", self.r#type)
    }
}

/// Parses `group:artifact:version`, `group:artifact:version:type` or
/// `group:artifact:version:classifier:type`.
impl FromStr for ArtifactReference {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(CoreError::InvalidArtifactPath {
                path: s.to_string(),
            });
        }
        match parts.as_slice() {
            [g, a, v] => Ok(Self::new(*g, *a, *v, default_type())),
            [g, a, v, t] => Ok(Self::new(*g, *a, *v, *t)),
            [g, a, v, c, t] => Ok(Self::new(*g, *a, *v, *t).with_classifier(*c)),
            _ => Err(CoreError::InvalidArtifactPath {
                path: s.to_string(),
            }),
        }
    }
}

/// True for `-SNAPSHOT` versions and timestamped snapshot versions
pub fn is_snapshot(version: &str) -> bool {
    version.ends_with(SNAPSHOT) || TIMESTAMPED_SNAPSHOT.is_match(version)
}

/// `1.0-20240102.101010-3` becomes `1.0-SNAPSHOT`; other versions are unchanged
pub fn base_version(version: &str) -> String {
    match TIMESTAMPED_SNAPSHOT.captures(version) {
        Some(caps) => format!("{}-{}", &caps[1], SNAPSHOT),
        None => version.to_string(),
    }
}

/// Splits a timestamped snapshot version into (timestamp, build number)
pub fn snapshot_timestamp(version: &str) -> Option<(String, u32)> {
    let caps = TIMESTAMPED_SNAPSHOT.captures(version)?;
    let build = caps[3].parse().ok()?;
    Some((caps[2].to_string(), build))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum VersionItem {
    Number(u64),
    Qualifier(String),
}

fn qualifier_rank(qualifier: &str) -> (u8, &str) {
    match qualifier {
        "alpha" | "a" => (0, ""),
        "beta" | "b" => (1, ""),
        "milestone" | "m" => (2, ""),
        "rc" | "cr" => (3, ""),
        "snapshot" => (4, ""),
        "" | "ga" | "final" | "release" => (5, ""),
        "sp" => (6, ""),
        other => (7, other),
    }
}

fn tokenize(version: &str) -> Vec<VersionItem> {
    let lower = version.to_lowercase();
    let mut items = Vec::new();
    for part in lower.split(['.', '-']) {
        let mut current = String::new();
        let mut digits = false;
        for ch in part.chars() {
            let is_digit = ch.is_ascii_digit();
            if !current.is_empty() && is_digit != digits {
                items.push(to_item(&current, digits));
                current.clear();
            }
            digits = is_digit;
            current.push(ch);
        }
        if !current.is_empty() {
            items.push(to_item(&current, digits));
        }
    }
    // Trailing zeros carry no ordering information: 1.0 == 1
    while matches!(items.last(), Some(VersionItem::Number(0))) {
        items.pop();
    }
    items
}

fn to_item(token: &str, digits: bool) -> VersionItem {
    if digits {
        token
            .parse()
            .map(VersionItem::Number)
            .unwrap_or_else(|_| VersionItem::Qualifier(token.to_string()))
    } else {
        VersionItem::Qualifier(token.to_string())
    }
}

fn compare_items(a: Option<&VersionItem>, b: Option<&VersionItem>) -> Ordering {
    use VersionItem::*;
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(Number(x)), Some(Number(y))) => x.cmp(y),
        (Some(Number(_)), Some(Qualifier(_))) => Ordering::Greater,
        (Some(Qualifier(_)), Some(Number(_))) => Ordering::Less,
        (Some(Qualifier(x)), Some(Qualifier(y))) => qualifier_rank(x).cmp(&qualifier_rank(y)),
        (None, Some(Number(y))) => 0u64.cmp(y),
        (Some(Number(x)), None) => x.cmp(&0),
        (None, Some(Qualifier(y))) => qualifier_rank("").cmp(&qualifier_rank(y)),
        (Some(Qualifier(x)), None) => qualifier_rank(x).cmp(&qualifier_rank("")),
    }
}

/// Orders versions the way Maven repositories do
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = tokenize(a);
    let right = tokenize(b);
    let len = left.len().max(right.len());
    for i in 0..len {
        let ord = compare_items(left.get(i), right.get(i));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        let r: ArtifactReference = "org.apache.maven:maven-core:3.0:jar".parse().unwrap();
        assert_eq!(r.group_id, "org.apache.maven");
        assert_eq!(r.artifact_id, "maven-core");
        assert_eq!(r.version, "3.0");
        assert_eq!(r.r#type, "jar");
        assert_eq!(r.classifier, None);

        let r: ArtifactReference = "g:a:1.0:sources:jar".parse().unwrap();
        assert_eq!(r.classifier.as_deref(), Some("sources"));
        assert_eq!(r.to_string(), "g:a:1.0:sources:jar");

        let r: ArtifactReference = "g:a:1.0".parse().unwrap();
        assert_eq!(r.r#type, "jar");

        assert!("g:a".parse::<ArtifactReference>().is_err());
        assert!("g::1.0".parse::<ArtifactReference>().is_err());
    }

    #[test]
    fn test_snapshot_detection() {
        assert!(is_snapshot("1.0-SNAPSHOT"));
        assert!(is_snapshot("1.0-20240102.101010-3"));
        assert!(!is_snapshot("1.0"));
        assert!(!is_snapshot("1.0-alpha-1"));
    }

    #[test]
    fn test_base_version() {
        assert_eq!(base_version("2.1-20240102.101010-3"), "2.1-SNAPSHOT");
        assert_eq!(base_version("2.1-SNAPSHOT"), "2.1-SNAPSHOT");
        assert_eq!(base_version("2.1"), "2.1");
        assert_eq!(
            snapshot_timestamp("2.1-20240102.101010-3"),
            Some(("20240102.101010".to_string(), 3))
        );
    }

    #[test]
    fn test_version_ordering() {
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0", "1.0.1"), Ordering::Less);
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.0-SNAPSHOT", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0-alpha-1", "1.0-beta-1"), Ordering::Less);
        assert_eq!(compare_versions("1.0-rc1", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0-sp1", "1.0"), Ordering::Greater);
        assert_eq!(compare_versions("2.0", "1.9.9"), Ordering::Greater);
    }
}
