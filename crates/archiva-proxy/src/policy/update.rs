//! Release and snapshot update policies
//!
//! Both policies decide whether an artifact that may already exist locally
//! should be requested again. The releases policy only looks at release
//! versions and the snapshots policy only at snapshot versions; requests that
//! are not for an artifact are always admitted.

use std::path::Path;
use std::time::{Duration, SystemTime};

use archiva_core::is_snapshot;

use super::{PolicyId, PolicyOption, PolicyViolation};

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateOption {
    /// Policy disabled, always admit
    Ignore,
    /// Always check the remote
    #[default]
    Always,
    /// Check once the local copy is a day old
    Daily,
    /// Check once the local copy is an hour old
    Hourly,
    /// Fetch only when no local copy exists
    Once,
    /// Never fetch
    Never,
}

impl PolicyOption for UpdateOption {
    const OPTIONS: &'static [Self] = &[
        Self::Ignore,
        Self::Always,
        Self::Daily,
        Self::Hourly,
        Self::Once,
        Self::Never,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Always => "always",
            Self::Daily => "daily",
            Self::Hourly => "hourly",
            Self::Once => "once",
            Self::Never => "never",
        }
    }
}

/// Apply the releases or snapshots policy.
///
/// `version` is the requested artifact version, or `None` for requests that
/// do not address an artifact.
pub fn apply_update_policy(
    policy: PolicyId,
    option: UpdateOption,
    version: Option<&str>,
    path: &str,
    local_file: &Path,
) -> Result<(), PolicyViolation> {
    if matches!(option, UpdateOption::Always | UpdateOption::Ignore) {
        return Ok(());
    }

    let Some(version) = version else {
        return Ok(());
    };

    let applies = match policy {
        PolicyId::Releases => !is_snapshot(version),
        PolicyId::Snapshots => is_snapshot(version),
        _ => false,
    };
    if !applies {
        return Ok(());
    }

    let violation = |reason: &str| PolicyViolation::new(policy, path, reason);

    if option == UpdateOption::Never {
        return Err(violation("updates are disabled (never)"));
    }

    let Ok(metadata) = std::fs::metadata(local_file) else {
        // Nothing local yet: always fetch
        return Ok(());
    };

    let interval = match option {
        UpdateOption::Once => return Err(violation("already present locally (once)")),
        UpdateOption::Daily => DAY,
        UpdateOption::Hourly => HOUR,
        _ => return Ok(()),
    };

    let age = metadata
        .modified()
        .ok()
        .and_then(|m| SystemTime::now().duration_since(m).ok())
        .unwrap_or(Duration::ZERO);
    if age < interval {
        return Err(violation(&format!(
            "local copy is newer than the {} interval",
            option.as_str()
        )));
    }

    Ok(())
}
