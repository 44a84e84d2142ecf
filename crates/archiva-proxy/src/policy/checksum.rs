//! Checksum policy, applied to a freshly downloaded file

use std::path::Path;

use archiva_core::checksum::{ChecksumAlgorithm, ChecksummedFile};

use super::{PolicyId, PolicyOption, PolicyViolation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumOption {
    /// Reject content unless its checksum files exist and match
    Fail,
    /// Rewrite checksum files from the content
    #[default]
    Fix,
    /// Skip validation
    Ignore,
}

impl PolicyOption for ChecksumOption {
    const OPTIONS: &'static [Self] = &[Self::Fail, Self::Fix, Self::Ignore];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Fix => "fix",
            Self::Ignore => "ignore",
        }
    }
}

/// Validate or repair the checksums of `local_file`.
///
/// Under `fail`, a file without valid checksums is deleted together with its
/// checksum files before the violation is returned.
pub fn apply_checksum_policy(
    option: ChecksumOption,
    path: &str,
    local_file: &Path,
) -> Result<(), PolicyViolation> {
    let violation = |reason: String| PolicyViolation::new(PolicyId::Checksum, path, reason);

    if option == ChecksumOption::Ignore {
        return Ok(());
    }

    if !local_file.is_file() {
        return Err(violation(format!(
            "local file {} does not exist",
            local_file.display()
        )));
    }

    let checksummed = ChecksummedFile::new(local_file);
    match option {
        ChecksumOption::Fail => {
            let valid = checksummed
                .is_valid_checksums(&ChecksumAlgorithm::PROXIED)
                .map_err(|e| violation(e.to_string()))?;
            if valid {
                return Ok(());
            }

            if let Err(e) = checksummed.remove_checksums() {
                tracing::warn!("Could not remove checksums of {}: {}", path, e);
            }
            if let Err(e) = std::fs::remove_file(local_file) {
                tracing::warn!("Could not remove {}: {}", local_file.display(), e);
            }
            Err(violation(
                "checksums are missing or do not match the content".to_string(),
            ))
        }
        ChecksumOption::Fix => checksummed
            .fix_checksums(&ChecksumAlgorithm::PROXIED)
            .map_err(|e| violation(format!("unable to fix checksums: {}", e))),
        ChecksumOption::Ignore => Ok(()),
    }
}
