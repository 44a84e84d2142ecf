//! Cached failures policy

use crate::failure_cache::FailureCache;

use super::{PolicyId, PolicyOption, PolicyViolation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheFailuresOption {
    /// Do not retry a URL that failed recently
    #[default]
    Cache,
    /// Always retry
    NoCache,
}

impl PolicyOption for CacheFailuresOption {
    const OPTIONS: &'static [Self] = &[Self::Cache, Self::NoCache];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::NoCache => "no-cache",
        }
    }
}

/// Refuse URLs with a recent cached failure
pub fn apply_cache_failures_policy(
    option: CacheFailuresOption,
    path: &str,
    url: &str,
    cache: &FailureCache,
) -> Result<(), PolicyViolation> {
    if option == CacheFailuresOption::Cache && cache.has_failed_before(url) {
        return Err(PolicyViolation::new(
            PolicyId::CacheFailures,
            path,
            format!("{} failed recently", url),
        ));
    }
    Ok(())
}
