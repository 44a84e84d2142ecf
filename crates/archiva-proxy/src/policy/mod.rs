//! Fetch policies
//!
//! Every proxy connector carries one option per policy. Options are plain
//! strings in configuration; they are resolved once into typed values and
//! missing or unknown entries fall back to the policy default.
//!
//! Pre-download policies (`releases`, `snapshots`, `cache-failures`) gate the
//! network call, the post-download `checksum` policy validates what arrived,
//! and the two error policies decide what a failed connector means for the
//! whole fetch.

mod cached_failures;
mod checksum;
mod propagate;
mod update;

pub use cached_failures::{CacheFailuresOption, apply_cache_failures_policy};
pub use checksum::{ChecksumOption, apply_checksum_policy};
pub use propagate::{
    ErrorDecision, NotModifiedDecision, OnUpdateOption, PropagateErrorsOption, decide_on_error,
    decide_on_not_modified,
};
pub use update::{UpdateOption, apply_update_policy};

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Policy identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyId {
    Checksum,
    Releases,
    Snapshots,
    CacheFailures,
    PropagateErrors,
    PropagateErrorsOnUpdate,
}

impl PolicyId {
    pub const ALL: [PolicyId; 6] = [
        PolicyId::Checksum,
        PolicyId::Releases,
        PolicyId::Snapshots,
        PolicyId::CacheFailures,
        PolicyId::PropagateErrors,
        PolicyId::PropagateErrorsOnUpdate,
    ];

    /// Id used in connector configuration
    pub fn id(&self) -> &'static str {
        match self {
            PolicyId::Checksum => "checksum",
            PolicyId::Releases => "releases",
            PolicyId::Snapshots => "snapshots",
            PolicyId::CacheFailures => "cache-failures",
            PolicyId::PropagateErrors => "propagate-errors",
            PolicyId::PropagateErrorsOnUpdate => "propagate-errors-on-update",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id)
    }

    /// Accepted option strings
    pub fn options(&self) -> Vec<&'static str> {
        match self {
            PolicyId::Checksum => option_strings::<ChecksumOption>(),
            PolicyId::Releases | PolicyId::Snapshots => option_strings::<UpdateOption>(),
            PolicyId::CacheFailures => option_strings::<CacheFailuresOption>(),
            PolicyId::PropagateErrors => option_strings::<PropagateErrorsOption>(),
            PolicyId::PropagateErrorsOnUpdate => option_strings::<OnUpdateOption>(),
        }
    }

    /// Option used when a connector has no entry for this policy
    pub fn default_option(&self) -> &'static str {
        match self {
            PolicyId::Checksum => ChecksumOption::default().as_str(),
            PolicyId::Releases | PolicyId::Snapshots => UpdateOption::default().as_str(),
            PolicyId::CacheFailures => CacheFailuresOption::default().as_str(),
            PolicyId::PropagateErrors => PropagateErrorsOption::default().as_str(),
            PolicyId::PropagateErrorsOnUpdate => OnUpdateOption::default().as_str(),
        }
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A typed policy option
pub trait PolicyOption: Copy + Default + Sized + 'static {
    /// Every option, in documentation order
    const OPTIONS: &'static [Self];

    fn as_str(&self) -> &'static str;

    fn parse(value: &str) -> Option<Self> {
        Self::OPTIONS
            .iter()
            .copied()
            .find(|o| o.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

fn option_strings<O: PolicyOption>() -> Vec<&'static str> {
    O::OPTIONS.iter().map(|o| o.as_str()).collect()
}

/// A policy refused a fetch attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{policy} policy rejected {path}: {reason}")]
pub struct PolicyViolation {
    pub policy: PolicyId,
    pub path: String,
    pub reason: String,
}

impl PolicyViolation {
    pub fn new(policy: PolicyId, path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            policy,
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Resolved policy options of one connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectorPolicies {
    pub checksum: ChecksumOption,
    pub releases: UpdateOption,
    pub snapshots: UpdateOption,
    pub cache_failures: CacheFailuresOption,
    pub propagate_errors: PropagateErrorsOption,
    pub propagate_errors_on_update: OnUpdateOption,
}

impl ConnectorPolicies {
    /// Resolve configured option strings.
    ///
    /// Never fails: unknown policies and options are reported in the returned
    /// list and the affected policy keeps its default.
    pub fn resolve(configured: &BTreeMap<String, String>) -> (Self, Vec<String>) {
        let mut policies = Self::default();
        let mut problems = Vec::new();

        for (key, value) in configured {
            let Some(policy) = PolicyId::from_id(key) else {
                problems.push(format!("unknown policy '{}'", key));
                continue;
            };
            match policy {
                PolicyId::Checksum => parse_into(policy, value, &mut policies.checksum, &mut problems),
                PolicyId::Releases => parse_into(policy, value, &mut policies.releases, &mut problems),
                PolicyId::Snapshots => {
                    parse_into(policy, value, &mut policies.snapshots, &mut problems)
                }
                PolicyId::CacheFailures => {
                    parse_into(policy, value, &mut policies.cache_failures, &mut problems)
                }
                PolicyId::PropagateErrors => {
                    parse_into(policy, value, &mut policies.propagate_errors, &mut problems)
                }
                PolicyId::PropagateErrorsOnUpdate => parse_into(
                    policy,
                    value,
                    &mut policies.propagate_errors_on_update,
                    &mut problems,
                ),
            }
        }

        (policies, problems)
    }

    /// Effective option string for a policy
    pub fn option(&self, policy: PolicyId) -> &'static str {
        match policy {
            PolicyId::Checksum => self.checksum.as_str(),
            PolicyId::Releases => self.releases.as_str(),
            PolicyId::Snapshots => self.snapshots.as_str(),
            PolicyId::CacheFailures => self.cache_failures.as_str(),
            PolicyId::PropagateErrors => self.propagate_errors.as_str(),
            PolicyId::PropagateErrorsOnUpdate => self.propagate_errors_on_update.as_str(),
        }
    }
}

fn parse_into<O: PolicyOption>(
    policy: PolicyId,
    value: &str,
    slot: &mut O,
    problems: &mut Vec<String>,
) {
    match O::parse(value) {
        Some(option) => *slot = option,
        None => problems.push(format!(
            "invalid option '{}' for policy '{}' (expected one of: {})",
            value,
            policy,
            policy.options().join(", ")
        )),
    }
}
