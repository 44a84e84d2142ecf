//! Error propagation policies and the per-connector decision table

use super::PolicyOption;

/// What a download error on one connector means for the whole fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropagateErrorsOption {
    /// Abort the fetch immediately
    Stop,
    /// Remember the error, try the next connector, report if nothing succeeds
    #[default]
    Queue,
    /// Drop the error
    Ignore,
}

impl PolicyOption for PropagateErrorsOption {
    const OPTIONS: &'static [Self] = &[Self::Stop, Self::Queue, Self::Ignore];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Queue => "queue",
            Self::Ignore => "ignore",
        }
    }
}

/// Whether errors propagate when a local copy already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnUpdateOption {
    /// Propagate regardless of the local copy
    Always,
    /// Propagate only when nothing is available locally
    #[default]
    NotPresent,
}

impl PolicyOption for OnUpdateOption {
    const OPTIONS: &'static [Self] = &[Self::Always, Self::NotPresent];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::NotPresent => "not-present",
        }
    }
}

/// Outcome of the error decision table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDecision {
    /// Abort the fetch with a download error
    Abort,
    /// Record the error and try the next connector
    Queue,
    /// Forget any error recorded for this remote and try the next connector
    Skip,
}

/// Decide what to do with a failed connector.
///
/// Every error policy must approve propagation: `stop` and `queue` approve,
/// `ignore` vetoes; `always` approves, `not-present` approves only when there
/// is no local copy.
pub fn decide_on_error(
    propagate: PropagateErrorsOption,
    on_update: OnUpdateOption,
    local_exists: bool,
) -> ErrorDecision {
    let propagate_approves = propagate != PropagateErrorsOption::Ignore;
    let on_update_approves = match on_update {
        OnUpdateOption::Always => true,
        OnUpdateOption::NotPresent => !local_exists,
    };

    if !(propagate_approves && on_update_approves) {
        return ErrorDecision::Skip;
    }

    match propagate {
        PropagateErrorsOption::Queue => ErrorDecision::Queue,
        _ => ErrorDecision::Abort,
    }
}

/// What a "not modified" answer means for the remaining connectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotModifiedDecision {
    /// Ask the next connector
    Continue,
    /// Keep the local copy and stop
    Stop,
}

pub fn decide_on_not_modified(on_update: OnUpdateOption) -> NotModifiedDecision {
    match on_update {
        OnUpdateOption::Always => NotModifiedDecision::Continue,
        OnUpdateOption::NotPresent => NotModifiedDecision::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ErrorDecision::*;
    use OnUpdateOption::*;
    use PropagateErrorsOption::{Ignore, Queue as QueueOption, Stop};

    #[test]
    fn test_decision_table() {
        let table = [
            (Stop, Always, false, Abort),
            (Stop, Always, true, Abort),
            (Stop, NotPresent, false, Abort),
            (Stop, NotPresent, true, Skip),
            (QueueOption, Always, false, Queue),
            (QueueOption, Always, true, Queue),
            (QueueOption, NotPresent, false, Queue),
            (QueueOption, NotPresent, true, Skip),
            (Ignore, Always, false, Skip),
            (Ignore, Always, true, Skip),
            (Ignore, NotPresent, false, Skip),
            (Ignore, NotPresent, true, Skip),
        ];

        for (propagate, on_update, local_exists, expected) in table {
            assert_eq!(
                decide_on_error(propagate, on_update, local_exists),
                expected,
                "{:?}/{:?}/local={}",
                propagate,
                on_update,
                local_exists
            );
        }
    }

    #[test]
    fn test_not_modified() {
        assert_eq!(decide_on_not_modified(Always), NotModifiedDecision::Continue);
        assert_eq!(
            decide_on_not_modified(NotPresent),
            NotModifiedDecision::Stop
        );
    }
}
