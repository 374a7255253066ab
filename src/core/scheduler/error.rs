//! Scheduler error types
//!
//! [`HookError`] is what task and subsystem hooks return. [`SchedulerError`]
//! is what the scheduler returns for admission-time misuse and what it records
//! in a [`TickReport`](super::TickReport) when it isolates a faulting hook.

use super::types::{GroupId, Hook, SubsystemId, TaskId};

/// Failure reported by a task or subsystem hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HookError {
    /// Generic failure with a reason
    #[error("{0}")]
    Failed(&'static str),

    /// Actuator or sensor refused the command
    #[error("hardware fault: {0}")]
    Hardware(&'static str),

    /// A shared resource was in use and the hook could not proceed
    #[error("resource busy: {0}")]
    Busy(&'static str),
}

/// Errors returned by scheduler operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerError {
    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("Unknown subsystem: {0}")]
    UnknownSubsystem(SubsystemId),

    #[error("Unknown group: {0}")]
    UnknownGroup(GroupId),

    /// Requirements may only be declared before the first admission
    #[error("Requirements of {0} are locked after admission")]
    RequirementsLocked(TaskId),

    #[error("Task already active: {0}")]
    AlreadyActive(TaskId),

    #[error("Task group has no tasks")]
    EmptyGroup,

    #[error("Task appears more than once in group: {0}")]
    DuplicateGroupMember(TaskId),

    #[error("Subsystem is borrowed elsewhere: {0}")]
    SubsystemBusy(SubsystemId),

    #[error("{hook} hook of '{name}' failed: {source}")]
    HookFailed {
        name: &'static str,
        hook: Hook,
        source: HookError,
    },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_error_display() {
        assert_eq!(HookError::Failed("stalled").to_string(), "stalled");
        assert_eq!(
            HookError::Hardware("encoder").to_string(),
            "hardware fault: encoder"
        );
    }

    #[test]
    fn test_hook_failed_display() {
        let err = SchedulerError::HookFailed {
            name: "drive_forward",
            hook: Hook::Execute,
            source: HookError::Failed("motor stalled"),
        };
        assert_eq!(
            err.to_string(),
            "execute hook of 'drive_forward' failed: motor stalled"
        );
    }

    #[test]
    fn test_hook_failed_source() {
        use std::error::Error;

        let err = SchedulerError::HookFailed {
            name: "lift",
            hook: Hook::Initialize,
            source: HookError::Busy("arm"),
        };
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("resource busy: arm"));
    }
}
