//! Core types for the command scheduler
//!
//! This module defines the fundamental types shared by the scheduler:
//! - Handles for tasks, subsystems and groups (arena indices)
//! - Task lifecycle status and end reasons
//! - Runtime statistics (per task and global)
//! - The admission result returned by [`Scheduler::admit_task`]
//! - The per-tick report returned by [`Scheduler::tick`]
//!
//! [`Scheduler::admit_task`]: super::Scheduler::admit_task
//! [`Scheduler::tick`]: super::Scheduler::tick

use std::fmt;

use super::error::SchedulerError;

/// Handle to a task stored in the scheduler
///
/// Returned by [`Scheduler::add_task`](super::Scheduler::add_task). Handles are
/// only meaningful for the scheduler that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskId(pub(crate) usize);

/// Handle to a registered subsystem
///
/// Ids are assigned in registration order, which is also the order in which
/// `periodic()` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubsystemId(pub(crate) usize);

/// Handle to an admitted task group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GroupId(pub(crate) usize);

impl TaskId {
    /// Arena index of this task
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl SubsystemId {
    /// Registration index of this subsystem
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl GroupId {
    /// Arena index of this group
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

impl fmt::Display for SubsystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subsystem#{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Lifecycle status of a task
///
/// ```text
/// Pending --admit--> Active --is_finished--> Finished
///                      |----cancel--------> Cancelled
///                      |----evicted-------> Evicted
///                      '----hook fault----> Faulted
/// ```
///
/// Any status other than `Active` may be admitted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskStatus {
    /// Created but never admitted; requirements may still be declared
    Pending,
    /// In the active set, receiving `execute()` once per tick
    Active,
    /// Left the active set after `is_finished()` returned true
    Finished,
    /// Removed by an explicit cancel
    Cancelled,
    /// Displaced by a newer task requiring one of its subsystems
    Evicted,
    /// Removed because one of its hooks returned an error
    Faulted,
}

impl TaskStatus {
    /// Whether the task is in the active set
    pub const fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Active)
    }

    /// Whether the task has ever been admitted
    pub const fn was_admitted(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

/// Why a task left the active set, passed to [`Task::end`](super::Task::end)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndReason {
    /// `is_finished()` returned true at the start of a tick
    Completed,
    /// Explicit [`Scheduler::cancel`](super::Scheduler::cancel)
    Cancelled,
    /// A newly admitted task claimed one of its subsystems
    Evicted,
    /// One of its own hooks failed
    Faulted,
}

impl EndReason {
    /// Status recorded for a task that ended for this reason
    pub const fn status(&self) -> TaskStatus {
        match self {
            EndReason::Completed => TaskStatus::Finished,
            EndReason::Cancelled => TaskStatus::Cancelled,
            EndReason::Evicted => TaskStatus::Evicted,
            EndReason::Faulted => TaskStatus::Faulted,
        }
    }
}

/// Lifecycle hook names, used when reporting faults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Hook {
    Initialize,
    Execute,
    End,
    Periodic,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::Initialize => "initialize",
            Hook::Execute => "execute",
            Hook::End => "end",
            Hook::Periodic => "periodic",
        };
        f.write_str(name)
    }
}

/// Runtime statistics for a single task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// Number of times the task entered the active set
    pub admissions: u32,

    /// Total `execute()` calls
    pub executions: u64,

    /// Total `end()` calls
    pub ends: u32,
}

/// Global scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Completed `tick()` passes
    pub ticks: u64,

    /// Task admissions (including group stage admissions)
    pub admissions: u64,

    /// Tasks that left the active set through `is_finished()`
    pub completions: u64,

    /// Explicit cancellations of active tasks
    pub cancellations: u64,

    /// Tasks displaced by conflict resolution
    pub evictions: u64,

    /// Total `execute()` calls across all tasks
    pub executions: u64,

    /// Hook faults isolated by the scheduler
    pub faults: u64,
}

impl SchedulerStats {
    /// Reset all statistics to initial state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Origin of a fault recorded during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSource {
    Task(TaskId),
    Subsystem(SubsystemId),
    Group(GroupId),
}

/// A fault isolated by the scheduler during a tick
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    /// Entity whose processing failed
    pub source: FaultSource,
    /// What went wrong
    pub error: SchedulerError,
}

/// Outcome of a successful task admission
///
/// The task is in the active set. `evicted` lists the tasks it displaced, in
/// eviction order; `faults` holds the `end()` failures of those tasks, which
/// do not undo the admission.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    /// The admitted task
    pub task: TaskId,
    /// Tasks displaced by conflict resolution
    pub evicted: Vec<TaskId>,
    /// `end()` failures of evicted tasks
    pub faults: Vec<Fault>,
}

impl Admission {
    pub(crate) fn new(task: TaskId) -> Self {
        Self {
            task,
            evicted: Vec::new(),
            faults: Vec::new(),
        }
    }

    /// Whether every evicted task ended without error
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

/// Summary of one `tick()` pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Tick number (1-based)
    pub tick: u64,

    /// Tasks that finished naturally this tick
    pub completed: Vec<TaskId>,

    /// Tasks admitted this tick, by group stage advancement or through an
    /// [`Admitter`](super::Admitter)
    pub admitted: Vec<TaskId>,

    /// Groups removed from the active set this tick
    pub finished_groups: Vec<GroupId>,

    /// Faults isolated this tick
    pub faults: Vec<Fault>,
}

impl TickReport {
    pub(crate) fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Default::default()
        }
    }

    /// Whether every hook ran without error this tick
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_reason_status_mapping() {
        assert_eq!(EndReason::Completed.status(), TaskStatus::Finished);
        assert_eq!(EndReason::Cancelled.status(), TaskStatus::Cancelled);
        assert_eq!(EndReason::Evicted.status(), TaskStatus::Evicted);
        assert_eq!(EndReason::Faulted.status(), TaskStatus::Faulted);
    }

    #[test]
    fn test_task_status_predicates() {
        assert!(TaskStatus::Active.is_active());
        assert!(!TaskStatus::Finished.is_active());
        assert!(!TaskStatus::Pending.was_admitted());
        assert!(TaskStatus::Evicted.was_admitted());
    }

    #[test]
    fn test_id_display() {
        assert_eq!(TaskId(3).to_string(), "task#3");
        assert_eq!(SubsystemId(0).to_string(), "subsystem#0");
        assert_eq!(GroupId(1).to_string(), "group#1");
        assert_eq!(Hook::Periodic.to_string(), "periodic");
    }

    #[test]
    fn test_scheduler_stats_reset() {
        let mut stats = SchedulerStats {
            ticks: 10,
            evictions: 2,
            ..Default::default()
        };
        stats.reset();
        assert_eq!(stats, SchedulerStats::default());
    }

    #[test]
    fn test_tick_report_clean() {
        let mut report = TickReport::new(1);
        assert!(report.is_clean());
        report.faults.push(Fault {
            source: FaultSource::Task(TaskId(0)),
            error: SchedulerError::UnknownTask(TaskId(0)),
        });
        assert!(!report.is_clean());
    }
}
