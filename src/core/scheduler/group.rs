//! Staged task groups
//!
//! A [`TaskGroup`] composes tasks into numbered stages. Tasks sharing a stage
//! run together; stage N+1 is admitted only once every task in stage N
//! reports finished. Stage numbers come from the order of `add_sequential`
//! and `add_parallel` calls:
//!
//! ```text
//! add_sequential(a)   stage 0
//! add_parallel(b)     stage 0
//! add_sequential(c)   stage 1
//! add_parallel(d)     stage 1
//! add_sequential(e)   stage 2
//! ```
//!
//! The first task of an empty group always lands in stage 0, whichever method
//! adds it. An empty group cannot be admitted.
//!
//! # Stalled stages
//!
//! A stage only completes when each of its tasks reports finished. A member
//! whose `initialize()` failed, or that was evicted by another task, never
//! runs again and so never reports finished: the group stays on that stage
//! until [`Scheduler::cancel_group`] releases it. Admission failures show up
//! in the tick report's faults with the group as their source.

use super::error::SchedulerError;
use super::registry::Scheduler;
use super::types::{Fault, TaskId};

/// Outcome of admitting one stage of a group
#[derive(Debug, Default)]
pub(crate) struct StageAdmission {
    /// Stage that was admitted
    pub stage: u32,
    /// Finished tasks of the previous stage ended before the admission
    pub completed: Vec<TaskId>,
    /// Tasks that entered the active set
    pub admitted: Vec<TaskId>,
    /// Tasks the scheduler refused or whose `initialize()` failed
    pub failed: Vec<(TaskId, SchedulerError)>,
    /// `end()` failures of tasks evicted by the admitted stage
    pub eviction_faults: Vec<Fault>,
}

/// Ordered, staged composition of tasks
///
/// Built by the caller with every task added up front, then handed to
/// [`Scheduler::admit_group`], which starts it. The scheduler advances it once
/// per tick until its final stage has finished.
///
/// A member that fails `initialize()` never reports finished, so the group
/// stalls on that member's stage; release it with
/// [`Scheduler::cancel_group`]. The same holds for a member evicted while its
/// stage is running.
///
/// # Example
///
/// ```rust
/// use pico_trail_command::core::scheduler::{Scheduler, TaskGroup};
/// use pico_trail_command::core::scheduler::tasks::WaitTicks;
///
/// let mut scheduler = Scheduler::new();
/// let drive = scheduler.add_task(WaitTicks::new(2));
/// let lift = scheduler.add_task(WaitTicks::new(1));
/// let score = scheduler.add_task(WaitTicks::new(1));
///
/// let mut auto = TaskGroup::new("auto");
/// auto.add_sequential(drive).add_parallel(lift).add_sequential(score);
/// assert_eq!(auto.last_stage(), Some(1));
///
/// let group = scheduler.admit_group(auto).unwrap();
/// assert!(scheduler.is_active(drive));
/// assert!(scheduler.is_active(lift));
/// assert!(!scheduler.is_active(score));
/// # let _ = group;
/// ```
#[derive(Debug, Clone)]
pub struct TaskGroup {
    name: &'static str,
    /// (stage, task) pairs; stage numbers never decrease along the list
    members: Vec<(u32, TaskId)>,
    current_stage: u32,
    next_stage: u32,
}

impl TaskGroup {
    /// Create an empty group
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            members: Vec::new(),
            current_stage: 0,
            next_stage: 0,
        }
    }

    /// Group name for logging
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Append `task` in a new stage after the last one
    pub fn add_sequential(&mut self, task: TaskId) -> &mut Self {
        let stage = self.last_stage().map_or(0, |last| last + 1);
        self.members.push((stage, task));
        self
    }

    /// Append `task` to the same stage as the most recently added task
    pub fn add_parallel(&mut self, task: TaskId) -> &mut Self {
        let stage = self.last_stage().unwrap_or(0);
        self.members.push((stage, task));
        self
    }

    /// Number of tasks in the group
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no tasks
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Final stage number, or `None` for an empty group
    pub fn last_stage(&self) -> Option<u32> {
        self.members.last().map(|(stage, _)| *stage)
    }

    /// Stage currently running (0 until the group is started)
    pub fn current_stage(&self) -> u32 {
        self.current_stage
    }

    /// Stage assigned to `task`, if it belongs to this group
    pub fn stage_of(&self, task: TaskId) -> Option<u32> {
        self.members
            .iter()
            .find(|(_, member)| *member == task)
            .map(|(stage, _)| *stage)
    }

    /// All tasks in insertion order
    pub fn tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.members.iter().map(|(_, task)| *task)
    }

    /// Tasks of the stages admitted so far (up to the current stage)
    pub(crate) fn started_tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        let current = self.current_stage;
        self.members
            .iter()
            .filter(move |(stage, _)| *stage <= current)
            .map(|(_, task)| *task)
    }

    /// Tasks assigned to `stage`
    pub fn stage_tasks(&self, stage: u32) -> impl Iterator<Item = TaskId> + '_ {
        self.members
            .iter()
            .filter(move |(s, _)| *s == stage)
            .map(|(_, task)| *task)
    }

    /// Whether every task of the current stage reports finished
    pub fn is_stage_complete(&self, scheduler: &Scheduler) -> bool {
        self.stage_tasks(self.current_stage)
            .all(|task| scheduler.reports_finished(task))
    }

    /// Whether the final stage is running and all of its tasks report finished
    ///
    /// An empty group has nothing left to do and reports finished.
    pub fn is_finished(&self, scheduler: &Scheduler) -> bool {
        match self.last_stage() {
            Some(last) => self.current_stage == last && self.is_stage_complete(scheduler),
            None => true,
        }
    }

    /// Admit stage 0
    pub(crate) fn start(&mut self, scheduler: &mut Scheduler) -> StageAdmission {
        self.current_stage = 0;
        self.next_stage = 0;
        let mut admission = StageAdmission::default();
        self.schedule_stage(scheduler, &mut admission);
        admission
    }

    /// Advance to the next stage if the current one is complete
    ///
    /// Tasks of the completed stage that are still in the active set are
    /// ended as completed before the next stage is admitted, so a later stage
    /// never evicts an earlier one. Returns `None` when the group stays on its
    /// current stage this tick.
    pub(crate) fn tick(&mut self, scheduler: &mut Scheduler) -> Option<StageAdmission> {
        let last = self.last_stage()?;
        if self.current_stage >= last || !self.is_stage_complete(scheduler) {
            return None;
        }

        let mut admission = StageAdmission::default();
        let finished: Vec<TaskId> = self.stage_tasks(self.current_stage).collect();
        for task in finished {
            match scheduler.retire_finished(task) {
                Some(Ok(())) => admission.completed.push(task),
                Some(Err(e)) => {
                    admission.completed.push(task);
                    admission.failed.push((task, e));
                }
                None => {}
            }
        }

        self.schedule_stage(scheduler, &mut admission);
        Some(admission)
    }

    fn schedule_stage(&mut self, scheduler: &mut Scheduler, admission: &mut StageAdmission) {
        let stage = self.next_stage;
        let tasks: Vec<TaskId> = self.stage_tasks(stage).collect();
        admission.stage = stage;

        for task in tasks {
            match scheduler.admit_task(task) {
                Ok(result) => {
                    admission.admitted.push(task);
                    admission.eviction_faults.extend(result.faults);
                }
                Err(e) => admission.failed.push((task, e)),
            }
        }

        self.current_stage = stage;
        self.next_stage = stage + 1;
    }
}
