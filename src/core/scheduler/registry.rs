//! Scheduler registry and run loop
//!
//! The scheduler owns three ordered collections: active tasks, registered
//! subsystems and active task groups. Tasks live in an arena and are
//! addressed by [`TaskId`]; subsystems are shared `Rc<RefCell<_>>` handles
//! addressed by [`SubsystemId`].
//!
//! # Conflict resolution
//!
//! Admission is last-writer-wins: for every subsystem the incoming task
//! requires, any active task requiring the same subsystem is evicted before
//! the new task is added and initialized. There is no queueing, backoff or
//! priority.
//!
//! # Tick
//!
//! Each [`Scheduler::tick`] runs three passes over snapshots of the
//! collections:
//!
//! 1. Active tasks, in admission order: if `is_finished()` the task ends and
//!    leaves the active set, otherwise `execute()` runs
//! 2. Subsystems, in registration order: `periodic()`
//! 3. Active groups: finished groups are removed, the rest may advance a stage
//!
//! # Faults
//!
//! A failing hook only affects its own task or subsystem. The task is ended
//! with [`EndReason::Faulted`] and removed, the fault is logged and recorded
//! in the [`TickReport`], and the pass continues with the next entity.
//! An evicted task whose `end()` fails is still evicted; the failure is
//! returned in the [`Admission`] (or the tick report, when the admission
//! happened during a tick).
//!
//! # Admission from hooks
//!
//! Hooks cannot call the scheduler directly. They queue work through an
//! [`Admitter`] obtained from [`Scheduler::admitter`], which `tick()` drains
//! between passes.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use super::admitter::Admitter;
use super::config::SchedulerConfig;
use super::error::{Result, SchedulerError};
use super::group::TaskGroup;
use super::subsystem::{identity, Subsystem, SubsystemHandle};
use super::task::{Task, TaskBuilder};
use super::types::{
    Admission, EndReason, Fault, FaultSource, GroupId, Hook, SchedulerStats, SubsystemId, TaskId,
    TaskStats, TaskStatus, TickReport,
};

/// Arena entry for a task
struct TaskSlot {
    task: Box<dyn Task>,
    /// Frozen once the task is first admitted
    requirements: Vec<SubsystemId>,
    status: TaskStatus,
    stats: TaskStats,
}

/// Registered subsystem
struct SubsystemEntry {
    /// `None` until the subsystem could be borrowed to ask its name
    name: Option<&'static str>,
    handle: SubsystemHandle,
}

impl SubsystemEntry {
    fn name(&self) -> &'static str {
        self.name.unwrap_or("subsystem")
    }
}

/// Arena entry for a group
///
/// `group` is `None` only while the group is being advanced.
struct GroupSlot {
    group: Option<TaskGroup>,
    active: bool,
}

/// Cooperative, tick-driven command scheduler
///
/// Owned by the application's control loop, which calls [`tick`](Self::tick)
/// once per control cycle. The scheduler has no clock; cadence is the
/// caller's business.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use pico_trail_command::core::scheduler::{Scheduler, Subsystem, TaskStatus};
/// use pico_trail_command::core::scheduler::tasks::WaitTicks;
///
/// struct Intake;
/// impl Subsystem for Intake {
///     fn name(&self) -> &'static str {
///         "intake"
///     }
/// }
///
/// let mut scheduler = Scheduler::new();
/// let intake = scheduler.register_subsystem(&Rc::new(RefCell::new(Intake)));
///
/// let first = scheduler.task(WaitTicks::new(10)).requires(intake).admit().unwrap().task;
/// let second = scheduler.task(WaitTicks::new(10)).requires(intake).admit().unwrap().task;
///
/// // last writer wins
/// assert_eq!(scheduler.status(first), Some(TaskStatus::Evicted));
/// assert_eq!(scheduler.owner_of(intake), Some(second));
/// ```
pub struct Scheduler {
    config: SchedulerConfig,
    tasks: Vec<TaskSlot>,
    /// Active tasks in admission order
    active: Vec<TaskId>,
    /// Registered subsystems in registration order
    subsystems: Vec<SubsystemEntry>,
    groups: Vec<GroupSlot>,
    /// Active groups in admission order
    active_groups: Vec<GroupId>,
    /// Admission requests queued from hooks
    admitter: Admitter,
    /// Faults raised outside `tick()`, reported by the next tick
    deferred_faults: Vec<Fault>,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Create a scheduler with the default configuration
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with an explicit configuration
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            tasks: Vec::new(),
            active: Vec::new(),
            subsystems: Vec::new(),
            groups: Vec::new(),
            active_groups: Vec::new(),
            admitter: Admitter::default(),
            deferred_faults: Vec::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Subsystems
    // ------------------------------------------------------------------

    /// Register a subsystem so it receives `periodic()` every tick
    ///
    /// Registration is idempotent: registering the same `Rc` again returns the
    /// id it already has and does not add a second entry.
    pub fn register_subsystem<S>(&mut self, subsystem: &Rc<RefCell<S>>) -> SubsystemId
    where
        S: Subsystem + 'static,
    {
        let key = identity(subsystem);
        if let Some(index) = self
            .subsystems
            .iter()
            .position(|entry| identity(&entry.handle) == key)
        {
            crate::log_debug!(
                "Subsystem '{}' already registered as {}",
                self.subsystems[index].name(),
                SubsystemId(index)
            );
            return SubsystemId(index);
        }

        // a subsystem borrowed elsewhere gets its name on the next successful borrow
        let name = subsystem.try_borrow().ok().map(|s| s.name());
        let handle: SubsystemHandle = subsystem.clone();
        let id = SubsystemId(self.subsystems.len());
        self.subsystems.push(SubsystemEntry { name, handle });

        crate::log_info!(
            "Registered subsystem '{}' as {}",
            self.subsystems[id.0].name(),
            id
        );
        id
    }

    /// Number of registered subsystems
    pub fn subsystem_count(&self) -> usize {
        self.subsystems.len()
    }

    /// Name of a registered subsystem
    ///
    /// If the subsystem was borrowed elsewhere when it was registered and has
    /// not been borrowed by the scheduler since, its name is looked up now.
    pub fn subsystem_name(&self, subsystem: SubsystemId) -> Option<&'static str> {
        let entry = self.subsystems.get(subsystem.0)?;
        let name = match entry.name {
            Some(name) => name,
            None => entry
                .handle
                .try_borrow()
                .map(|s| s.name())
                .unwrap_or("subsystem"),
        };
        Some(name)
    }

    /// Active task currently holding `subsystem`
    pub fn owner_of(&self, subsystem: SubsystemId) -> Option<TaskId> {
        self.active
            .iter()
            .copied()
            .find(|id| self.tasks[id.0].requirements.contains(&subsystem))
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Store a task without admitting it
    ///
    /// The task starts out [`TaskStatus::Pending`]; declare its requirements
    /// with [`requires`](Self::requires), then admit it.
    pub fn add_task<T>(&mut self, task: T) -> TaskId
    where
        T: Task + 'static,
    {
        let id = TaskId(self.tasks.len());
        self.tasks.push(TaskSlot {
            task: Box::new(task),
            requirements: Vec::new(),
            status: TaskStatus::Pending,
            stats: TaskStats::default(),
        });
        id
    }

    /// Store a task and return a builder for its requirements
    pub fn task<T>(&mut self, task: T) -> TaskBuilder<'_>
    where
        T: Task + 'static,
    {
        let id = self.add_task(task);
        TaskBuilder::new(self, id)
    }

    /// Declare that `task` needs exclusive use of `subsystem` while active
    ///
    /// # Errors
    ///
    /// - `UnknownTask` / `UnknownSubsystem` for foreign handles
    /// - `RequirementsLocked` once the task has been admitted
    pub fn requires(&mut self, task: TaskId, subsystem: SubsystemId) -> Result<()> {
        if subsystem.0 >= self.subsystems.len() {
            self.slot(task)?;
            return Err(SchedulerError::UnknownSubsystem(subsystem));
        }

        let slot = self.slot_mut(task)?;
        if slot.status.was_admitted() {
            return Err(SchedulerError::RequirementsLocked(task));
        }
        if !slot.requirements.contains(&subsystem) {
            slot.requirements.push(subsystem);
        }
        Ok(())
    }

    /// Subsystems `task` requires
    pub fn requirements(&self, task: TaskId) -> Option<&[SubsystemId]> {
        self.tasks.get(task.0).map(|slot| slot.requirements.as_slice())
    }

    /// Admit `task`: evict conflicting tasks, activate it, call `initialize()`
    ///
    /// Evictions take effect before this call returns. A task that has left
    /// the active set may be admitted again. The returned [`Admission`] lists
    /// the evicted tasks and any `end()` failures they reported.
    ///
    /// # Errors
    ///
    /// - `UnknownTask` for a foreign handle
    /// - `AlreadyActive` if the task is in the active set
    /// - `HookFailed` if `initialize()` fails; the task is ended with
    ///   [`EndReason::Faulted`] and left out of the active set (evictions
    ///   already made stand)
    pub fn admit_task(&mut self, task: TaskId) -> Result<Admission> {
        let slot = self.slot(task)?;
        if slot.status.is_active() {
            return Err(SchedulerError::AlreadyActive(task));
        }

        let mut admission = Admission::new(task);
        let requirements = slot.requirements.clone();
        for subsystem in requirements {
            let holders: Vec<TaskId> = self
                .active
                .iter()
                .copied()
                .filter(|id| self.tasks[id.0].requirements.contains(&subsystem))
                .collect();
            for holder in holders {
                admission.evicted.push(holder);
                if let Err(error) = self.evict(holder, task, subsystem) {
                    admission.faults.push(Fault {
                        source: FaultSource::Task(holder),
                        error,
                    });
                }
            }
        }

        self.active.push(task);
        self.stats.admissions += 1;
        let slot = &mut self.tasks[task.0];
        slot.status = TaskStatus::Active;
        slot.stats.admissions += 1;
        crate::log_debug!("Admitted '{}' ({})", slot.task.name(), task);

        if self.config.exceeds_cap(self.active.len()) {
            crate::log_warn!(
                "{} active tasks exceeds configured cap of {}",
                self.active.len(),
                self.config.max_active_tasks.unwrap_or_default()
            );
        }

        let slot = &mut self.tasks[task.0];
        if let Err(source) = slot.task.initialize() {
            let name = slot.task.name();
            self.stats.faults += 1;
            crate::log_error!("initialize hook of '{}' failed: {}", name, source);
            // end() failures are logged and counted by deactivate
            let _ = self.deactivate(task, EndReason::Faulted);
            return Err(SchedulerError::HookFailed {
                name,
                hook: Hook::Initialize,
                source,
            });
        }
        Ok(admission)
    }

    /// Handle for queueing admissions from inside task and subsystem hooks
    ///
    /// See [`Admitter`] for when queued requests are admitted.
    pub fn admitter(&self) -> Admitter {
        self.admitter.clone()
    }

    /// Cancel `task`: call `end()` and remove it from the active set
    ///
    /// Cancelling a task that is not active is a no-op. The cancellation takes
    /// effect even if `end()` fails; that failure is returned.
    pub fn cancel(&mut self, task: TaskId) -> Result<()> {
        let slot = self.slot(task)?;
        if !slot.status.is_active() {
            crate::log_debug!("Cancel of inactive {} ignored", task);
            return Ok(());
        }

        crate::log_info!("Cancelling '{}' ({})", slot.task.name(), task);
        self.stats.cancellations += 1;
        self.deactivate(task, EndReason::Cancelled)
    }

    /// Whether `task` is in the active set
    pub fn is_active(&self, task: TaskId) -> bool {
        self.tasks
            .get(task.0)
            .is_some_and(|slot| slot.status.is_active())
    }

    /// Lifecycle status of `task`
    pub fn status(&self, task: TaskId) -> Option<TaskStatus> {
        self.tasks.get(task.0).map(|slot| slot.status)
    }

    /// Name reported by `task`
    pub fn task_name(&self, task: TaskId) -> Option<&'static str> {
        self.tasks.get(task.0).map(|slot| slot.task.name())
    }

    /// Whether `task` itself reports finished (its `is_finished()` predicate)
    ///
    /// This polls the task regardless of whether it is active. Unknown handles
    /// report `false`.
    pub fn reports_finished(&self, task: TaskId) -> bool {
        self.tasks
            .get(task.0)
            .is_some_and(|slot| slot.task.is_finished())
    }

    /// End `task` as completed if it is active and reports finished
    ///
    /// Returns `None` when the task was left alone. The task leaves the active
    /// set even if its `end()` fails.
    pub(crate) fn retire_finished(&mut self, task: TaskId) -> Option<Result<()>> {
        if !self.is_active(task) || !self.reports_finished(task) {
            return None;
        }
        self.stats.completions += 1;
        crate::log_debug!("'{}' ({}) retired by its group", self.tasks[task.0].task.name(), task);
        Some(self.deactivate(task, EndReason::Completed))
    }

    /// Active tasks in admission order
    pub fn active_tasks(&self) -> &[TaskId] {
        &self.active
    }

    /// Per-task statistics
    pub fn task_stats(&self, task: TaskId) -> Option<TaskStats> {
        self.tasks.get(task.0).map(|slot| slot.stats)
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// Admit `group` and start it (admit its stage 0 tasks)
    ///
    /// Stage 0 tasks that fail to initialize are logged and the group stays
    /// active. Those failures, and `end()` failures of tasks stage 0 evicted,
    /// are reported in the faults of the next tick.
    ///
    /// # Errors
    ///
    /// - `EmptyGroup` if the group has no tasks
    /// - `UnknownTask` if a member is not stored in this scheduler
    /// - `DuplicateGroupMember` if a task appears twice
    /// - `AlreadyActive` if a member is already active
    pub fn admit_group(&mut self, mut group: TaskGroup) -> Result<GroupId> {
        if group.is_empty() {
            return Err(SchedulerError::EmptyGroup);
        }

        let mut seen = HashSet::with_capacity(group.len());
        for task in group.tasks() {
            let slot = self.slot(task)?;
            if !seen.insert(task) {
                return Err(SchedulerError::DuplicateGroupMember(task));
            }
            if slot.status.is_active() {
                return Err(SchedulerError::AlreadyActive(task));
            }
        }

        let id = GroupId(self.groups.len());
        self.groups.push(GroupSlot {
            group: None,
            active: true,
        });
        self.active_groups.push(id);

        crate::log_info!(
            "Starting group '{}' ({}) with {} tasks in {} stages",
            group.name(),
            id,
            group.len(),
            group.last_stage().map_or(0, |last| last + 1)
        );

        let admission = group.start(self);
        self.deferred_faults.extend(admission.eviction_faults);
        for (task, error) in admission.failed {
            crate::log_error!("Group {} could not admit {}: {}", id, task, error);
            self.deferred_faults.push(Fault {
                source: FaultSource::Group(id),
                error,
            });
        }

        self.groups[id.0].group = Some(group);
        Ok(id)
    }

    /// Remove `group` from the active set and cancel the members it started
    ///
    /// Only members of stages the group has already admitted (up to its
    /// current stage) are cancelled; later-stage members the caller admitted
    /// independently keep running. This is also how a stalled group is
    /// released, e.g. one whose member failed `initialize()` or was evicted
    /// and so never reports finished. A no-op for a group that already
    /// finished or was cancelled. Returns the first `end()` failure, after
    /// every member has been cancelled.
    pub fn cancel_group(&mut self, group: GroupId) -> Result<()> {
        let slot = self
            .groups
            .get_mut(group.0)
            .ok_or(SchedulerError::UnknownGroup(group))?;
        if !slot.active {
            return Ok(());
        }
        slot.active = false;
        self.active_groups.retain(|id| *id != group);

        let members: Vec<TaskId> = slot
            .group
            .as_ref()
            .map(|g| g.started_tasks().collect())
            .unwrap_or_default();

        crate::log_info!("Cancelling group {}", group);

        let mut result = Ok(());
        for task in members {
            if let Err(e) = self.cancel(task) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Whether `group` is still being advanced
    pub fn is_group_active(&self, group: GroupId) -> bool {
        self.groups.get(group.0).is_some_and(|slot| slot.active)
    }

    /// Inspect an admitted group
    pub fn group(&self, group: GroupId) -> Option<&TaskGroup> {
        self.groups.get(group.0).and_then(|slot| slot.group.as_ref())
    }

    /// Active groups in admission order
    pub fn active_groups(&self) -> &[GroupId] {
        &self.active_groups
    }

    // ------------------------------------------------------------------
    // Run loop
    // ------------------------------------------------------------------

    /// Advance every active task, subsystem and group exactly once
    pub fn tick(&mut self) -> TickReport {
        self.stats.ticks += 1;
        let mut report = TickReport::new(self.stats.ticks);
        report.faults.append(&mut self.deferred_faults);

        self.drain_requests(&mut report);
        self.run_tasks(&mut report);
        self.drain_requests(&mut report);
        self.run_subsystems(&mut report);
        self.drain_requests(&mut report);
        self.run_groups(&mut report);
        self.drain_requests(&mut report);

        crate::log_trace!(
            "Tick {}: {} active tasks, {} active groups, {} faults",
            report.tick,
            self.active.len(),
            self.active_groups.len(),
            report.faults.len()
        );
        report
    }

    /// Completed ticks
    pub fn tick_count(&self) -> u64 {
        self.stats.ticks
    }

    /// Global statistics
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    fn run_tasks(&mut self, report: &mut TickReport) {
        let snapshot = self.active.clone();
        for task in snapshot {
            if !self.is_active(task) {
                continue;
            }

            let slot = &mut self.tasks[task.0];
            if slot.task.is_finished() {
                self.stats.completions += 1;
                crate::log_debug!("'{}' ({}) finished", slot.task.name(), task);
                report.completed.push(task);
                if let Err(error) = self.deactivate(task, EndReason::Completed) {
                    report.faults.push(Fault {
                        source: FaultSource::Task(task),
                        error,
                    });
                }
                continue;
            }

            slot.stats.executions += 1;
            self.stats.executions += 1;
            if let Err(source) = slot.task.execute() {
                let name = slot.task.name();
                self.stats.faults += 1;
                crate::log_error!("execute hook of '{}' failed: {}", name, source);
                report.faults.push(Fault {
                    source: FaultSource::Task(task),
                    error: SchedulerError::HookFailed {
                        name,
                        hook: Hook::Execute,
                        source,
                    },
                });
                if let Err(error) = self.deactivate(task, EndReason::Faulted) {
                    report.faults.push(Fault {
                        source: FaultSource::Task(task),
                        error,
                    });
                }
            }
        }
    }

    fn run_subsystems(&mut self, report: &mut TickReport) {
        for (index, entry) in self.subsystems.iter_mut().enumerate() {
            let id = SubsystemId(index);
            let result = match entry.handle.try_borrow_mut() {
                Ok(mut subsystem) => {
                    let name = *entry.name.get_or_insert_with(|| subsystem.name());
                    subsystem
                        .periodic()
                        .map_err(|source| SchedulerError::HookFailed {
                            name,
                            hook: Hook::Periodic,
                            source,
                        })
                }
                Err(_) => Err(SchedulerError::SubsystemBusy(id)),
            };

            if let Err(error) = result {
                self.stats.faults += 1;
                crate::log_error!("Subsystem '{}' ({}): {}", entry.name(), id, error);
                report.faults.push(Fault {
                    source: FaultSource::Subsystem(id),
                    error,
                });
            }
        }
    }

    fn run_groups(&mut self, report: &mut TickReport) {
        let snapshot = self.active_groups.clone();
        for id in snapshot {
            let Some(mut group) = self.groups[id.0].group.take() else {
                continue;
            };

            if group.is_finished(self) {
                self.groups[id.0].active = false;
                self.active_groups.retain(|g| *g != id);
                report.finished_groups.push(id);
                crate::log_info!("Group '{}' ({}) finished", group.name(), id);
            } else if let Some(admission) = group.tick(self) {
                crate::log_debug!(
                    "Group '{}' ({}) advanced to stage {}",
                    group.name(),
                    id,
                    admission.stage
                );
                report.completed.extend(admission.completed);
                report.admitted.extend(admission.admitted);
                report.faults.extend(admission.eviction_faults);
                for (task, error) in admission.failed {
                    crate::log_error!("Group {} could not admit {}: {}", id, task, error);
                    report.faults.push(Fault {
                        source: FaultSource::Group(id),
                        error,
                    });
                }
            }

            self.groups[id.0].group = Some(group);
        }
    }

    /// Admit the requests queued through the admitter when this is called
    fn drain_requests(&mut self, report: &mut TickReport) {
        for task in self.admitter.take() {
            match self.admit_task(task) {
                Ok(admission) => {
                    crate::log_debug!("Admitted queued request for {}", task);
                    report.admitted.push(task);
                    report.faults.extend(admission.faults);
                }
                Err(error) => {
                    crate::log_warn!("Queued request for {} failed: {}", task, error);
                    report.faults.push(Fault {
                        source: FaultSource::Task(task),
                        error,
                    });
                }
            }
        }
    }

    /// Displace `holder` so `incoming` can take `subsystem`
    ///
    /// The holder leaves the active set whatever `end()` returns; an `end()`
    /// failure is handed back to the admission.
    fn evict(
        &mut self,
        holder: TaskId,
        incoming: TaskId,
        subsystem: SubsystemId,
    ) -> Result<()> {
        self.stats.evictions += 1;
        crate::log_warn!(
            "Evicting '{}' ({}): {} claimed by {}",
            self.tasks[holder.0].task.name(),
            holder,
            subsystem,
            incoming
        );

        if self.config.eviction.ends_evicted() {
            self.deactivate(holder, EndReason::Evicted)
        } else {
            self.active.retain(|id| *id != holder);
            self.tasks[holder.0].status = TaskStatus::Evicted;
            Ok(())
        }
    }

    /// Remove `task` from the active set and call `end(reason)`
    ///
    /// The transition happens whether or not `end()` succeeds.
    fn deactivate(&mut self, task: TaskId, reason: EndReason) -> Result<()> {
        self.active.retain(|id| *id != task);

        let slot = &mut self.tasks[task.0];
        slot.status = reason.status();
        slot.stats.ends += 1;

        match slot.task.end(reason) {
            Ok(()) => Ok(()),
            Err(source) => {
                let name = slot.task.name();
                self.stats.faults += 1;
                crate::log_error!("end hook of '{}' failed: {}", name, source);
                Err(SchedulerError::HookFailed {
                    name,
                    hook: Hook::End,
                    source,
                })
            }
        }
    }

    fn slot(&self, task: TaskId) -> Result<&TaskSlot> {
        self.tasks
            .get(task.0)
            .ok_or(SchedulerError::UnknownTask(task))
    }

    fn slot_mut(&mut self, task: TaskId) -> Result<&mut TaskSlot> {
        self.tasks
            .get_mut(task.0)
            .ok_or(SchedulerError::UnknownTask(task))
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
