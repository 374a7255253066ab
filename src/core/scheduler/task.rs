//! Task trait and task construction helpers
//!
//! A task is a short-lived unit of work (drive forward, raise the lift) with
//! an initialize/execute/is_finished/end lifecycle and a set of subsystems it
//! needs exclusive use of while active. The scheduler enforces exclusivity;
//! the task only declares its requirements, and only before it is admitted.

use super::error::{self, HookError, SchedulerError};
use super::registry::Scheduler;
use super::types::{Admission, EndReason, SubsystemId, TaskId};

/// Unit of work driven by the scheduler
///
/// # Lifecycle
///
/// 1. `initialize()` - Called once, synchronously, when the task is admitted
/// 2. `execute()` - Called once per tick while active
/// 3. `is_finished()` - Polled at the start of every tick; when it returns
///    true the task ends and `execute()` is not called on that tick
/// 4. `end(reason)` - Called once when the task leaves the active set,
///    whether it completed, was cancelled, or was evicted
///
/// Every method has a default, so a task only overrides the hooks it needs.
/// A task that never overrides `is_finished()` runs until it is cancelled or
/// evicted.
///
/// # Example
///
/// ```rust
/// use pico_trail_command::core::scheduler::{EndReason, HookError, Task};
///
/// struct Spin {
///     remaining: u32,
/// }
///
/// impl Task for Spin {
///     fn name(&self) -> &'static str {
///         "spin"
///     }
///
///     fn execute(&mut self) -> Result<(), HookError> {
///         self.remaining = self.remaining.saturating_sub(1);
///         Ok(())
///     }
///
///     fn is_finished(&self) -> bool {
///         self.remaining == 0
///     }
///
///     fn end(&mut self, _reason: EndReason) -> Result<(), HookError> {
///         // stop motors
///         Ok(())
///     }
/// }
/// ```
pub trait Task {
    /// Task name for logging and telemetry
    fn name(&self) -> &'static str {
        "task"
    }

    /// Prepare the task (called once on admission, before any `execute()`)
    ///
    /// Returning `Err` aborts the admission; the task is ended with
    /// [`EndReason::Faulted`].
    fn initialize(&mut self) -> Result<(), HookError> {
        Ok(())
    }

    /// Advance the task by one tick
    fn execute(&mut self) -> Result<(), HookError> {
        Ok(())
    }

    /// Whether the task has completed its work
    ///
    /// Must be free of side effects; the scheduler and task groups may poll
    /// it more than once per tick.
    fn is_finished(&self) -> bool {
        false
    }

    /// Release whatever the task holds (called once when leaving the active set)
    fn end(&mut self, reason: EndReason) -> Result<(), HookError> {
        let _ = reason;
        Ok(())
    }
}

impl<T: Task + ?Sized> Task for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn initialize(&mut self) -> Result<(), HookError> {
        (**self).initialize()
    }

    fn execute(&mut self) -> Result<(), HookError> {
        (**self).execute()
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }

    fn end(&mut self, reason: EndReason) -> Result<(), HookError> {
        (**self).end(reason)
    }
}

/// Chained construction of a task: declare requirements, then build or admit
///
/// Obtained from [`Scheduler::task`]. The first failing step is remembered and
/// reported by [`build`](Self::build) or [`admit`](Self::admit).
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use pico_trail_command::core::scheduler::{Scheduler, Subsystem};
/// use pico_trail_command::core::scheduler::tasks::WaitTicks;
///
/// struct Arm;
/// impl Subsystem for Arm {
///     fn name(&self) -> &'static str {
///         "arm"
///     }
/// }
///
/// let mut scheduler = Scheduler::new();
/// let arm = scheduler.register_subsystem(&Rc::new(RefCell::new(Arm)));
/// let hold = scheduler.task(WaitTicks::new(5)).requires(arm).admit().unwrap().task;
/// assert!(scheduler.is_active(hold));
/// ```
pub struct TaskBuilder<'a> {
    scheduler: &'a mut Scheduler,
    id: TaskId,
    error: Option<SchedulerError>,
}

impl<'a> TaskBuilder<'a> {
    pub(crate) fn new(scheduler: &'a mut Scheduler, id: TaskId) -> Self {
        Self {
            scheduler,
            id,
            error: None,
        }
    }

    /// Handle of the task being built
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Declare that the task needs exclusive use of `subsystem`
    pub fn requires(mut self, subsystem: SubsystemId) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.scheduler.requires(self.id, subsystem) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Finish declaring requirements without admitting the task
    pub fn build(self) -> error::Result<TaskId> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.id),
        }
    }

    /// Finish declaring requirements and admit the task
    ///
    /// See [`Scheduler::admit_task`] for the returned [`Admission`].
    pub fn admit(self) -> error::Result<Admission> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.scheduler.admit_task(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::TaskStatus;

    struct Defaults;

    impl Task for Defaults {}

    #[test]
    fn test_default_hooks() {
        let mut task = Defaults;
        assert_eq!(task.name(), "task");
        assert_eq!(task.initialize(), Ok(()));
        assert_eq!(task.execute(), Ok(()));
        assert!(!task.is_finished());
        assert_eq!(task.end(EndReason::Cancelled), Ok(()));
    }

    #[test]
    fn test_boxed_task_forwards() {
        struct Named;
        impl Task for Named {
            fn name(&self) -> &'static str {
                "named"
            }
            fn is_finished(&self) -> bool {
                true
            }
        }

        let boxed: Box<dyn Task> = Box::new(Named);
        assert_eq!(boxed.name(), "named");
        assert!(boxed.is_finished());
    }

    #[test]
    fn test_builder_reports_unknown_subsystem() {
        let mut scheduler = Scheduler::new();
        let result = scheduler.task(Defaults).requires(SubsystemId(7)).build();
        assert_eq!(result, Err(SchedulerError::UnknownSubsystem(SubsystemId(7))));
    }

    #[test]
    fn test_builder_build_leaves_pending() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.task(Defaults).build().unwrap();
        assert!(!scheduler.is_active(id));
        assert_eq!(scheduler.status(id), Some(TaskStatus::Pending));
    }
}
