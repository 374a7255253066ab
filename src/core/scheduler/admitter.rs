//! Deferred admission requests
//!
//! Tasks and subsystems cannot reach the scheduler from inside their hooks;
//! the scheduler owns them and is mutably borrowed while a hook runs. An
//! [`Admitter`] is the one way back in: it queues task handles, and the
//! scheduler admits them at its next drain point.
//!
//! # Drain points
//!
//! [`Scheduler::tick`](super::Scheduler::tick) drains the queue
//! - before the task pass (requests made between ticks)
//! - after the task pass (requests from `execute()`, `end()`)
//! - after the subsystem pass (requests from `periodic()`)
//! - after the group pass (requests from stage `initialize()` calls)
//!
//! Each drain point admits only the requests queued when it starts. A
//! request made by an `initialize()` that the drain itself triggered waits
//! for the next drain point, so two tasks that keep admitting each other
//! cannot stall a tick.

use std::cell::RefCell;
use std::rc::Rc;

use super::types::TaskId;

/// Cloneable handle for requesting task admission from inside a hook
///
/// Obtained from [`Scheduler::admitter`](super::Scheduler::admitter). Every
/// clone feeds the same queue.
///
/// # Example
///
/// ```rust
/// use pico_trail_command::core::scheduler::{Admitter, HookError, Scheduler, Task, TaskId};
/// use pico_trail_command::core::scheduler::tasks::WaitTicks;
///
/// struct Trigger {
///     admitter: Admitter,
///     follow_up: TaskId,
///     fired: bool,
/// }
///
/// impl Task for Trigger {
///     fn execute(&mut self) -> Result<(), HookError> {
///         self.admitter.admit(self.follow_up);
///         self.fired = true;
///         Ok(())
///     }
///
///     fn is_finished(&self) -> bool {
///         self.fired
///     }
/// }
///
/// let mut scheduler = Scheduler::new();
/// let follow_up = scheduler.add_task(WaitTicks::new(5));
/// let trigger = Trigger {
///     admitter: scheduler.admitter(),
///     follow_up,
///     fired: false,
/// };
/// scheduler.task(trigger).admit().unwrap();
///
/// let report = scheduler.tick();
/// assert_eq!(report.admitted, vec![follow_up]);
/// assert!(scheduler.is_active(follow_up));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Admitter {
    queue: Rc<RefCell<Vec<TaskId>>>,
}

impl Admitter {
    /// Queue `task` for admission at the scheduler's next drain point
    ///
    /// Requests are admitted in the order they were made. Errors (unknown or
    /// already active task, failing `initialize()`) show up in the tick
    /// report's faults.
    pub fn admit(&self, task: TaskId) {
        self.queue.borrow_mut().push(task);
    }

    /// Number of requests waiting for a drain point
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Take every queued request, oldest first
    pub(crate) fn take(&self) -> Vec<TaskId> {
        std::mem::take(&mut *self.queue.borrow_mut())
    }
}
