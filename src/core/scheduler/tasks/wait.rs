//! Tick-counting delay task

use crate::core::scheduler::{HookError, Task};

/// Finishes after `ticks` calls to `execute()`
///
/// `WaitTicks::new(0)` reports finished as soon as it is admitted. The count
/// restarts on every admission. Combine with
/// [`Scheduler::requires`](crate::core::scheduler::Scheduler::requires) to hold
/// a subsystem idle for a fixed time.
#[derive(Debug, Clone)]
pub struct WaitTicks {
    ticks: u32,
    elapsed: u32,
}

impl WaitTicks {
    /// Create a delay of `ticks` executions
    pub const fn new(ticks: u32) -> Self {
        Self { ticks, elapsed: 0 }
    }

    /// Executions so far in the current run
    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }
}

impl Task for WaitTicks {
    fn name(&self) -> &'static str {
        "wait_ticks"
    }

    fn initialize(&mut self) -> Result<(), HookError> {
        self.elapsed = 0;
        Ok(())
    }

    fn execute(&mut self) -> Result<(), HookError> {
        self.elapsed = self.elapsed.saturating_add(1);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.ticks
    }
}
