//! One-shot task

use crate::core::scheduler::{HookError, Task};

/// Runs a closure in `initialize()` and reports finished right away
///
/// The scheduler ends it at the start of the next tick without calling
/// `execute()`. Useful as a stage in a [`TaskGroup`](crate::core::scheduler::TaskGroup)
/// (reset encoders, toggle a mode) between longer-running tasks.
pub struct InstantTask<F>
where
    F: FnMut() -> Result<(), HookError>,
{
    name: &'static str,
    action: F,
    done: bool,
}

impl<F> InstantTask<F>
where
    F: FnMut() -> Result<(), HookError>,
{
    /// Create a one-shot task
    pub fn new(name: &'static str, action: F) -> Self {
        Self {
            name,
            action,
            done: false,
        }
    }
}

impl<F> Task for InstantTask<F>
where
    F: FnMut() -> Result<(), HookError>,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn initialize(&mut self) -> Result<(), HookError> {
        self.done = false;
        (self.action)()?;
        self.done = true;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.done
    }
}
