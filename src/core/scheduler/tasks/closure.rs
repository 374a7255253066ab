//! Closure-bundle task
//!
//! [`FnTask`] owns a piece of state `S` and a closure per lifecycle hook.
//! Hooks left unset fall back to the `Task` defaults.

use crate::core::scheduler::{EndReason, HookError, Task};

type InitFn<S> = Box<dyn FnMut(&mut S) -> Result<(), HookError>>;
type ExecFn<S> = Box<dyn FnMut(&mut S) -> Result<(), HookError>>;
type DoneFn<S> = Box<dyn Fn(&S) -> bool>;
type EndFn<S> = Box<dyn FnMut(&mut S, EndReason) -> Result<(), HookError>>;

/// Task assembled from closures over shared state
///
/// # Example
///
/// ```rust
/// use pico_trail_command::core::scheduler::tasks::FnTask;
///
/// let countdown = FnTask::new("countdown", 3u32)
///     .on_execute(|remaining| {
///         *remaining -= 1;
///         Ok(())
///     })
///     .finished_when(|remaining| *remaining == 0);
/// # let _ = countdown;
/// ```
pub struct FnTask<S> {
    name: &'static str,
    state: S,
    on_initialize: Option<InitFn<S>>,
    on_execute: Option<ExecFn<S>>,
    finished_when: Option<DoneFn<S>>,
    on_end: Option<EndFn<S>>,
}

impl<S> FnTask<S> {
    /// Create a task with no hooks set
    pub fn new(name: &'static str, state: S) -> Self {
        Self {
            name,
            state,
            on_initialize: None,
            on_execute: None,
            finished_when: None,
            on_end: None,
        }
    }

    /// Set the `initialize()` hook
    pub fn on_initialize<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut S) -> Result<(), HookError> + 'static,
    {
        self.on_initialize = Some(Box::new(f));
        self
    }

    /// Set the `execute()` hook
    pub fn on_execute<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut S) -> Result<(), HookError> + 'static,
    {
        self.on_execute = Some(Box::new(f));
        self
    }

    /// Set the `is_finished()` predicate
    pub fn finished_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> bool + 'static,
    {
        self.finished_when = Some(Box::new(f));
        self
    }

    /// Set the `end()` hook
    pub fn on_end<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut S, EndReason) -> Result<(), HookError> + 'static,
    {
        self.on_end = Some(Box::new(f));
        self
    }

    /// Current state
    pub fn state(&self) -> &S {
        &self.state
    }
}

impl<S> Task for FnTask<S> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn initialize(&mut self) -> Result<(), HookError> {
        match self.on_initialize.as_mut() {
            Some(f) => f(&mut self.state),
            None => Ok(()),
        }
    }

    fn execute(&mut self) -> Result<(), HookError> {
        match self.on_execute.as_mut() {
            Some(f) => f(&mut self.state),
            None => Ok(()),
        }
    }

    fn is_finished(&self) -> bool {
        self.finished_when
            .as_ref()
            .is_some_and(|f| f(&self.state))
    }

    fn end(&mut self, reason: EndReason) -> Result<(), HookError> {
        match self.on_end.as_mut() {
            Some(f) => f(&mut self.state, reason),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_hooks_use_defaults() {
        let mut task = FnTask::new("idle", ());
        assert_eq!(task.name(), "idle");
        assert_eq!(task.initialize(), Ok(()));
        assert_eq!(task.execute(), Ok(()));
        assert!(!task.is_finished());
        assert_eq!(task.end(EndReason::Completed), Ok(()));
    }

    #[test]
    fn test_hooks_share_state() {
        let mut task = FnTask::new("count", (0u32, None::<EndReason>))
            .on_initialize(|s| {
                s.0 = 2;
                Ok(())
            })
            .on_execute(|s| {
                s.0 -= 1;
                Ok(())
            })
            .finished_when(|s| s.0 == 0)
            .on_end(|s, reason| {
                s.1 = Some(reason);
                Ok(())
            });

        task.initialize().unwrap();
        task.execute().unwrap();
        assert!(!task.is_finished());
        task.execute().unwrap();
        assert!(task.is_finished());
        task.end(EndReason::Completed).unwrap();
        assert_eq!(task.state().1, Some(EndReason::Completed));
    }

    #[test]
    fn test_execute_error_propagates() {
        let mut task = FnTask::new("stall", ()).on_execute(|_| Err(HookError::Failed("stalled")));
        assert_eq!(task.execute(), Err(HookError::Failed("stalled")));
    }
}
