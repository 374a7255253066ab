//! Subsystem trait
//!
//! A subsystem is a shared, stateful resource (drive train, lift, intake)
//! that at most one active task may claim at a time. Subsystems hold no
//! scheduling logic; they are registered once and receive a `periodic()` call
//! every tick, after all active tasks have been advanced.

use std::cell::RefCell;
use std::rc::Rc;

use super::error::HookError;

/// Shared, stateful resource driven by the scheduler
///
/// # Lifecycle
///
/// 1. Registered once with [`Scheduler::register_subsystem`](super::Scheduler::register_subsystem)
/// 2. `periodic()` - Called once per tick, in registration order
///
/// Subsystems are never deregistered.
///
/// # Example
///
/// ```rust
/// use pico_trail_command::core::scheduler::{HookError, Subsystem};
///
/// struct Lift {
///     height_mm: u32,
/// }
///
/// impl Subsystem for Lift {
///     fn name(&self) -> &'static str {
///         "lift"
///     }
///
///     fn periodic(&mut self) -> Result<(), HookError> {
///         // publish sensed state
///         Ok(())
///     }
/// }
/// ```
pub trait Subsystem {
    /// Subsystem name for logging and telemetry
    fn name(&self) -> &'static str;

    /// Per-tick housekeeping (publish sensed state, run local loops)
    fn periodic(&mut self) -> Result<(), HookError> {
        Ok(())
    }
}

/// Type-erased subsystem handle held by the scheduler
pub(crate) type SubsystemHandle = Rc<RefCell<dyn Subsystem>>;

/// Identity of a subsystem allocation, independent of its concrete type
pub(crate) fn identity<T: ?Sized>(handle: &Rc<RefCell<T>>) -> *const () {
    Rc::as_ptr(handle) as *const ()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lamp;

    impl Subsystem for Lamp {
        fn name(&self) -> &'static str {
            "lamp"
        }
    }

    #[test]
    fn test_identity_survives_coercion() {
        let concrete = Rc::new(RefCell::new(Lamp));
        let erased: SubsystemHandle = concrete.clone();
        assert_eq!(identity(&concrete), identity(&erased));

        let other = Rc::new(RefCell::new(Lamp));
        assert_ne!(identity(&concrete), identity(&other));
    }

    #[test]
    fn test_default_periodic_is_ok() {
        let mut lamp = Lamp;
        assert_eq!(lamp.periodic(), Ok(()));
    }
}
