//! Cooperative command scheduler
//!
//! Tick-driven scheduler for short-lived tasks that claim exclusive use of
//! shared subsystems. Everything runs on one thread; "parallel" means active
//! within the same tick, not concurrent.
//!
//! # Components
//!
//! - [`types`]: Handles, statuses, statistics, tick report
//! - [`error`]: Hook and scheduler errors
//! - [`config`]: Scheduler configuration (eviction policy)
//! - [`subsystem`]: `Subsystem` trait
//! - [`task`]: `Task` trait and builder
//! - [`group`]: Staged `TaskGroup`
//! - [`registry`]: The `Scheduler` itself
//! - [`admitter`]: Deferred admission requests from inside hooks
//! - [`tasks`]: Reusable task implementations
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use pico_trail_command::core::scheduler::{Scheduler, Subsystem, TaskGroup};
//! use pico_trail_command::core::scheduler::tasks::WaitTicks;
//!
//! struct Drive;
//! impl Subsystem for Drive {
//!     fn name(&self) -> &'static str {
//!         "drive"
//!     }
//! }
//!
//! let mut scheduler = Scheduler::new();
//! let drive = scheduler.register_subsystem(&Rc::new(RefCell::new(Drive)));
//!
//! let forward = scheduler.task(WaitTicks::new(2)).requires(drive).build().unwrap();
//! let turn = scheduler.task(WaitTicks::new(1)).requires(drive).build().unwrap();
//!
//! let mut auto = TaskGroup::new("auto");
//! auto.add_sequential(forward).add_sequential(turn);
//! let group = scheduler.admit_group(auto).unwrap();
//!
//! while scheduler.is_group_active(group) {
//!     scheduler.tick();
//! }
//! ```

pub mod admitter;
pub mod config;
pub mod error;
pub mod group;
pub mod registry;
pub mod subsystem;
pub mod task;
pub mod tasks;
pub mod types;

pub use admitter::Admitter;
pub use config::{EvictionPolicy, SchedulerConfig};
pub use error::{HookError, SchedulerError};
pub use group::TaskGroup;
pub use registry::Scheduler;
pub use subsystem::Subsystem;
pub use task::{Task, TaskBuilder};
pub use types::{
    Admission, EndReason, Fault, FaultSource, GroupId, Hook, SchedulerStats, SubsystemId, TaskId,
    TaskStats, TaskStatus, TickReport,
};
