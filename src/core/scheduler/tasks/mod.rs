//! Reusable task implementations
//!
//! Small building blocks that cover most composition needs without writing a
//! dedicated `Task` impl:
//! - [`InstantTask`]: run a closure once on admission and finish
//! - [`WaitTicks`]: finish after a fixed number of ticks
//! - [`FnTask`]: closure bundle implementing every lifecycle hook
//!
//! Drive-specific tasks live with the drive subsystem in
//! [`crate::libraries::drive`].

pub mod closure;
pub mod instant;
pub mod wait;

pub use closure::FnTask;
pub use instant::InstantTask;
pub use wait::WaitTicks;
