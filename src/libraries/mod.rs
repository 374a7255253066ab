//! Common libraries
//!
//! Robot-side building blocks that plug into the scheduler.
//!
//! ## Libraries
//!
//! - `drive`: Drive train boundary (subsystem wrapper and drive tasks)

pub mod drive;

// Re-export commonly used types
pub use drive::{DriveError, DriveForTicks, DriveSubsystem, DriveTrain, RunMode};
