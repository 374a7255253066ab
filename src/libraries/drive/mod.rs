//! Drive train boundary
//!
//! This module connects the scheduler to a drive train. The hardware side sits
//! behind the [`DriveTrain`] trait; the scheduler side is a [`DriveSubsystem`]
//! that tasks claim, plus a [`DriveForTicks`] task that drives it for a fixed
//! number of ticks.
//!
//! Command values are normalized to [-1.0, +1.0]:
//! - `speed`: +1.0 = full forward, -1.0 = full reverse
//! - `rotation`: +1.0 = full clockwise, -1.0 = full counter-clockwise
//!
//! ## Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use pico_trail_command::core::scheduler::Scheduler;
//! use pico_trail_command::libraries::drive::{DriveForTicks, DriveSubsystem, DriveTrain, DriveError};
//!
//! struct Wheels;
//! impl DriveTrain for Wheels {
//!     fn drive(&mut self, _speed: f32, _rotation: f32) -> Result<(), DriveError> { Ok(()) }
//!     fn switch_to_power_mode(&mut self) -> Result<(), DriveError> { Ok(()) }
//!     fn switch_to_velocity_mode(&mut self) -> Result<(), DriveError> { Ok(()) }
//!     fn reset_encoders(&mut self) -> Result<(), DriveError> { Ok(()) }
//!     fn run_to_positions(&mut self, _targets: &[i32], _max_power: f32) -> Result<(), DriveError> { Ok(()) }
//! }
//!
//! let mut scheduler = Scheduler::new();
//! let drive = Rc::new(RefCell::new(DriveSubsystem::new(Wheels)));
//! let drive_id = scheduler.register_subsystem(&drive);
//!
//! let forward = DriveForTicks::new(drive.clone(), 0.5, 0.0, 3);
//! scheduler.task(forward).requires(drive_id).admit().unwrap();
//! ```

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use thiserror::Error;

use crate::core::scheduler::{EndReason, HookError, Subsystem, Task};

/// Drive train error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveError {
    /// Command value outside [-1.0, +1.0]
    #[error("drive command out of range")]
    OutOfRange,
    /// Motor controller or encoder fault
    #[error("drive hardware fault: {0}")]
    Hardware(&'static str),
}

impl From<DriveError> for HookError {
    fn from(error: DriveError) -> Self {
        match error {
            DriveError::OutOfRange => HookError::Failed("drive command out of range"),
            DriveError::Hardware(detail) => HookError::Hardware(detail),
        }
    }
}

/// Motor control mode of the drive train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Open-loop power
    #[default]
    Power,
    /// Closed-loop velocity (encoder feedback)
    Velocity,
    /// Closed-loop position targets
    ToPosition,
}

/// Hardware-facing drive train
///
/// Implementations translate normalized commands into motor signals. They
/// are not expected to validate ranges; [`DriveSubsystem`] does that before
/// forwarding.
pub trait DriveTrain {
    /// Arcade-style drive command
    fn drive(&mut self, speed: f32, rotation: f32) -> Result<(), DriveError>;

    /// Switch every motor to open-loop power control
    fn switch_to_power_mode(&mut self) -> Result<(), DriveError>;

    /// Switch every motor to closed-loop velocity control
    fn switch_to_velocity_mode(&mut self) -> Result<(), DriveError>;

    /// Zero the wheel encoders
    fn reset_encoders(&mut self) -> Result<(), DriveError>;

    /// Run each motor to its encoder target, capped at `max_power`
    fn run_to_positions(&mut self, targets: &[i32], max_power: f32) -> Result<(), DriveError>;
}

/// Last command sent through a [`DriveSubsystem`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DriveCommand {
    pub speed: f32,
    pub rotation: f32,
}

impl DriveCommand {
    /// Zero speed, zero rotation
    pub const STOP: Self = Self {
        speed: 0.0,
        rotation: 0.0,
    };
}

/// Snapshot published by [`DriveSubsystem::periodic`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DriveStatus {
    pub mode: RunMode,
    pub command: DriveCommand,
    /// Number of `periodic()` calls so far
    pub updates: u32,
}

fn check_unit(value: f32) -> Result<(), DriveError> {
    if (-1.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DriveError::OutOfRange)
    }
}

/// Scheduler-facing wrapper around a [`DriveTrain`]
///
/// Tasks share it as `Rc<RefCell<DriveSubsystem<D>>>` and claim it through
/// their requirements. Inputs are range-checked here; a rejected command
/// never reaches the drive train and does not change the recorded state.
pub struct DriveSubsystem<D: DriveTrain> {
    drive: D,
    mode: RunMode,
    command: DriveCommand,
    status: DriveStatus,
}

impl<D: DriveTrain> DriveSubsystem<D> {
    pub fn new(drive: D) -> Self {
        Self {
            drive,
            mode: RunMode::Power,
            command: DriveCommand::STOP,
            status: DriveStatus::default(),
        }
    }

    /// Send an arcade drive command
    ///
    /// # Errors
    ///
    /// Returns `DriveError::OutOfRange` if either value is outside [-1.0, +1.0].
    pub fn drive(&mut self, speed: f32, rotation: f32) -> Result<(), DriveError> {
        check_unit(speed)?;
        check_unit(rotation)?;
        self.drive.drive(speed, rotation)?;
        self.command = DriveCommand { speed, rotation };
        Ok(())
    }

    /// Command zero speed and rotation
    pub fn stop(&mut self) -> Result<(), DriveError> {
        self.drive(0.0, 0.0)
    }

    /// Switch the drive train to `mode`
    ///
    /// `RunMode::ToPosition` is only entered through
    /// [`run_to_positions`](Self::run_to_positions); asking for it here is a
    /// no-op.
    pub fn set_mode(&mut self, mode: RunMode) -> Result<(), DriveError> {
        match mode {
            RunMode::Power => self.drive.switch_to_power_mode()?,
            RunMode::Velocity => self.drive.switch_to_velocity_mode()?,
            RunMode::ToPosition => return Ok(()),
        }
        self.mode = mode;
        Ok(())
    }

    /// Zero the wheel encoders
    pub fn reset_encoders(&mut self) -> Result<(), DriveError> {
        self.drive.reset_encoders()
    }

    /// Drive to encoder targets
    ///
    /// # Errors
    ///
    /// Returns `DriveError::OutOfRange` if `max_power` is outside [-1.0, +1.0].
    pub fn run_to_positions(&mut self, targets: &[i32], max_power: f32) -> Result<(), DriveError> {
        check_unit(max_power)?;
        self.drive.run_to_positions(targets, max_power)?;
        self.mode = RunMode::ToPosition;
        Ok(())
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn last_command(&self) -> DriveCommand {
        self.command
    }

    /// State as of the last `periodic()` call
    pub fn status(&self) -> DriveStatus {
        self.status
    }

    pub fn drive_train(&self) -> &D {
        &self.drive
    }

    pub fn drive_train_mut(&mut self) -> &mut D {
        &mut self.drive
    }
}

impl<D: DriveTrain> Subsystem for DriveSubsystem<D> {
    fn name(&self) -> &'static str {
        "drive"
    }

    fn periodic(&mut self) -> Result<(), HookError> {
        self.status = DriveStatus {
            mode: self.mode,
            command: self.command,
            updates: self.status.updates.wrapping_add(1),
        };
        Ok(())
    }
}

/// Drive at a fixed command for a number of ticks, then stop
///
/// The task does not declare its own requirements; admit it with
/// `.requires(drive_id)` so it evicts (and is evicted by) other drive users.
/// The drive is stopped in `end()` whatever the reason, so an evicted or
/// cancelled task never leaves the wheels turning.
pub struct DriveForTicks<D: DriveTrain> {
    drive: Rc<RefCell<DriveSubsystem<D>>>,
    command: DriveCommand,
    mode: RunMode,
    ticks: u32,
    elapsed: u32,
}

impl<D: DriveTrain> DriveForTicks<D> {
    pub fn new(
        drive: Rc<RefCell<DriveSubsystem<D>>>,
        speed: f32,
        rotation: f32,
        ticks: u32,
    ) -> Self {
        Self {
            drive,
            command: DriveCommand { speed, rotation },
            mode: RunMode::Power,
            ticks,
            elapsed: 0,
        }
    }

    /// Run in closed-loop velocity mode instead of power mode
    pub fn velocity(mut self) -> Self {
        self.mode = RunMode::Velocity;
        self
    }

    /// Ticks driven so far in the current run
    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    fn with_drive<R>(
        &self,
        f: impl FnOnce(&mut DriveSubsystem<D>) -> Result<R, DriveError>,
    ) -> Result<R, HookError> {
        let mut drive = self
            .drive
            .try_borrow_mut()
            .map_err(|_| HookError::Busy("drive"))?;
        Ok(f(&mut *drive)?)
    }
}

impl<D: DriveTrain> Task for DriveForTicks<D> {
    fn name(&self) -> &'static str {
        "drive_for_ticks"
    }

    fn initialize(&mut self) -> Result<(), HookError> {
        self.elapsed = 0;
        let mode = self.mode;
        self.with_drive(|drive| drive.set_mode(mode))
    }

    fn execute(&mut self) -> Result<(), HookError> {
        let command = self.command;
        self.with_drive(|drive| drive.drive(command.speed, command.rotation))?;
        self.elapsed = self.elapsed.saturating_add(1);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.ticks
    }

    fn end(&mut self, reason: EndReason) -> Result<(), HookError> {
        if reason != EndReason::Completed {
            crate::log_debug!("drive_for_ticks interrupted after {} ticks", self.elapsed);
        }
        self.with_drive(|drive| drive.stop())
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{DriveCall, MockDriveTrain};
    use super::*;
    use crate::core::scheduler::{Scheduler, TaskStatus};

    fn shared_drive() -> Rc<RefCell<DriveSubsystem<MockDriveTrain>>> {
        Rc::new(RefCell::new(DriveSubsystem::new(MockDriveTrain::new())))
    }

    #[test]
    fn test_drive_rejects_out_of_range() {
        let mut drive = DriveSubsystem::new(MockDriveTrain::new());

        assert_eq!(drive.drive(1.5, 0.0), Err(DriveError::OutOfRange));
        assert_eq!(drive.drive(0.0, -1.01), Err(DriveError::OutOfRange));
        assert_eq!(drive.run_to_positions(&[100, 100], 2.0), Err(DriveError::OutOfRange));

        // nothing reached the hardware
        assert!(drive.drive_train().calls().is_empty());
        assert_eq!(drive.last_command(), DriveCommand::STOP);
    }

    #[test]
    fn test_drive_records_last_command() {
        let mut drive = DriveSubsystem::new(MockDriveTrain::new());
        drive.drive(0.5, -0.25).unwrap();

        assert_eq!(
            drive.last_command(),
            DriveCommand {
                speed: 0.5,
                rotation: -0.25
            }
        );
        assert_eq!(
            drive.drive_train().calls(),
            &[DriveCall::Drive {
                speed: 0.5,
                rotation: -0.25
            }]
        );
    }

    #[test]
    fn test_mode_switching() {
        let mut drive = DriveSubsystem::new(MockDriveTrain::new());
        assert_eq!(drive.mode(), RunMode::Power);

        drive.set_mode(RunMode::Velocity).unwrap();
        assert_eq!(drive.mode(), RunMode::Velocity);

        drive.run_to_positions(&[720, -720], 0.4).unwrap();
        assert_eq!(drive.mode(), RunMode::ToPosition);

        drive.set_mode(RunMode::Power).unwrap();
        assert_eq!(
            drive.drive_train().calls(),
            &[
                DriveCall::VelocityMode,
                DriveCall::RunToPositions {
                    targets: vec![720, -720],
                    max_power: 0.4
                },
                DriveCall::PowerMode,
            ]
        );
    }

    #[test]
    fn test_periodic_publishes_status() {
        let mut drive = DriveSubsystem::new(MockDriveTrain::new());
        drive.drive(0.3, 0.0).unwrap();
        assert_eq!(drive.status().updates, 0);

        drive.periodic().unwrap();
        let status = drive.status();
        assert_eq!(status.updates, 1);
        assert_eq!(status.mode, RunMode::Power);
        assert_eq!(status.command.speed, 0.3);

        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["mode"], "power");
        assert_eq!(json["updates"], 1);
    }

    #[test]
    fn test_hardware_fault_maps_to_hook_error() {
        let mut drive = DriveSubsystem::new(MockDriveTrain::new());
        drive.drive_train_mut().fail_with(DriveError::Hardware("encoder"));

        let result = drive.reset_encoders().map_err(HookError::from);
        assert_eq!(result, Err(HookError::Hardware("encoder")));
        assert_eq!(
            HookError::from(DriveError::OutOfRange),
            HookError::Failed("drive command out of range")
        );
    }

    #[test]
    fn test_drive_for_ticks_runs_and_stops() {
        let drive = shared_drive();
        let mut scheduler = Scheduler::new();
        let drive_id = scheduler.register_subsystem(&drive);

        let task = scheduler
            .task(DriveForTicks::new(drive.clone(), 0.6, 0.1, 2))
            .requires(drive_id)
            .admit()
            .unwrap()
            .task;

        scheduler.tick();
        scheduler.tick();
        assert_eq!(drive.borrow().status().command.speed, 0.6);

        let report = scheduler.tick();
        assert_eq!(report.completed, vec![task]);
        assert_eq!(drive.borrow().last_command(), DriveCommand::STOP);
        assert_eq!(
            drive.borrow().drive_train().drive_count(),
            3,
            "two drive ticks plus the stop"
        );
    }

    #[test]
    fn test_evicted_drive_task_stops_wheels() {
        let drive = shared_drive();
        let mut scheduler = Scheduler::new();
        let drive_id = scheduler.register_subsystem(&drive);

        let first = scheduler
            .task(DriveForTicks::new(drive.clone(), 0.8, 0.0, 100))
            .requires(drive_id)
            .admit()
            .unwrap()
            .task;
        scheduler.tick();

        let second = scheduler
            .task(DriveForTicks::new(drive.clone(), -0.2, 0.0, 100).velocity())
            .requires(drive_id)
            .admit()
            .unwrap()
            .task;

        assert_eq!(scheduler.status(first), Some(TaskStatus::Evicted));
        assert_eq!(scheduler.owner_of(drive_id), Some(second));
        assert_eq!(drive.borrow().mode(), RunMode::Velocity);

        let calls = drive.borrow().drive_train().calls().to_vec();
        assert_eq!(
            &calls[1..],
            &[
                DriveCall::Drive {
                    speed: 0.8,
                    rotation: 0.0
                },
                DriveCall::Drive {
                    speed: 0.0,
                    rotation: 0.0
                },
                DriveCall::VelocityMode,
            ]
        );
    }

    #[test]
    fn test_drive_fault_isolated_to_task() {
        let drive = shared_drive();
        let mut scheduler = Scheduler::new();
        let drive_id = scheduler.register_subsystem(&drive);

        let task = scheduler
            .task(DriveForTicks::new(drive.clone(), 0.5, 0.0, 10))
            .requires(drive_id)
            .admit()
            .unwrap()
            .task;
        drive
            .borrow_mut()
            .drive_train_mut()
            .fail_with(DriveError::Hardware("motor stalled"));

        let report = scheduler.tick();
        assert_eq!(scheduler.status(task), Some(TaskStatus::Faulted));
        assert_eq!(report.faults.len(), 1);
        // subsystem still got its periodic call
        assert_eq!(drive.borrow().status().updates, 1);
    }
}
