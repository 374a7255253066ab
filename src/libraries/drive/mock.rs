//! Mock drive train for host tests
//!
//! Records every accepted call in order and can be told to fail the next one.

use super::{DriveError, DriveTrain};

/// Call received by [`MockDriveTrain`]
#[derive(Debug, Clone, PartialEq)]
pub enum DriveCall {
    Drive { speed: f32, rotation: f32 },
    PowerMode,
    VelocityMode,
    ResetEncoders,
    RunToPositions { targets: Vec<i32>, max_power: f32 },
}

/// Drive train that records calls instead of driving hardware
#[derive(Debug, Default)]
pub struct MockDriveTrain {
    calls: Vec<DriveCall>,
    fail_next: Option<DriveError>,
}

impl MockDriveTrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls accepted so far
    pub fn calls(&self) -> &[DriveCall] {
        &self.calls
    }

    /// Number of `drive()` calls accepted so far
    pub fn drive_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, DriveCall::Drive { .. }))
            .count()
    }

    /// Make the next call fail with `error` (it is not recorded)
    pub fn fail_with(&mut self, error: DriveError) {
        self.fail_next = Some(error);
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.fail_next = None;
    }

    fn record(&mut self, call: DriveCall) -> Result<(), DriveError> {
        if let Some(error) = self.fail_next.take() {
            return Err(error);
        }
        self.calls.push(call);
        Ok(())
    }
}

impl DriveTrain for MockDriveTrain {
    fn drive(&mut self, speed: f32, rotation: f32) -> Result<(), DriveError> {
        self.record(DriveCall::Drive { speed, rotation })
    }

    fn switch_to_power_mode(&mut self) -> Result<(), DriveError> {
        self.record(DriveCall::PowerMode)
    }

    fn switch_to_velocity_mode(&mut self) -> Result<(), DriveError> {
        self.record(DriveCall::VelocityMode)
    }

    fn reset_encoders(&mut self) -> Result<(), DriveError> {
        self.record(DriveCall::ResetEncoders)
    }

    fn run_to_positions(&mut self, targets: &[i32], max_power: f32) -> Result<(), DriveError> {
        self.record(DriveCall::RunToPositions {
            targets: targets.to_vec(),
            max_power,
        })
    }
}
