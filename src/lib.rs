//! pico_trail_command - Cooperative command scheduler for robot control loops
//!
//! This library provides a tick-driven scheduler that coordinates short-lived
//! tasks claiming exclusive use of shared subsystems, staged task groups for
//! composing routines, and a drive train boundary for plugging actuators in.

// Core systems (scheduler, logging)
pub mod core;

// Robot-side libraries (drive train boundary)
pub mod libraries;
