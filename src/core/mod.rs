//! Core scheduling functionality
//!
//! This module contains the command scheduler and the logging macros it
//! reports through.

pub mod logging;
pub mod scheduler;
