//! Hardware boundary for tagbot
//!
//! The control core never talks to devices directly. It sees:
//! - a [`VisionSource`] delivering camera frames with a bounded wait
//! - a [`HitSensor`] draining at most one pending incoming-fire event
//! - an [`Actuator`] accepting drive and fire commands without blocking
//!
//! Concrete adapters for the robot's serial IR link and motor driver live in
//! the submodules, along with a simulated arena for running without hardware.

mod publisher;
mod subscriber;
/// Simulated arena standing in for the robot
pub mod sim;

pub use publisher::*;
pub use subscriber::*;

use crate::core::Frame;
use crate::navigation::ActuationCommand;
use std::fmt;
use std::time::Duration;

/// Camera side of the loop
pub trait VisionSource {
    /// Returns the newest frame, waiting no longer than `timeout`
    fn poll_frame(&mut self, timeout: Duration) -> Result<Frame, SensorError>;
}

/// IR receiver side of the loop
pub trait HitSensor {
    /// Consumes at most one pending hit; never blocks
    fn poll_hit(&mut self) -> bool;
}

/// Motor and weapon side of the loop
pub trait Actuator {
    /// Applies one cycle's command; must not block the control loop
    fn actuate(&mut self, command: &ActuationCommand) -> Result<(), ActuatorError>;

    /// Lets go of the hardware at shutdown
    fn release(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }
}

/// Frame poll failures, all recoverable
#[derive(Debug, Clone, PartialEq)]
pub enum SensorError {
    /// No frame arrived within the poll bound
    Timeout(Duration),
    /// The camera pipeline is gone
    Disconnected(String),
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SensorError::Timeout(waited) => write!(f, "No frame within {:?}", waited),
            SensorError::Disconnected(msg) => write!(f, "Camera disconnected: {}", msg),
        }
    }
}

impl std::error::Error for SensorError {}

/// Actuator failures
#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorError {
    /// The adapter declined this command
    Rejected(String),
    /// The device cannot be reached at all
    Unavailable(String),
    /// Writing to the device failed
    Io(String),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ActuatorError::Rejected(msg) => write!(f, "Command rejected: {}", msg),
            ActuatorError::Unavailable(msg) => write!(f, "Actuator unavailable: {}", msg),
            ActuatorError::Io(msg) => write!(f, "Actuator I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ActuatorError {}
