//! Drive control for tagbot
//!
//! This module turns combat decisions into normalized differential drive
//! commands: the pursuit controller centers and approaches a tracked target,
//! the search controller roams when nothing is in view.

/// Pursuit of a tracked target
pub mod controller;
/// Roaming search pattern
pub mod planner;

pub use controller::PursuitController;
pub use planner::{SearchController, SearchPhase};

use crate::config::secs;
use crate::core::FrameGeometry;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Legal bounds for a normalized wheel drive value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriveRange {
    /// Full reverse
    pub min: f64,
    /// Full forward
    pub max: f64,
}

impl Default for DriveRange {
    fn default() -> Self {
        DriveRange { min: -1.0, max: 1.0 }
    }
}

impl DriveRange {
    /// Clamps a drive value into range. NaN collapses to a stop.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(self.min, self.max)
    }

    /// True if the value lies within the range
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Left/right wheel drive pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriveCommand {
    /// Left wheel, normalized
    pub left: f64,
    /// Right wheel, normalized
    pub right: f64,
}

impl DriveCommand {
    /// Both wheels stopped
    pub const STOP: DriveCommand = DriveCommand {
        left: 0.0,
        right: 0.0,
    };

    /// Drive pair, not yet clamped
    pub fn new(left: f64, right: f64) -> Self {
        DriveCommand { left, right }
    }

    /// Both wheels clamped into range
    pub fn clamped(self, range: &DriveRange) -> Self {
        DriveCommand {
            left: range.clamp(self.left),
            right: range.clamp(self.right),
        }
    }

    /// True if both wheels are at zero
    pub fn is_stopped(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

/// Everything the actuator adapter receives for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ActuationCommand {
    /// Left wheel, normalized
    pub left_drive: f64,
    /// Right wheel, normalized
    pub right_drive: f64,
    /// Pull the trigger this cycle
    pub fire: bool,
}

impl ActuationCommand {
    /// Combines a drive pair with a fire decision
    pub fn from_drive(drive: DriveCommand, fire: bool) -> Self {
        ActuationCommand {
            left_drive: drive.left,
            right_drive: drive.right,
            fire,
        }
    }

    /// Wheels stopped, weapon idle
    pub fn stop() -> Self {
        ActuationCommand::default()
    }

    /// Drive part of the command
    pub fn drive(&self) -> DriveCommand {
        DriveCommand::new(self.left_drive, self.right_drive)
    }
}

/// Drive control configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NavigationConfig {
    /// Camera frame the target coordinates live in
    pub frame: FrameGeometry,
    /// Steering term per unit of normalized horizontal error
    pub steering_gain: f64,
    /// Forward drive when the target is far away
    pub max_forward_speed: f64,
    /// Apparent size (px) at which the robot stops advancing
    pub close_enough_size: f64,
    /// Bounds applied to every wheel command
    pub drive_clamp_range: DriveRange,
    /// Wheel speed while rotating in place during search
    pub search_turn_speed: f64,
    /// Wheel speed during search forward bursts
    pub search_forward_speed: f64,
    /// Shortest rotate phase (seconds)
    pub search_rotate_min_secs: f64,
    /// Longest rotate phase (seconds)
    pub search_rotate_max_secs: f64,
    /// Longest straight-line burst (seconds)
    #[serde(alias = "max_search_straight_duration")]
    pub max_search_straight_secs: f64,
    /// Seed for the search schedule
    pub search_seed: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        NavigationConfig {
            frame: FrameGeometry::default(),
            steering_gain: 0.5,
            max_forward_speed: 0.7,
            close_enough_size: 80.0,
            drive_clamp_range: DriveRange::default(),
            search_turn_speed: 0.5,
            search_forward_speed: 0.6,
            search_rotate_min_secs: 0.3,
            search_rotate_max_secs: 1.5,
            max_search_straight_secs: 1.0,
            search_seed: 0x7a6b07,
        }
    }
}

impl NavigationConfig {
    /// Shortest rotate phase
    pub fn search_rotate_min(&self) -> Duration {
        secs(self.search_rotate_min_secs)
    }

    /// Longest rotate phase
    pub fn search_rotate_max(&self) -> Duration {
        secs(self.search_rotate_max_secs)
    }

    /// Longest forward burst
    pub fn max_search_straight_duration(&self) -> Duration {
        secs(self.max_search_straight_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_bounds_and_neutralizes_nan() {
        let range = DriveRange { min: -0.8, max: 0.9 };
        assert_eq!(range.clamp(1.4), 0.9);
        assert_eq!(range.clamp(-3.0), -0.8);
        assert_eq!(range.clamp(f64::NAN), 0.0);
        assert_eq!(range.clamp(0.2), 0.2);
    }

    #[test]
    fn actuation_round_trips_drive() {
        let drive = DriveCommand::new(0.3, -0.4);
        let command = ActuationCommand::from_drive(drive, true);
        assert_eq!(command.drive(), drive);
        assert!(command.fire);
        assert!(ActuationCommand::stop().drive().is_stopped());
    }
}
