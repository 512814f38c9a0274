// src/navigation/controller.rs
// Pursuit controller: steers toward a tracked target and approaches it until the
// block looks big enough, then holds position while still centering.

use super::{DriveCommand, DriveRange, NavigationConfig};
use crate::core::{FrameGeometry, TrackedTarget};
use log::debug;

/// Proportional differential-drive pursuit of a tracked target.
/// Pure: every method only reads its inputs.
#[derive(Debug, Clone)]
pub struct PursuitController {
    geometry: FrameGeometry,
    steering_gain: f64,
    max_forward_speed: f64,
    close_enough_size: f64,
    clamp: DriveRange,
}

impl PursuitController {
    /// Controller using the configured gains and frame
    pub fn new(config: &NavigationConfig) -> Self {
        PursuitController {
            geometry: config.frame,
            steering_gain: config.steering_gain,
            max_forward_speed: config.max_forward_speed,
            close_enough_size: config.close_enough_size,
            clamp: config.drive_clamp_range,
        }
    }

    /// Target offset from the frame center, normalized to [-1, 1]; negative is left
    pub fn horizontal_error(&self, target: &TrackedTarget) -> f64 {
        let center = self.geometry.center();
        let offset = target.last_known_center - center;
        (offset.x / center.x).clamp(-1.0, 1.0)
    }

    /// Differential term, positive turns right
    pub fn steering(&self, target: &TrackedTarget) -> f64 {
        self.steering_gain * self.horizontal_error(target)
    }

    /// Shrinks with apparent size and is exactly zero from `close_enough_size` on
    pub fn forward_speed(&self, target: &TrackedTarget) -> f64 {
        let size = target.last_known_size;
        if size >= self.close_enough_size {
            return 0.0;
        }
        let remaining = (1.0 - size / self.close_enough_size).clamp(0.0, 1.0);
        self.max_forward_speed * remaining
    }

    /// Wheel command that closes on the target
    pub fn drive(&self, target: &TrackedTarget) -> DriveCommand {
        let forward = self.forward_speed(target);
        let steering = self.steering(target);
        debug!(
            "Pursuit: forward={:.3}, steering={:.3}, size={}",
            forward, steering, target.last_known_size
        );
        DriveCommand::new(forward + steering, forward - steering).clamped(&self.clamp)
    }
}
