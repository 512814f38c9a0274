// core/mod.rs

// Declares the combat brain of tagbot: perception (target selection), the
// cooldown and hit-reaction timers, and the combat state machine that ties them
// to the drive controllers every cycle.

/// Detections, frames and target selection
pub mod perception;
/// The per-cycle combat state machine
pub mod state;
/// Fire cooldown and hit reaction windows
pub mod timers;

// Re-export key types for a unified API
pub use perception::{
    Detection, DetectionError, Frame, FrameGeometry, SelectionPolicy, SignatureId,
    TargetSelector, TrackedTarget,
};
pub use state::{CombatState, CombatStateMachine, CycleInput};
pub use timers::{FireCooldown, HitReaction};

use crate::config::secs;
use crate::navigation::DriveCommand;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Combat behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CombatConfig {
    /// Signature the robot hunts
    pub hostile_signature_id: SignatureId,
    /// Cycles a tracked target may go unseen before it is dropped
    pub loss_timeout_cycles: u64,
    /// Apparent size (px) from which the target is worth a shot
    pub in_range_size: f64,
    /// Minimum time between honored fire commands (seconds)
    #[serde(alias = "fire_min_interval")]
    pub fire_min_interval_secs: f64,
    /// Length of the hit reaction override (seconds)
    #[serde(alias = "hit_reaction_duration")]
    pub hit_reaction_secs: f64,
    /// Consecutive failed polls tolerated before the robot holds still
    pub sensor_failure_threshold: u32,
    /// Drive emitted while reacting to a hit
    pub evasive_drive: DriveCommand,
    /// Ranking of competing hostile blocks
    pub selection_policy: SelectionPolicy,
}

impl Default for CombatConfig {
    fn default() -> Self {
        CombatConfig {
            hostile_signature_id: 1,
            loss_timeout_cycles: 25, // 0.5 s at 50 Hz
            in_range_size: 80.0,
            fire_min_interval_secs: 1.0,
            hit_reaction_secs: 5.0,
            sensor_failure_threshold: 25,
            evasive_drive: DriveCommand::STOP,
            selection_policy: SelectionPolicy::LargestArea,
        }
    }
}

impl CombatConfig {
    /// Minimum time between honored shots
    pub fn fire_min_interval(&self) -> Duration {
        secs(self.fire_min_interval_secs)
    }

    /// How long a hit overrides normal behavior
    pub fn hit_reaction_duration(&self) -> Duration {
        secs(self.hit_reaction_secs)
    }
}
