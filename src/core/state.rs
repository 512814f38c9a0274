// core/state.rs

// Combat state machine: every cycle it decides whether the robot is searching,
// pursuing, firing or reacting to a hit, and emits one combined actuation command.
// Sensor trouble degrades to a stopped robot; nothing here ever halts the loop.

// Dependencies
use log::{debug, error, info, warn};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::perception::{Frame, FrameGeometry, TargetSelector, TrackedTarget};
use super::timers::{FireCooldown, HitReaction};
use super::CombatConfig;
use crate::hardware::SensorError;
use crate::navigation::{
    ActuationCommand, DriveCommand, NavigationConfig, PursuitController, SearchController,
};

// Robot combat modes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatState {
    /// No target, roaming
    Searching,
    /// Centering on and approaching a target
    Pursuing,
    /// Pursuing and a shot went out this cycle
    Firing,
    /// Overridden by incoming fire
    HitReacting,
}

impl fmt::Display for CombatState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            CombatState::Searching => "SEARCHING",
            CombatState::Pursuing => "PURSUING",
            CombatState::Firing => "FIRING",
            CombatState::HitReacting => "HIT_REACTING",
        };
        f.write_str(name)
    }
}

/// Everything the state machine consumes in one cycle
#[derive(Debug)]
pub struct CycleInput {
    /// Result of the frame poll; errors are treated as an empty frame
    pub frame: Result<Frame, SensorError>,
    /// A pending hit was drained this cycle
    pub hit: bool,
    /// Monotonic time since the loop started
    pub now: Duration,
}

/// Top-level coordinator of the control core
pub struct CombatStateMachine {
    state: CombatState,
    selector: TargetSelector,
    pursuit: PursuitController,
    search: SearchController,
    cooldown: FireCooldown,
    hit_reaction: HitReaction,
    geometry: FrameGeometry,
    in_range_size: f64,
    evasive_drive: DriveCommand,
    failure_threshold: u32,
    consecutive_failures: u32,
    degraded: bool,
    search_engaged: bool,
    cycle: u64,
    shots_fired: u64,
    hits_taken: u64,
}

impl CombatStateMachine {
    /// Starts in Searching with a fresh cooldown and no tracked target
    pub fn new(combat: &CombatConfig, navigation: &NavigationConfig) -> Self {
        CombatStateMachine {
            state: CombatState::Searching,
            selector: TargetSelector::new(
                combat.hostile_signature_id,
                combat.loss_timeout_cycles,
                combat.selection_policy,
                navigation.frame,
            ),
            pursuit: PursuitController::new(navigation),
            search: SearchController::new(navigation),
            cooldown: FireCooldown::new(combat.fire_min_interval()),
            hit_reaction: HitReaction::new(combat.hit_reaction_duration()),
            geometry: navigation.frame,
            in_range_size: combat.in_range_size,
            evasive_drive: combat.evasive_drive.clamped(&navigation.drive_clamp_range),
            failure_threshold: combat.sensor_failure_threshold,
            consecutive_failures: 0,
            degraded: false,
            search_engaged: false,
            cycle: 0,
            shots_fired: 0,
            hits_taken: 0,
        }
    }

    /// Runs one control cycle and returns the command for the actuator
    pub fn step(&mut self, input: CycleInput) -> ActuationCommand {
        let now = input.now;
        self.cycle += 1;

        if input.hit {
            self.hits_taken += 1;
            self.hit_reaction.on_hit(now);
            warn!(
                "Hit received on cycle {}, reacting for {:?}",
                self.cycle,
                self.hit_reaction.duration()
            );
        }
        if self.hit_reaction.expire(now) {
            info!("Hit reaction over, resuming normal behavior");
        }

        let frame = self.ingest(input.frame);

        // 1. Incoming fire overrides everything
        if self.hit_reaction.is_reacting(now) {
            self.search_engaged = false;
            self.transition(CombatState::HitReacting);
            return ActuationCommand::from_drive(self.evasive_drive, false);
        }

        // Sustained sensor failure: stop in place rather than act on stale data
        if self.consecutive_failures > self.failure_threshold {
            if !self.degraded {
                error!(
                    "Sensor degraded: {} consecutive failed polls, holding still",
                    self.consecutive_failures
                );
                self.degraded = true;
                self.selector.clear();
            }
            self.search_engaged = false;
            self.transition(CombatState::Searching);
            return ActuationCommand::stop();
        }

        // 2. Pursue whatever the selector is tracking
        let target = self.selector.update(&frame, self.cycle).cloned();
        if let Some(target) = target {
            self.search_engaged = false;
            let drive = self.pursuit.drive(&target);
            let fire = target.last_known_size >= self.in_range_size && self.cooldown.try_fire(now);
            if fire {
                self.shots_fired += 1;
                info!(
                    "Firing at signature {} (size {}, shot {})",
                    target.signature_id, target.last_known_size, self.shots_fired
                );
                self.transition(CombatState::Firing);
            } else {
                self.transition(CombatState::Pursuing);
            }
            return ActuationCommand::from_drive(drive, fire);
        }

        // 3. Nothing to chase
        if !self.search_engaged {
            self.search.reset(now);
            self.search_engaged = true;
        }
        self.transition(CombatState::Searching);
        ActuationCommand::from_drive(self.search.command(now), false)
    }

    // Sanitizes the polled frame and keeps the consecutive failure count
    fn ingest(&mut self, polled: Result<Frame, SensorError>) -> Frame {
        match polled {
            Ok(mut frame) => {
                let delivered = frame.len();
                let dropped = frame.sanitize(&self.geometry);
                if delivered > 0 && dropped == delivered {
                    self.record_failure("every detection in the frame was malformed");
                } else {
                    self.record_success();
                }
                frame
            }
            Err(e) => {
                self.record_failure(&e.to_string());
                Frame::empty()
            }
        }
    }

    fn record_failure(&mut self, reason: &str) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        debug!(
            "Sensor failure #{} on cycle {}: {}",
            self.consecutive_failures, self.cycle, reason
        );
    }

    fn record_success(&mut self) {
        if self.degraded {
            info!(
                "Sensor recovered after {} failed polls",
                self.consecutive_failures
            );
            self.degraded = false;
        }
        self.consecutive_failures = 0;
    }

    fn transition(&mut self, next: CombatState) {
        if next == self.state {
            return;
        }
        match (self.state, next) {
            (CombatState::Pursuing, CombatState::Firing)
            | (CombatState::Firing, CombatState::Pursuing) => {
                debug!("Transitioned to {} from {}", next, self.state)
            }
            _ => info!("Transitioned to {} from {}", next, self.state),
        }
        self.state = next;
    }

    /// Returns current combat state
    pub fn state(&self) -> CombatState {
        self.state
    }

    /// Target being pursued, if any
    pub fn tracked_target(&self) -> Option<&TrackedTarget> {
        self.selector.tracked()
    }

    /// Number of cycles run so far
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Fire commands issued so far
    pub fn shots_fired(&self) -> u64 {
        self.shots_fired
    }

    /// Hits registered so far
    pub fn hits_taken(&self) -> u64 {
        self.hits_taken
    }

    /// Failed frame polls in a row
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// True while the camera is considered down
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Weapon cooldown gate
    pub fn cooldown(&self) -> &FireCooldown {
        &self.cooldown
    }

    /// Hit reaction window
    pub fn hit_reaction(&self) -> &HitReaction {
        &self.hit_reaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Detection;

    fn machine() -> CombatStateMachine {
        let combat = CombatConfig {
            loss_timeout_cycles: 2,
            sensor_failure_threshold: 3,
            ..CombatConfig::default()
        };
        CombatStateMachine::new(&combat, &NavigationConfig::default())
    }

    fn frame_with(x: f64, width: f64) -> Frame {
        Frame::new(vec![Detection::new(1, x, 100.0, width, width)])
    }

    fn input(frame: Result<Frame, SensorError>, now_ms: u64) -> CycleInput {
        CycleInput {
            frame,
            hit: false,
            now: Duration::from_millis(now_ms),
        }
    }

    #[test]
    fn starts_searching() {
        let mut machine = machine();
        assert_eq!(machine.state(), CombatState::Searching);
        let command = machine.step(input(Ok(Frame::empty()), 0));
        assert_eq!(machine.state(), CombatState::Searching);
        assert!(!command.fire);
    }

    #[test]
    fn malformed_only_frames_count_as_failures() {
        let mut machine = machine();
        let bad = Frame::new(vec![Detection::new(1, 500.0, 100.0, 10.0, 10.0)]);
        machine.step(input(Ok(bad.clone()), 0));
        machine.step(input(Ok(bad), 20));
        assert_eq!(machine.consecutive_failures(), 2);

        machine.step(input(Ok(Frame::empty()), 40));
        assert_eq!(machine.consecutive_failures(), 0);
    }

    #[test]
    fn sustained_failures_force_stopped_search_then_recover() {
        let mut machine = machine();
        machine.step(input(Ok(frame_with(150.0, 20.0)), 0));
        assert_eq!(machine.state(), CombatState::Pursuing);

        let mut last = ActuationCommand::default();
        for i in 1..=4 {
            last = machine.step(input(
                Err(SensorError::Timeout(Duration::from_millis(10))),
                i * 20,
            ));
        }
        assert!(machine.is_degraded());
        assert_eq!(machine.state(), CombatState::Searching);
        assert!(last.drive().is_stopped());
        assert!(machine.tracked_target().is_none());

        machine.step(input(Ok(frame_with(150.0, 20.0)), 200));
        assert!(!machine.is_degraded());
        assert_eq!(machine.state(), CombatState::Pursuing);
    }

    #[test]
    fn evasive_drive_is_clamped_to_range() {
        let combat = CombatConfig {
            evasive_drive: DriveCommand::new(-3.0, -3.0),
            ..CombatConfig::default()
        };
        let mut machine = CombatStateMachine::new(&combat, &NavigationConfig::default());
        let command = machine.step(CycleInput {
            frame: Ok(Frame::empty()),
            hit: true,
            now: Duration::ZERO,
        });
        assert_eq!(command.drive(), DriveCommand::new(-1.0, -1.0));
        assert_eq!(machine.hits_taken(), 1);
    }
}
