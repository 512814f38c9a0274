// src/navigation/planner.rs
// Search controller: roams when no target is visible by alternating
// rotate-in-place phases and short forward bursts on a seeded schedule.

use super::{DriveCommand, DriveRange, NavigationConfig};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Current leg of the search schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// Spin in place; clockwise drives the left wheel forward
    Rotate {
        /// Turn direction for this phase
        clockwise: bool,
    },
    /// Straight burst, never longer than the configured maximum
    Forward,
}

/// Deterministic scan/roam behavior keyed to elapsed time
pub struct SearchController {
    rng: StdRng,
    turn_speed: f64,
    forward_speed: f64,
    rotate_min: Duration,
    rotate_max: Duration,
    max_straight: Duration,
    clamp: DriveRange,
    phase: SearchPhase,
    phase_started_at: Duration,
    phase_ends_at: Duration,
}

impl SearchController {
    /// Seeded search schedule starting with a rotate phase
    pub fn new(config: &NavigationConfig) -> Self {
        let mut search = SearchController {
            rng: StdRng::seed_from_u64(config.search_seed),
            turn_speed: config.search_turn_speed,
            forward_speed: config.search_forward_speed,
            rotate_min: config.search_rotate_min(),
            rotate_max: config.search_rotate_max(),
            max_straight: config.max_search_straight_duration(),
            clamp: config.drive_clamp_range,
            phase: SearchPhase::Forward,
            phase_started_at: Duration::ZERO,
            phase_ends_at: Duration::ZERO,
        };
        search.reset(Duration::ZERO);
        search
    }

    /// Restarts the schedule with a rotate phase beginning at `now`
    pub fn reset(&mut self, now: Duration) {
        self.start_rotate(now);
        debug!("Search schedule reset: {:?} until {:?}", self.phase, self.phase_ends_at);
    }

    /// Drive command for the phase active at `now`
    pub fn command(&mut self, now: Duration) -> DriveCommand {
        // Long gaps (first call after a pause) restart instead of replaying missed phases
        if now > self.phase_ends_at + self.rotate_max + self.max_straight {
            self.reset(now);
        }
        while now >= self.phase_ends_at {
            self.advance();
        }

        let drive = match self.phase {
            SearchPhase::Rotate { clockwise: true } => {
                DriveCommand::new(self.turn_speed, -self.turn_speed)
            }
            SearchPhase::Rotate { clockwise: false } => {
                DriveCommand::new(-self.turn_speed, self.turn_speed)
            }
            SearchPhase::Forward => DriveCommand::new(self.forward_speed, self.forward_speed),
        };
        drive.clamped(&self.clamp)
    }

    /// Phase active after the last command
    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    /// (start, end) of the current phase
    pub fn phase_window(&self) -> (Duration, Duration) {
        (self.phase_started_at, self.phase_ends_at)
    }

    fn advance(&mut self) {
        let boundary = self.phase_ends_at;
        match self.phase {
            SearchPhase::Rotate { .. } => {
                let lower = self.max_straight / 4;
                let length = self.random_between(lower, self.max_straight);
                self.phase = SearchPhase::Forward;
                self.phase_started_at = boundary;
                self.phase_ends_at = boundary + length;
            }
            SearchPhase::Forward => self.start_rotate(boundary),
        }
        debug!("Search phase {:?} until {:?}", self.phase, self.phase_ends_at);
    }

    fn start_rotate(&mut self, at: Duration) {
        let clockwise = self.rng.gen_bool(0.5);
        let length = self.random_between(self.rotate_min, self.rotate_max);
        self.phase = SearchPhase::Rotate { clockwise };
        self.phase_started_at = at;
        self.phase_ends_at = at + length;
    }

    fn random_between(&mut self, low: Duration, high: Duration) -> Duration {
        if high <= low {
            return low.max(Duration::from_millis(1));
        }
        let secs = self.rng.gen_range(low.as_secs_f64()..=high.as_secs_f64());
        Duration::from_secs_f64(secs)
            .clamp(low, high)
            .max(Duration::from_millis(1))
    }
}
