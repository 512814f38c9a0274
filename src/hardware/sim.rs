// src/hardware/sim.rs
// Simulated arena for running the control loop without a robot. One hostile block
// drifts around a 360 degree ring, slides across the image as the robot turns,
// grows as it advances, and now and then drops out of a frame. Incoming hits
// arrive on a fixed cycle schedule.

use super::{Actuator, ActuatorError, HitSensor, SensorError, VisionSource};
use crate::core::{Detection, Frame, FrameGeometry, SignatureId};
use crate::navigation::ActuationCommand;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Simulated arena parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Seed for every random draw in the arena
    pub seed: u64,
    /// An incoming hit every this many cycles (0 disables hits)
    pub hit_every_cycles: u64,
    /// Chance a poll delivers no frame
    pub dropout_probability: f64,
    /// Image shift (px) per cycle at full turn
    pub turn_rate_px: f64,
    /// Block growth (px) per cycle at full forward drive
    pub approach_rate_px: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            seed: 42,
            hit_every_cycles: 600,
            dropout_probability: 0.05,
            turn_rate_px: 40.0,
            approach_rate_px: 3.0,
        }
    }
}

/// Simulated arena: one opponent, one friendly marker, scheduled incoming fire
pub struct SimArena {
    rng: StdRng,
    config: SimConfig,
    geometry: FrameGeometry,
    hostile: SignatureId,
    target_x: f64,     // Ring coordinate; the visible window is 0..width
    target_width: f64, // Apparent size in pixels
    tick: u64,
    last_hit_tick: u64,
    shots: u64,
    tags: u64,
}

impl SimArena {
    /// Arena with the opponent at a random position
    pub fn new(config: &SimConfig, geometry: FrameGeometry, hostile: SignatureId) -> Self {
        let mut arena = SimArena {
            rng: StdRng::seed_from_u64(config.seed),
            config: config.clone(),
            geometry,
            hostile,
            target_x: 0.0,
            target_width: 0.0,
            tick: 0,
            last_hit_tick: 0,
            shots: 0,
            tags: 0,
        };
        arena.respawn();
        arena
    }

    /// Wraps the arena so one instance can back all three adapter traits
    pub fn shared(config: &SimConfig, geometry: FrameGeometry, hostile: SignatureId) -> SimHandle {
        SimHandle(Arc::new(Mutex::new(SimArena::new(config, geometry, hostile))))
    }

    /// Frames served so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Fire commands received
    pub fn shots(&self) -> u64 {
        self.shots
    }

    /// Shots that hit the opponent
    pub fn tags(&self) -> u64 {
        self.tags
    }

    fn ring(&self) -> f64 {
        self.geometry.width * 4.0
    }

    fn respawn(&mut self) {
        let ring = self.ring();
        self.target_x = self.rng.gen_range(0.0..ring) - self.geometry.width * 1.5;
        self.target_width = self.rng.gen_range(8.0..20.0);
        debug!("Simulated opponent at x={:.1}, width {:.1}", self.target_x, self.target_width);
    }

    fn wrap(&mut self) {
        let ring = self.ring();
        let low = -self.geometry.width * 1.5;
        self.target_x = (self.target_x - low).rem_euclid(ring) + low;
    }

    fn visible(&self) -> bool {
        (0.0..=self.geometry.width).contains(&self.target_x)
    }

    fn frame(&mut self, timeout: Duration) -> Result<Frame, SensorError> {
        self.tick += 1;
        self.target_x += self.rng.gen_range(-2.0..2.0);
        self.wrap();

        if self.rng.gen_bool(self.config.dropout_probability.clamp(0.0, 1.0)) {
            return Err(SensorError::Timeout(timeout));
        }

        let mut frame = Frame::empty();
        if self.visible() {
            frame.push(Detection::new(
                self.hostile,
                self.target_x,
                self.geometry.height / 2.0,
                self.target_width,
                self.target_width * 0.8,
            ));
        }
        // A friendly marker that must never be chased
        frame.push(Detection::new(
            self.hostile.wrapping_add(1),
            self.geometry.width * 0.2,
            self.geometry.height * 0.3,
            30.0,
            30.0,
        ));
        Ok(frame)
    }

    fn hit_due(&mut self) -> bool {
        let every = self.config.hit_every_cycles;
        if every == 0 || self.tick == 0 || self.tick % every != 0 {
            return false;
        }
        if self.last_hit_tick == self.tick {
            return false;
        }
        self.last_hit_tick = self.tick;
        true
    }

    fn apply(&mut self, command: &ActuationCommand) {
        let turn = (command.left_drive - command.right_drive) / 2.0;
        let forward = (command.left_drive + command.right_drive) / 2.0;

        // Turning right slides the scene left in the image
        self.target_x -= turn * self.config.turn_rate_px;
        let grown = self.target_width + forward * self.config.approach_rate_px;
        self.target_width = grown.clamp(5.0, 140.0);
        self.wrap();

        if command.fire {
            self.shots += 1;
            let centered = (self.target_x - self.geometry.center().x).abs() < 25.0;
            if self.visible() && centered {
                self.tags += 1;
                info!("Simulated opponent tagged ({} so far)", self.tags);
                self.respawn();
            }
        }
    }
}

/// Shared handle onto a [`SimArena`]
#[derive(Clone)]
pub struct SimHandle(Arc<Mutex<SimArena>>);

impl SimHandle {
    /// Locks the arena, recovering from a poisoned lock
    pub fn arena(&self) -> MutexGuard<'_, SimArena> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VisionSource for SimHandle {
    fn poll_frame(&mut self, timeout: Duration) -> Result<Frame, SensorError> {
        self.arena().frame(timeout)
    }
}

impl HitSensor for SimHandle {
    fn poll_hit(&mut self) -> bool {
        self.arena().hit_due()
    }
}

impl Actuator for SimHandle {
    fn actuate(&mut self, command: &ActuationCommand) -> Result<(), ActuatorError> {
        self.arena().apply(command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> SimConfig {
        SimConfig {
            dropout_probability: 0.0,
            hit_every_cycles: 3,
            ..SimConfig::default()
        }
    }

    #[test]
    fn hits_follow_schedule_once_per_tick() {
        let mut handle = SimArena::shared(&quiet_config(), FrameGeometry::default(), 1);
        let mut hits = Vec::new();
        for _ in 0..6 {
            handle.poll_frame(Duration::from_millis(1)).unwrap();
            hits.push(handle.poll_hit());
            assert!(!handle.poll_hit());
        }
        assert_eq!(hits, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn frames_always_carry_the_friendly_marker() {
        let mut handle = SimArena::shared(&quiet_config(), FrameGeometry::default(), 1);
        for _ in 0..20 {
            let frame = handle.poll_frame(Duration::from_millis(1)).unwrap();
            assert!(frame.detections().iter().any(|d| d.signature_id == 2));
        }
    }

    #[test]
    fn advancing_grows_the_block() {
        let handle = SimArena::shared(&quiet_config(), FrameGeometry::default(), 1);
        let before = handle.arena().target_width;
        let mut actuator = handle.clone();
        actuator
            .actuate(&ActuationCommand {
                left_drive: 1.0,
                right_drive: 1.0,
                fire: false,
            })
            .unwrap();
        assert!(handle.arena().target_width > before);
    }
}
