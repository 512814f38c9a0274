// src/hardware/publisher.rs
// Outbound adapters: maps normalized drive onto the motor driver's integer speed
// scale and sends fire commands down the serial line to the IR emitter.

use super::{Actuator, ActuatorError};
use crate::navigation::ActuationCommand;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Line the IR emitter's microcontroller fires on
pub const FIRE_LINE: &[u8] = b"FIRE\n";

/// Normalized drive to motor driver speed conversion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotorMapping {
    /// Driver speed at full normalized drive
    pub max_motor_speed: i32,
    /// Fraction of max speed below which the motor is left off
    pub deadband: f64,
}

impl Default for MotorMapping {
    fn default() -> Self {
        MotorMapping {
            max_motor_speed: 480,
            deadband: 0.05,
        }
    }
}

impl MotorMapping {
    /// Scales, applies the deadband and saturates at the driver limit
    pub fn to_motor(&self, drive: f64) -> i32 {
        let max = f64::from(self.max_motor_speed);
        let raw = drive * max;
        if !raw.is_finite() || raw.abs() < self.deadband * max {
            return 0;
        }
        raw.clamp(-max, max) as i32
    }

    /// Left and right driver speeds for a command
    pub fn speeds(&self, command: &ActuationCommand) -> (i32, i32) {
        (
            self.to_motor(command.left_drive),
            self.to_motor(command.right_drive),
        )
    }
}

/// Low-level dual motor driver
pub trait MotorDriver {
    /// Sets both wheel speeds in driver units
    fn set_speeds(&mut self, left: i32, right: i32) -> Result<(), ActuatorError>;
}

/// Serial link to the IR emitter
pub struct LaserLine<W: Write> {
    writer: W,
    shots: u64,
}

impl<W: Write> LaserLine<W> {
    /// Laser line over a serial writer
    pub fn new(writer: W) -> Self {
        LaserLine { writer, shots: 0 }
    }

    /// Writes one fire line and flushes
    pub fn fire(&mut self) -> Result<(), ActuatorError> {
        self.writer
            .write_all(FIRE_LINE)
            .and_then(|_| self.writer.flush())
            .map_err(|e| ActuatorError::Io(e.to_string()))?;
        self.shots += 1;
        debug!("Laser fired ({} shots)", self.shots);
        Ok(())
    }

    /// Fire lines written so far
    pub fn shots(&self) -> u64 {
        self.shots
    }

    /// Underlying serial writer
    pub fn writer(&self) -> &W {
        &self.writer
    }
}

/// Actuator for the physical robot: motor driver plus serial laser line
pub struct RobotActuator<M: MotorDriver, W: Write> {
    motors: M,
    mapping: MotorMapping,
    laser: LaserLine<W>,
}

impl<M: MotorDriver, W: Write> RobotActuator<M, W> {
    /// Actuator over a motor driver and the laser serial line
    pub fn new(motors: M, mapping: MotorMapping, laser_writer: W) -> Self {
        RobotActuator {
            motors,
            mapping,
            laser: LaserLine::new(laser_writer),
        }
    }

    /// Motor driver in use
    pub fn motors(&self) -> &M {
        &self.motors
    }

    /// Laser line in use
    pub fn laser(&self) -> &LaserLine<W> {
        &self.laser
    }
}

impl<M: MotorDriver, W: Write> Actuator for RobotActuator<M, W> {
    fn actuate(&mut self, command: &ActuationCommand) -> Result<(), ActuatorError> {
        let (left, right) = self.mapping.speeds(command);
        self.motors.set_speeds(left, right)?;
        if command.fire {
            self.laser.fire()?;
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        info!("Releasing motors");
        self.motors.set_speeds(0, 0)
    }
}
