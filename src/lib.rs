//! Tagbot - autonomous control core for a vision-guided laser tag robot
//!
//! This library turns a stream of camera block detections and incoming-fire
//! events into continuous wheel commands and discrete weapon-fire decisions,
//! one control cycle at a time.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// YAML configuration loading and validation
pub mod config;
/// Target selection, timers and the combat state machine
pub mod core;
/// Adapter traits, device adapters and the simulated arena
pub mod hardware;
/// Process-wide logger setup
pub mod logging;
/// Drive commands, pursuit and search control
pub mod navigation;

// Re-export commonly used items for easier access
pub use crate::config::{BotConfig, ConfigError, HardwareConfig};
pub use crate::core::{CombatConfig, CombatState, CombatStateMachine, CycleInput, Detection, Frame};
pub use crate::hardware::{Actuator, ActuatorError, HitSensor, SensorError, VisionSource};
pub use crate::navigation::{ActuationCommand, DriveCommand, NavigationConfig};

use log::{debug, error, info, warn};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// External stop signal, checked between cycles
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    /// A handle that has not been stopped yet
    pub fn new() -> Self {
        StopHandle::default()
    }

    /// Requests a clean shutdown after the current cycle
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// True once any clone of this handle was stopped
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stops this handle on Ctrl-C (SIGINT) instead of killing the process, so the
    /// loop can halt the motors on its way out. Only one handler per process.
    pub fn stop_on_interrupt(&self) -> Result<(), BotError> {
        let handle = self.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupt received, stopping after the current cycle");
            handle.stop();
        })
        .map_err(|e| BotError::Signal(e.to_string()))
    }
}

/// Primary entry point: the perception-to-actuation control loop
pub struct TagBot {
    machine: CombatStateMachine,
    vision: Box<dyn VisionSource>,
    hits: Box<dyn HitSensor>,
    actuator: Box<dyn Actuator>,
    cycle_period: Duration,
    poll_timeout: Duration,
    max_cycles: Option<u64>,
    rejection_threshold: u32,
    started: Instant,
    shots_delivered: u64, // Fire commands the actuator accepted
    actuator_rejections: u64,
    consecutive_rejections: u32,
    deadline_misses: u64,
    worst_cycle: Duration,
}

impl TagBot {
    /// Create a new control loop over the given adapters
    pub fn new(
        config: &BotConfig,
        vision: Box<dyn VisionSource>,
        hits: Box<dyn HitSensor>,
        actuator: Box<dyn Actuator>,
    ) -> Result<Self, BotError> {
        config.validate()?;

        Ok(TagBot {
            machine: CombatStateMachine::new(&config.combat, &config.navigation),
            vision,
            hits,
            actuator,
            cycle_period: config.hardware.cycle_period(),
            poll_timeout: config.hardware.frame_poll_timeout(),
            max_cycles: config.hardware.max_cycles,
            rejection_threshold: config.hardware.actuator_failure_threshold,
            started: Instant::now(),
            shots_delivered: 0,
            actuator_rejections: 0,
            consecutive_rejections: 0,
            deadline_misses: 0,
            worst_cycle: Duration::ZERO,
        })
    }

    /// Runs one cycle at the current loop time
    pub fn run_cycle(&mut self) -> ActuationCommand {
        let now = self.started.elapsed();
        self.run_cycle_at(now)
    }

    /// Runs one cycle at an explicit loop time: poll, decide, actuate.
    /// Returns the command that was sent to the actuator.
    pub fn run_cycle_at(&mut self, now: Duration) -> ActuationCommand {
        let frame = self.vision.poll_frame(self.poll_timeout);
        let hit = self.hits.poll_hit();
        let decided = self.machine.step(CycleInput { frame, hit, now });

        // A dead actuator only gets stops until it accepts one again
        let command = if self.actuator_degraded() {
            if decided.fire {
                debug!("Withholding shot, actuator unavailable");
            }
            ActuationCommand::stop()
        } else {
            decided
        };

        match self.actuator.actuate(&command) {
            Ok(()) => {
                if self.actuator_degraded() {
                    info!(
                        "Actuator accepting commands again after {} rejections",
                        self.consecutive_rejections
                    );
                }
                self.consecutive_rejections = 0;
                if command.fire {
                    self.shots_delivered += 1;
                }
            }
            Err(e) => {
                self.actuator_rejections += 1;
                self.consecutive_rejections = self.consecutive_rejections.saturating_add(1);
                if self.consecutive_rejections == self.rejection_threshold.saturating_add(1) {
                    error!(
                        "Actuator unavailable: {} commands in a row rejected, last: {}. \
                         Sending stops until it recovers",
                        self.consecutive_rejections, e
                    );
                } else {
                    warn!("Actuator rejected {:?}: {}", command, e);
                }
            }
        }

        command
    }

    fn actuator_degraded(&self) -> bool {
        self.consecutive_rejections > self.rejection_threshold
    }

    /// Main execution loop: runs cycles at the configured cadence until stopped,
    /// then halts the robot and returns the final status
    pub fn run(&mut self, stop: &StopHandle) -> Result<BotStatus, BotError> {
        info!(
            "Starting control loop: {:?} per cycle, frame poll bound {:?}",
            self.cycle_period, self.poll_timeout
        );

        let mut cycles = 0u64;
        while !stop.is_stopped() {
            if self.max_cycles.is_some_and(|max| cycles >= max) {
                info!("Reached cycle limit of {}", cycles);
                break;
            }

            let cycle_start = Instant::now();
            self.run_cycle();
            cycles += 1;

            let elapsed = cycle_start.elapsed();
            self.worst_cycle = self.worst_cycle.max(elapsed);
            if elapsed > self.cycle_period {
                self.deadline_misses += 1;
                debug!("Cycle overran its budget: {:?}", elapsed);
            } else {
                std::thread::sleep(self.cycle_period - elapsed);
            }
        }

        self.shutdown()?;
        Ok(self.status())
    }

    /// Stops the wheels and releases the actuator. Both steps are attempted
    /// even if the first fails.
    pub fn shutdown(&mut self) -> Result<(), BotError> {
        info!("Shutting down tagbot...");
        let halted = self.actuator.actuate(&ActuationCommand::stop());
        let released = self.actuator.release();

        if let Err(e) = &halted {
            error!("Failed to stop motors at shutdown: {}", e);
        }
        if let Err(e) = &released {
            error!("Failed to release actuator: {}", e);
        }
        halted.and(released)?;

        info!("Robot shutdown completed");
        Ok(())
    }

    /// Get current system status
    pub fn status(&self) -> BotStatus {
        BotStatus {
            state: self.machine.state(),
            tracked_signature: self.machine.tracked_target().map(|t| t.signature_id),
            cycles: self.machine.cycle(),
            shots_fired: self.shots_delivered,
            hits_taken: self.machine.hits_taken(),
            consecutive_sensor_failures: self.machine.consecutive_failures(),
            sensor_degraded: self.machine.is_degraded(),
            actuator_rejections: self.actuator_rejections,
            actuator_degraded: self.actuator_degraded(),
            deadline_misses: self.deadline_misses,
            worst_cycle_ms: self.worst_cycle.as_secs_f64() * 1000.0,
        }
    }

    /// The combat state machine driving this loop
    pub fn machine(&self) -> &CombatStateMachine {
        &self.machine
    }
}

/// Snapshot of the control loop for operators and logs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotStatus {
    /// Combat state after the last cycle
    pub state: CombatState,
    /// Signature of the tracked target, if any
    pub tracked_signature: Option<crate::core::SignatureId>,
    /// Cycles run so far
    pub cycles: u64,
    /// Fire commands the actuator accepted
    pub shots_fired: u64,
    /// Incoming hits registered
    pub hits_taken: u64,
    /// Failed frame polls in a row
    pub consecutive_sensor_failures: u32,
    /// Camera considered down; the robot is holding still
    pub sensor_degraded: bool,
    /// Commands the actuator refused, in total
    pub actuator_rejections: u64,
    /// Actuator considered down; only stops are being sent
    pub actuator_degraded: bool,
    /// Cycles that ran longer than the cycle period
    pub deadline_misses: u64,
    /// Longest cycle seen, in milliseconds
    pub worst_cycle_ms: f64,
}

/// Tagbot error types
#[derive(Debug)]
pub enum BotError {
    /// Configuration could not be loaded or is invalid
    Config(ConfigError),
    /// Actuator failed during setup or shutdown
    Actuator(ActuatorError),
    /// The interrupt handler could not be installed
    Signal(String),
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BotError::Config(e) => write!(f, "{}", e),
            BotError::Actuator(e) => write!(f, "{}", e),
            BotError::Signal(msg) => write!(f, "Signal handler error: {}", msg),
        }
    }
}

impl std::error::Error for BotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BotError::Config(e) => Some(e),
            BotError::Actuator(e) => Some(e),
            BotError::Signal(_) => None,
        }
    }
}

impl From<ConfigError> for BotError {
    fn from(e: ConfigError) -> Self {
        BotError::Config(e)
    }
}

impl From<ActuatorError> for BotError {
    fn from(e: ActuatorError) -> Self {
        BotError::Actuator(e)
    }
}
