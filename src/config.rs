// src/config.rs
// Stores the run configuration for tagbot and loads it from YAML.

// BotConfig groups one section per subsystem. Every section falls back to its
// defaults, so a file only needs the keys it changes. Durations are written as
// seconds in YAML and handed to the core as `Duration`.

use crate::core::CombatConfig;
use crate::hardware::sim::SimConfig;
use crate::hardware::MotorMapping;
use crate::logging::LoggingConfig;
use crate::navigation::NavigationConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Converts configured seconds to a `Duration`; negative or non-finite values become zero
pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Main configuration structure for tagbot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    /// Target selection, firing and hit reaction
    pub combat: CombatConfig,
    /// Pursuit and search drive control
    pub navigation: NavigationConfig,
    /// Loop timing and device settings
    pub hardware: HardwareConfig,
    /// Log level and sink
    pub logging: LoggingConfig,
}

/// Loop timing and device settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HardwareConfig {
    /// Control cycle period (seconds)
    pub cycle_period_secs: f64,
    /// Longest wait for a camera frame (seconds)
    pub frame_poll_timeout_secs: f64,
    /// Stop after this many cycles; runs until stopped when absent
    pub max_cycles: Option<u64>,
    /// Consecutive rejected commands tolerated before the loop only sends stops
    pub actuator_failure_threshold: u32,
    /// Motor driver scaling
    pub motors: MotorMapping,
    /// Simulated arena used by the binary
    pub simulation: SimConfig,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        HardwareConfig {
            cycle_period_secs: 0.02, // 50 Hz
            frame_poll_timeout_secs: 0.01,
            max_cycles: Some(1500),
            actuator_failure_threshold: 25,
            motors: MotorMapping::default(),
            simulation: SimConfig::default(),
        }
    }
}

impl HardwareConfig {
    /// Time budget of one control cycle
    pub fn cycle_period(&self) -> Duration {
        secs(self.cycle_period_secs)
    }

    /// Longest wait for a camera frame each cycle
    pub fn frame_poll_timeout(&self) -> Duration {
        secs(self.frame_poll_timeout_secs)
    }
}

/// Configuration error types
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// File could not be read
    Io(String),
    /// YAML did not match the schema
    Parse(String),
    /// A value is out of range or inconsistent
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl BotConfig {
    /// Loads and validates a YAML config file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config: BotConfig =
            serde_yaml::from_reader(file).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: BotConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the control loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nav = &self.navigation;
        let combat = &self.combat;
        let hw = &self.hardware;

        positive("navigation.frame.width", nav.frame.width)?;
        positive("navigation.frame.height", nav.frame.height)?;
        let range = nav.drive_clamp_range;
        if !(range.min.is_finite() && range.max.is_finite() && range.min < range.max) {
            return Err(invalid(format!(
                "navigation.drive_clamp_range must satisfy min < max, got [{}, {}]",
                range.min, range.max
            )));
        }
        if !range.contains(0.0) {
            return Err(invalid(format!(
                "navigation.drive_clamp_range [{}, {}] must allow a full stop",
                range.min, range.max
            )));
        }
        positive("navigation.close_enough_size", nav.close_enough_size)?;
        non_negative("navigation.steering_gain", nav.steering_gain)?;
        non_negative("navigation.max_forward_speed", nav.max_forward_speed)?;
        non_negative("navigation.search_turn_speed", nav.search_turn_speed)?;
        non_negative("navigation.search_forward_speed", nav.search_forward_speed)?;
        positive("navigation.search_rotate_min_secs", nav.search_rotate_min_secs)?;
        positive("navigation.search_rotate_max_secs", nav.search_rotate_max_secs)?;
        if nav.search_rotate_min_secs > nav.search_rotate_max_secs {
            return Err(invalid(
                "navigation.search_rotate_min_secs exceeds search_rotate_max_secs".to_string(),
            ));
        }
        positive("navigation.max_search_straight_secs", nav.max_search_straight_secs)?;

        positive("combat.in_range_size", combat.in_range_size)?;
        non_negative("combat.fire_min_interval_secs", combat.fire_min_interval_secs)?;
        positive("combat.hit_reaction_secs", combat.hit_reaction_secs)?;
        let evasive = combat.evasive_drive;
        if !(range.contains(evasive.left) && range.contains(evasive.right)) {
            return Err(invalid(format!(
                "combat.evasive_drive ({}, {}) lies outside the drive clamp range",
                evasive.left, evasive.right
            )));
        }

        positive("hardware.cycle_period_secs", hw.cycle_period_secs)?;
        non_negative("hardware.frame_poll_timeout_secs", hw.frame_poll_timeout_secs)?;
        if hw.frame_poll_timeout_secs > hw.cycle_period_secs {
            return Err(invalid(
                "hardware.frame_poll_timeout_secs must fit inside one cycle".to_string(),
            ));
        }
        if hw.motors.max_motor_speed <= 0 {
            return Err(invalid("hardware.motors.max_motor_speed must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&hw.motors.deadband) {
            return Err(invalid("hardware.motors.deadband must be in [0, 1)".to_string()));
        }
        if !(0.0..=1.0).contains(&hw.simulation.dropout_probability) {
            return Err(invalid(
                "hardware.simulation.dropout_probability must be in [0, 1]".to_string(),
            ));
        }

        Ok(())
    }
}

fn invalid(msg: String) -> ConfigError {
    ConfigError::Invalid(msg)
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{} must be positive, got {}", name, value)))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{} must not be negative, got {}", name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use crate::navigation::{DriveCommand, DriveRange};
    use rstest::rstest;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(BotConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = BotConfig::from_yaml_str(
            "combat:\n  hostile_signature_id: 3\n  fire_min_interval_secs: 0.5\n\
             logging:\n  level: debug\n",
        )
        .unwrap();

        assert_eq!(config.combat.hostile_signature_id, 3);
        assert_eq!(config.combat.fire_min_interval(), Duration::from_millis(500));
        assert_eq!(config.combat.loss_timeout_cycles, 25);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.hardware.cycle_period(), Duration::from_millis(20));
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let err = BotConfig::from_yaml_str("combat:\n  selection_policy: nearest\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn duration_keys_accept_their_plain_names() {
        let config = BotConfig::from_yaml_str(
            "combat:\n  fire_min_interval: 0.25\n  hit_reaction_duration: 2.0\n\
             navigation:\n  max_search_straight_duration: 0.2\n",
        )
        .unwrap();

        assert_eq!(config.combat.fire_min_interval(), Duration::from_millis(250));
        assert_eq!(config.combat.hit_reaction_duration(), Duration::from_secs(2));
        assert_eq!(
            config.navigation.max_search_straight_duration(),
            Duration::from_millis(200)
        );
    }

    #[rstest]
    #[case::top_level("combt:\n  hostile_signature_id: 2\n")]
    #[case::combat("combat:\n  fire_interval: 0.5\n")]
    #[case::navigation("navigation:\n  steering: 0.3\n")]
    #[case::clamp_range("navigation:\n  drive_clamp_range:\n    low: -1.0\n    max: 1.0\n")]
    #[case::hardware("hardware:\n  cycle_secs: 0.01\n")]
    #[case::motors("hardware:\n  motors:\n    max_speed: 300\n")]
    #[case::simulation("hardware:\n  simulation:\n    hits_every: 10\n")]
    #[case::logging("logging:\n  file: /tmp/tagbot.log\n")]
    fn misspelled_keys_are_parse_errors(#[case] yaml: &str) {
        let err = BotConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{:?}", err);
    }

    #[test]
    fn actuator_threshold_has_its_own_key() {
        let config =
            BotConfig::from_yaml_str("hardware:\n  actuator_failure_threshold: 4\n").unwrap();
        assert_eq!(config.hardware.actuator_failure_threshold, 4);
        assert_eq!(config.combat.sensor_failure_threshold, 25);
    }

    #[test]
    fn shipped_config_file_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/tagbot.yaml");
        let config = BotConfig::from_yaml_file(path).unwrap();
        assert_eq!(config.hardware.max_cycles, Some(1500));
        assert_eq!(config.navigation.search_seed, 0x7a6b07);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = BotConfig::from_yaml_file("/nonexistent/tagbot.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[rstest]
    #[case::inverted_clamp(|c: &mut BotConfig| {
        c.navigation.drive_clamp_range = DriveRange { min: 1.0, max: -1.0 }
    })]
    #[case::clamp_without_stop(|c: &mut BotConfig| {
        c.navigation.drive_clamp_range = DriveRange { min: 0.2, max: 1.0 }
    })]
    #[case::zero_frame(|c: &mut BotConfig| c.navigation.frame.width = 0.0)]
    #[case::negative_cooldown(|c: &mut BotConfig| c.combat.fire_min_interval_secs = -1.0)]
    #[case::zero_hit_reaction(|c: &mut BotConfig| c.combat.hit_reaction_secs = 0.0)]
    #[case::evasive_out_of_range(|c: &mut BotConfig| {
        c.combat.evasive_drive = DriveCommand::new(-2.0, 0.0)
    })]
    #[case::rotate_bounds_swapped(|c: &mut BotConfig| c.navigation.search_rotate_min_secs = 9.0)]
    #[case::poll_longer_than_cycle(|c: &mut BotConfig| c.hardware.frame_poll_timeout_secs = 1.0)]
    #[case::full_deadband(|c: &mut BotConfig| c.hardware.motors.deadband = 1.0)]
    fn rejects_inconsistent_values(#[case] tweak: fn(&mut BotConfig)) {
        let mut config = BotConfig::default();
        tweak(&mut config);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn secs_never_panics() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
        assert_eq!(secs(0.25), Duration::from_millis(250));
    }
}
