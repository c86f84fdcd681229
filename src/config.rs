//! Configuration for Disha
//!
//! Loaded once at startup from a TOML file and immutable afterwards. Every
//! field has a default, so a partial file (or no file at all) is valid.
//!
//! ```text
//! Config
//! ├── robot                 # wheel_radius, track_width
//! ├── odometry              # period_ms, jump_warn_cm
//! ├── sensors
//! │   ├── reflectance       # period_ms, threshold, trigger, debounce_ms
//! │   └── proximity
//! ├── motion                # speeds, tolerances, command_timeout_ms
//! ├── localization          # line localizer
//! │   └── fine_alignment
//! ├── proximity             # proximity localizer
//! ├── simulation            # mock device (see devices::mock::config)
//! ├── mission               # localizer, target, final_heading
//! └── logging
//! ```

use crate::core::types::GridPoint;
use crate::devices::mock::config::SimulationConfig;
use crate::error::{Error, Result};
use crate::state::{EventRule, Trigger};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub robot: RobotConfig,
    pub odometry: OdometryConfig,
    pub sensors: SensorsConfig,
    pub motion: MotionConfig,
    pub localization: LineLocalizerConfig,
    pub proximity: ProximityLocalizerConfig,
    pub simulation: SimulationConfig,
    pub mission: MissionConfig,
    pub logging: LoggingConfig,
}

/// Drive geometry
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Wheel radius (cm)
    pub wheel_radius: f64,
    /// Distance between the wheel contact points (cm)
    pub track_width: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            wheel_radius: 2.1,
            track_width: 15.2,
        }
    }
}

/// Odometry updater settings
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct OdometryConfig {
    /// Integration period (ms)
    pub period_ms: u64,
    /// Per-tick displacement above which a warning is logged (cm)
    pub jump_warn_cm: f64,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            period_ms: 20,
            jump_warn_cm: 5.0,
        }
    }
}

impl OdometryConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Per-channel polling and event rule settings
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Polling period (ms)
    pub period_ms: u64,
    /// Event threshold in raw sensor units
    pub threshold: f64,
    /// Crossing directions raising an event
    pub trigger: Trigger,
    /// Minimum spacing between two events (ms)
    pub debounce_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::reflectance()
    }
}

impl ChannelConfig {
    fn reflectance() -> Self {
        Self {
            period_ms: 5,
            threshold: 45.0,
            trigger: Trigger::Falling,
            debounce_ms: 200,
        }
    }

    fn proximity() -> Self {
        Self {
            period_ms: 20,
            threshold: 40.0,
            trigger: Trigger::Both,
            debounce_ms: 200,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Event rule installed on the channel at startup.
    pub fn rule(&self) -> EventRule {
        EventRule::new(self.threshold, self.trigger, self.debounce())
    }
}

/// Sensor channels
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub reflectance: ChannelConfig,
    pub proximity: ChannelConfig,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            reflectance: ChannelConfig::reflectance(),
            proximity: ChannelConfig::proximity(),
        }
    }
}

/// Motion controller settings
///
/// Speeds are wheel rotation rates in degrees per second.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Wheel speed while rotating in place
    pub rotate_speed: f64,
    /// Wheel speed while driving straight
    pub forward_speed: f64,
    /// Speed multiplier inside the slow zone
    pub slow_factor: f64,
    /// Remaining rotation below which the slow speed is used (degrees)
    pub slow_zone_deg: f64,
    /// Remaining distance below which the slow speed is used (cm)
    pub slow_zone_cm: f64,
    /// Rotation completion tolerance (degrees)
    pub heading_tolerance: f64,
    /// Distance completion tolerance (cm)
    pub distance_tolerance: f64,
    /// Control loop period (ms)
    pub control_period_ms: u64,
    /// Upper bound on a single command (ms)
    pub command_timeout_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            rotate_speed: 150.0,
            forward_speed: 250.0,
            slow_factor: 0.25,
            slow_zone_deg: 10.0,
            slow_zone_cm: 5.0,
            heading_tolerance: 0.1,
            distance_tolerance: 0.5,
            control_period_ms: 5,
            command_timeout_ms: 30_000,
        }
    }
}

impl MotionConfig {
    pub fn control_period(&self) -> Duration {
        Duration::from_millis(self.control_period_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Fine heading alignment run after the coarse line fix
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct FineAlignmentConfig {
    pub enabled: bool,
    /// Heading to start sweeping from (degrees)
    pub reference_heading: f64,
    /// True heading of the line being swept over (degrees)
    pub line_heading: f64,
    /// Rotation per step (degrees, counter-clockwise)
    pub step: f64,
    /// Reading at or below which the sensor is on the line
    pub enter_threshold: f64,
    /// Reading above which the sensor has left the line
    pub exit_threshold: f64,
    /// Step budget for the whole sweep
    pub max_steps: u32,
}

impl Default for FineAlignmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            reference_heading: 85.0,
            line_heading: 90.0,
            step: 0.5,
            enter_threshold: 47.0,
            exit_threshold: 46.0,
            max_steps: 120,
        }
    }
}

/// Reflectance-line localizer settings
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct LineLocalizerConfig {
    /// Rotations attempted before giving up
    pub max_attempts: u32,
    /// Minimum spacing between two accepted crossings (ms)
    pub debounce_ms: u64,
    /// Distance from the rotation centre to the reflectance sensor (cm)
    pub sensor_offset: f64,
    /// Constant added to the corrected heading (degrees)
    pub heading_bias: f64,
    /// Pause before returning (ms)
    pub settle_ms: u64,
    /// Grid intersection to localize against
    pub grid: GridPoint,
    pub fine_alignment: FineAlignmentConfig,
}

impl Default for LineLocalizerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            debounce_ms: 200,
            sensor_offset: 12.0,
            heading_bias: 0.0,
            settle_ms: 100,
            grid: GridPoint::default(),
            fine_alignment: FineAlignmentConfig::default(),
        }
    }
}

impl LineLocalizerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Proximity localizer settings
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ProximityLocalizerConfig {
    /// Rotations attempted before giving up
    pub max_attempts: u32,
    /// Minimum spacing between two accepted crossings (ms)
    pub debounce_ms: u64,
    /// Distance from the rotation centre to the sensor face (cm)
    pub sensor_offset: f64,
    /// Readings at or above this are "no echo" (cm)
    pub max_range: f64,
    /// Constant added to the corrected heading (degrees)
    pub heading_bias: f64,
    /// Pause before each distance reading and before returning (ms)
    pub settle_ms: u64,
    /// Point where the two walls meet
    pub corner: GridPoint,
}

impl Default for ProximityLocalizerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            debounce_ms: 200,
            sensor_offset: 4.0,
            max_range: 255.0,
            heading_bias: 0.0,
            settle_ms: 100,
            corner: GridPoint::new(-30.48, -30.48),
        }
    }
}

impl ProximityLocalizerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Localization procedure selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalizerKind {
    /// Rotate over a grid intersection with the reflectance sensor
    Line,
    /// Rotate inside a wall corner with the proximity sensor
    Proximity,
}

impl FromStr for LocalizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" => Ok(LocalizerKind::Line),
            "proximity" => Ok(LocalizerKind::Proximity),
            other => Err(Error::InvalidCommand(format!(
                "unknown localizer '{}' (expected 'line' or 'proximity')",
                other
            ))),
        }
    }
}

impl fmt::Display for LocalizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalizerKind::Line => write!(f, "line"),
            LocalizerKind::Proximity => write!(f, "proximity"),
        }
    }
}

/// Mission run by the daemon
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Localizer to run first ("line" or "proximity")
    pub localizer: String,
    /// Pose estimate before localization
    pub initial_x: f64,
    pub initial_y: f64,
    pub initial_heading: f64,
    /// Heading to face at the target (degrees)
    pub final_heading: f64,
    /// Stop the mission when localization does not converge
    pub abort_on_failure: bool,
    /// Point to drive to after localizing
    pub target: GridPoint,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            localizer: "line".to_string(),
            initial_x: 0.0,
            initial_y: 0.0,
            initial_heading: 45.0,
            final_heading: 90.0,
            abort_on_failure: false,
            target: GridPoint::default(),
        }
    }
}

impl MissionConfig {
    /// Parsed localizer selector.
    pub fn localizer_kind(&self) -> Result<LocalizerKind> {
        self.localizer.parse()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise return validated defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Check values that would make the runtime misbehave
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::Config(format!("{} must be positive, got {}", name, value)))
            }
        }
        fn nonzero(name: &str, value: u64) -> Result<()> {
            if value > 0 {
                Ok(())
            } else {
                Err(Error::Config(format!("{} must be non-zero", name)))
            }
        }

        positive("robot.wheel_radius", self.robot.wheel_radius)?;
        positive("robot.track_width", self.robot.track_width)?;
        nonzero("odometry.period_ms", self.odometry.period_ms)?;
        nonzero("sensors.reflectance.period_ms", self.sensors.reflectance.period_ms)?;
        nonzero("sensors.proximity.period_ms", self.sensors.proximity.period_ms)?;

        positive("motion.rotate_speed", self.motion.rotate_speed)?;
        positive("motion.forward_speed", self.motion.forward_speed)?;
        positive("motion.slow_factor", self.motion.slow_factor)?;
        positive("motion.heading_tolerance", self.motion.heading_tolerance)?;
        positive("motion.distance_tolerance", self.motion.distance_tolerance)?;
        nonzero("motion.control_period_ms", self.motion.control_period_ms)?;
        nonzero("motion.command_timeout_ms", self.motion.command_timeout_ms)?;

        nonzero("localization.max_attempts", self.localization.max_attempts.into())?;
        positive("localization.sensor_offset", self.localization.sensor_offset)?;
        let fine = &self.localization.fine_alignment;
        positive("localization.fine_alignment.step", fine.step)?;
        nonzero("localization.fine_alignment.max_steps", fine.max_steps.into())?;
        if fine.enabled && fine.step <= self.motion.heading_tolerance {
            return Err(Error::Config(format!(
                "localization.fine_alignment.step {} must exceed motion.heading_tolerance {}",
                fine.step, self.motion.heading_tolerance
            )));
        }

        nonzero("proximity.max_attempts", self.proximity.max_attempts.into())?;
        positive("proximity.max_range", self.proximity.max_range)?;

        self.simulation.validate()?;
        self.mission.localizer_kind()?;
        Ok(())
    }
}
