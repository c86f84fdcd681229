//! Simulated device configuration
//!
//! Every parameter has a default describing a small robot on a field of
//! 30.48 cm tiles, so an empty `[simulation]` section is a usable setup.
//!
//! ```text
//! SimulationConfig
//! ├── start_x/y/heading, random_seed, failure_rate
//! ├── ArenaConfig          # walls (axis-aligned rectangle)
//! ├── GridConfig           # line_spacing, line_width
//! ├── ReflectanceSimConfig # mount offset, light/dark levels, noise
//! ├── ProximitySimConfig   # mount offset, max_range, noise
//! └── EncoderSimConfig     # wheel slip
//! ```
//!
//! | Parameter | Default |
//! |-----------|---------|
//! | start | (-3, -4, 50°) |
//! | arena | -30.48 .. 274.32 cm on both axes |
//! | line_spacing | 30.48 cm |
//! | line_width | 0.5 cm |
//! | reflectance light/dark | 60 / 30 |
//! | proximity max_range | 255 cm |

use crate::core::types::Pose;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Walls bounding the field
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ArenaConfig {
    #[serde(default = "default_arena_min")]
    pub min_x: f64,
    #[serde(default = "default_arena_min")]
    pub min_y: f64,
    #[serde(default = "default_arena_max")]
    pub max_x: f64,
    #[serde(default = "default_arena_max")]
    pub max_y: f64,
}

fn default_arena_min() -> f64 {
    -30.48
}
fn default_arena_max() -> f64 {
    274.32
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            min_x: default_arena_min(),
            min_y: default_arena_min(),
            max_x: default_arena_max(),
            max_y: default_arena_max(),
        }
    }
}

impl ArenaConfig {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x > self.min_x && x < self.max_x && y > self.min_y && y < self.max_y
    }
}

/// Dark reference lines at every multiple of `line_spacing` on both axes
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct GridConfig {
    #[serde(default = "default_line_spacing")]
    pub line_spacing: f64,
    #[serde(default = "default_line_width")]
    pub line_width: f64,
}

fn default_line_spacing() -> f64 {
    30.48
}
fn default_line_width() -> f64 {
    0.5
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            line_spacing: default_line_spacing(),
            line_width: default_line_width(),
        }
    }
}

/// Downward light sensor mounted behind the rotation centre
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ReflectanceSimConfig {
    /// Distance behind the rotation centre (cm)
    #[serde(default = "default_reflectance_offset")]
    pub sensor_offset: f64,
    /// Reading over bare floor
    #[serde(default = "default_light_value")]
    pub light_value: f64,
    /// Reading over a line
    #[serde(default = "default_dark_value")]
    pub dark_value: f64,
    #[serde(default = "default_reflectance_stddev")]
    pub noise_stddev: f64,
}

fn default_reflectance_offset() -> f64 {
    12.0
}
fn default_light_value() -> f64 {
    60.0
}
fn default_dark_value() -> f64 {
    30.0
}
fn default_reflectance_stddev() -> f64 {
    1.0
}

impl Default for ReflectanceSimConfig {
    fn default() -> Self {
        Self {
            sensor_offset: default_reflectance_offset(),
            light_value: default_light_value(),
            dark_value: default_dark_value(),
            noise_stddev: default_reflectance_stddev(),
        }
    }
}

/// Forward-facing ultrasonic sensor
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ProximitySimConfig {
    /// Distance ahead of the rotation centre (cm)
    #[serde(default = "default_proximity_offset")]
    pub mount_offset: f64,
    /// Reading reported when no wall is in range (cm)
    #[serde(default = "default_max_range")]
    pub max_range: f64,
    #[serde(default = "default_proximity_stddev")]
    pub noise_stddev: f64,
}

fn default_proximity_offset() -> f64 {
    4.0
}
fn default_max_range() -> f64 {
    255.0
}
fn default_proximity_stddev() -> f64 {
    0.3
}

impl Default for ProximitySimConfig {
    fn default() -> Self {
        Self {
            mount_offset: default_proximity_offset(),
            max_range: default_max_range(),
            noise_stddev: default_proximity_stddev(),
        }
    }
}

/// Wheel slip between encoder and ground
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct EncoderSimConfig {
    /// Multiplicative slip noise per integration step (0.0-1.0)
    #[serde(default)]
    pub slip_stddev: f64,
}

/// Top-level simulation configuration
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// True starting pose
    #[serde(default = "default_start_x")]
    pub start_x: f64,
    #[serde(default = "default_start_y")]
    pub start_y: f64,
    #[serde(default = "default_start_heading")]
    pub start_heading: f64,

    /// Noise seed (0 = random each run)
    #[serde(default)]
    pub random_seed: u64,

    /// Probability that a sensor or encoder read fails (0.0-1.0)
    #[serde(default)]
    pub failure_rate: f64,

    /// Wheel speed limit (degrees/second)
    #[serde(default = "default_max_wheel_speed")]
    pub max_wheel_speed: f64,

    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub reflectance: ReflectanceSimConfig,
    #[serde(default)]
    pub proximity: ProximitySimConfig,
    #[serde(default)]
    pub encoders: EncoderSimConfig,
}

fn default_start_x() -> f64 {
    -3.0
}
fn default_start_y() -> f64 {
    -4.0
}
fn default_start_heading() -> f64 {
    50.0
}
fn default_max_wheel_speed() -> f64 {
    900.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_x: default_start_x(),
            start_y: default_start_y(),
            start_heading: default_start_heading(),
            random_seed: 0,
            failure_rate: 0.0,
            max_wheel_speed: default_max_wheel_speed(),
            arena: ArenaConfig::default(),
            grid: GridConfig::default(),
            reflectance: ReflectanceSimConfig::default(),
            proximity: ProximitySimConfig::default(),
            encoders: EncoderSimConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// True starting pose.
    pub fn start_pose(&self) -> Pose {
        Pose::new(self.start_x, self.start_y, self.start_heading)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::Config(format!("simulation: {}", msg)));

        if !self.arena.contains(self.start_x, self.start_y) {
            return invalid(format!(
                "start ({}, {}) is outside the arena",
                self.start_x, self.start_y
            ));
        }
        if !(self.grid.line_width > 0.0 && self.grid.line_width < self.grid.line_spacing) {
            return invalid("line_width must be positive and below line_spacing".into());
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return invalid(format!("failure_rate {} outside 0..1", self.failure_rate));
        }
        let spreads = [
            ("reflectance.noise_stddev", self.reflectance.noise_stddev),
            ("proximity.noise_stddev", self.proximity.noise_stddev),
            ("encoders.slip_stddev", self.encoders.slip_stddev),
        ];
        for (name, stddev) in spreads {
            if !(stddev >= 0.0) {
                return invalid(format!("{} must not be negative", name));
            }
        }
        if self.proximity.max_range <= 0.0 || self.max_wheel_speed <= 0.0 {
            return invalid("max_range and max_wheel_speed must be positive".into());
        }
        Ok(())
    }
}
