//! Pose and sample types.
//!
//! Distances are in centimetres, headings in degrees, counter-clockwise
//! positive, with 0° along +x.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use super::math::wrap_heading;

/// A target point on the field.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GridPoint {
    /// X coordinate in centimetres
    pub x: f64,
    /// Y coordinate in centimetres
    pub y: f64,
}

impl GridPoint {
    /// Create a new grid point.
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(&self, other: &GridPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Robot pose estimate.
///
/// Heading is kept in `[0, 360)`; [`Pose::new`] normalizes it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// X position in centimetres
    pub x: f64,
    /// Y position in centimetres
    pub y: f64,
    /// Heading in degrees, normalized to [0, 360)
    pub heading: f64,
}

impl Pose {
    /// Create a new pose with the heading normalized to [0, 360).
    #[inline]
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            heading: wrap_heading(heading),
        }
    }

    /// Position part of the pose.
    #[inline]
    pub fn position(&self) -> GridPoint {
        GridPoint::new(self.x, self.y)
    }

    /// Same pose with the heading normalized.
    #[inline]
    pub fn normalized(self) -> Self {
        Self::new(self.x, self.y, self.heading)
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2}°)", self.x, self.y, self.heading)
    }
}

/// Physical sensor channels sampled by the pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorChannel {
    /// Downward-facing colour/light sensor used to detect grid lines.
    Reflectance,
    /// Forward-facing ultrasonic distance sensor.
    Proximity,
}

impl SensorChannel {
    /// Short lowercase name, used for thread names and log lines.
    pub fn name(self) -> &'static str {
        match self {
            SensorChannel::Reflectance => "reflectance",
            SensorChannel::Proximity => "proximity",
        }
    }
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raw sensor reading together with the pose at the moment it was taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSensorSample {
    /// Channel the value was read from
    pub channel: SensorChannel,
    /// Raw value (distance in cm or reflectance level)
    pub value: f64,
    /// Pose snapshot at sampling time
    pub pose: Pose,
    /// Sampling time
    pub timestamp: Instant,
}
