//! Wheel encoder trait

use crate::error::Result;

/// Cumulative wheel rotation since power-on, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelAngles {
    pub left: f64,
    pub right: f64,
}

impl WheelAngles {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }
}

/// Wheel rotation sensor
pub trait WheelEncoders: Send {
    /// Read cumulative wheel angles
    fn read(&mut self) -> Result<WheelAngles>;
}
