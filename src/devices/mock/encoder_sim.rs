//! Simulated wheel encoders

use super::noise::SensorNoise;
use super::physics::SimWorld;
use crate::drivers::{WheelAngles, WheelEncoders};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Encoders reporting the wheel angles integrated by [`SimWorld`]
pub struct SimEncoders {
    world: Arc<SimWorld>,
    noise: SensorNoise,
}

impl SimEncoders {
    pub fn new(world: Arc<SimWorld>, noise: SensorNoise) -> Self {
        Self { world, noise }
    }
}

impl WheelEncoders for SimEncoders {
    fn read(&mut self) -> Result<WheelAngles> {
        if self.noise.read_fails() {
            return Err(Error::Sensor {
                channel: "encoders",
                message: "simulated read failure".to_string(),
            });
        }
        Ok(self.world.wheel_angles())
    }
}
