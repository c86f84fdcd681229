//! Simulated differential drive

use super::physics::SimWorld;
use crate::drivers::DifferentialDrive;
use crate::error::Result;
use std::sync::Arc;

/// Drive forwarding wheel speed commands to [`SimWorld`]
pub struct SimDrive {
    world: Arc<SimWorld>,
}

impl SimDrive {
    pub fn new(world: Arc<SimWorld>) -> Self {
        Self { world }
    }
}

impl DifferentialDrive for SimDrive {
    fn set_wheel_speeds(&mut self, left: f64, right: f64) -> Result<()> {
        log::trace!("SimDrive: L={:.1}°/s R={:.1}°/s", left, right);
        self.world.set_wheel_speeds(left, right);
        Ok(())
    }
}
