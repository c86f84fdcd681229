//! Differential drive actuator trait

use crate::error::Result;

/// Two independently driven wheels
pub trait DifferentialDrive: Send {
    /// Set individual wheel speeds
    ///
    /// # Arguments
    /// * `left` - Left wheel rotation rate in degrees/second
    /// * `right` - Right wheel rotation rate in degrees/second
    fn set_wheel_speeds(&mut self, left: f64, right: f64) -> Result<()>;

    /// Stop both wheels
    fn stop(&mut self) -> Result<()> {
        self.set_wheel_speeds(0.0, 0.0)
    }
}
