//! Single-value sensor trait

use crate::error::Result;

/// Sensor producing one scalar reading per poll
///
/// Reflectance sensors return a brightness value, proximity sensors a
/// distance in centimetres.
pub trait ScalarSensor: Send {
    /// Read the current value
    fn read(&mut self) -> Result<f64>;
}
