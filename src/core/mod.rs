//! Foundation types shared by every layer.
//!
//! - [`math`]: Angle normalization in degrees
//! - [`types`]: Pose, grid points and raw sensor samples
//! - [`periodic`]: Fixed-period worker threads

pub mod math;
pub mod periodic;
pub mod types;

pub use math::{Closed, to_range, wrap_delta, wrap_heading};
pub use types::{GridPoint, Pose, RawSensorSample, SensorChannel};
