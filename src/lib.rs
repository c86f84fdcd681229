//! Disha - localization and odometry for a small differential-drive robot
//!
//! Dead-reckoning from wheel encoders keeps a shared pose estimate current;
//! a one-shot localizer corrects it by turning in place over a grid
//! intersection (reflectance sensor) or inside a wall corner (proximity
//! sensor).
//!
//! Units: centimetres and degrees, counter-clockwise positive, headings in
//! `[0, 360)`.

pub mod config;
pub mod core;
pub mod devices;
pub mod drivers;
pub mod error;
pub mod localization;
pub mod motion;
pub mod odometry;
pub mod sensors;
pub mod state;
pub mod threads;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
