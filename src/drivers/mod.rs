//! Device driver traits

pub mod drive;
pub mod encoders;
pub mod sensor;

pub use drive::DifferentialDrive;
pub use encoders::{WheelAngles, WheelEncoders};
pub use sensor::ScalarSensor;
