//! Sensor polling tasks

pub mod poller;

pub use poller::SensorPoller;
