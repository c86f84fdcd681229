//! Shared pose state for the multi-threaded runtime.
//!
//! - [`shared::PoseState`]: pose estimate, sample cache and observer registry
//! - [`rule::EventRule`]: threshold rule turning samples into events
//! - [`observer::SensorObserver`]: capability implemented by localizers

pub mod observer;
pub mod rule;
pub mod shared;

pub use observer::{ObserverGuard, ObserverId, SensorEvent, SensorObserver};
pub use rule::{Crossing, EventRule, Trigger};
pub use shared::PoseState;
