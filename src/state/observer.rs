//! Observer capability for sensor events.

use super::rule::Crossing;
use super::shared::PoseState;
use crate::core::types::RawSensorSample;

/// A threshold crossing detected on a sensor channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    /// The sample that crossed the threshold
    pub sample: RawSensorSample,
    /// Crossing direction
    pub crossing: Crossing,
}

/// Receiver of sensor events.
///
/// Callbacks run synchronously on the polling thread that recorded the
/// triggering sample. Implementations must return quickly and must not
/// drive motion.
pub trait SensorObserver: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &SensorEvent);
}

/// Handle returned by [`PoseState::add_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

/// Registration that is removed when the guard is dropped.
///
/// Scopes an observer to one localization pass even when the pass returns
/// early.
pub struct ObserverGuard<'a> {
    state: &'a PoseState,
    id: ObserverId,
}

impl<'a> ObserverGuard<'a> {
    pub(crate) fn new(state: &'a PoseState, id: ObserverId) -> Self {
        Self { state, id }
    }

    /// Id of the guarded registration.
    pub fn id(&self) -> ObserverId {
        self.id
    }
}

impl Drop for ObserverGuard<'_> {
    fn drop(&mut self) {
        self.state.remove_observer(self.id);
    }
}
