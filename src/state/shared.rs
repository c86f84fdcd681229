//! Thread-safe pose estimate shared by every component.
//!
//! `PoseState` is shared between:
//! - Odometry thread: continuous small deltas via [`PoseState::update_delta`]
//! - Poller threads: raw samples via [`PoseState::record_sample`]
//! - Mission thread: reads for motion control, discrete corrections from
//!   the localizers via [`PoseState::set_pose`]
//!
//! Observers registered for a localization pass receive threshold events
//! synchronously from the poller thread that recorded the sample.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::observer::{ObserverGuard, ObserverId, SensorEvent, SensorObserver};
use super::rule::EventRule;
use crate::core::math::wrap_heading;
use crate::core::types::{Pose, RawSensorSample, SensorChannel};
use crate::odometry::WheelDelta;

/// Per-channel sample cache and event rule.
#[derive(Debug, Default)]
struct ChannelState {
    latest: Option<RawSensorSample>,
    rule: Option<EventRule>,
    last_event: Option<Instant>,
}

/// Shared pose estimate, sample cache and observer registry.
pub struct PoseState {
    pose: Mutex<Pose>,
    channels: Mutex<HashMap<SensorChannel, ChannelState>>,
    observers: RwLock<Vec<(ObserverId, Arc<dyn SensorObserver>)>>,
    next_observer_id: AtomicU64,
}

impl Default for PoseState {
    fn default() -> Self {
        Self::new(Pose::default())
    }
}

impl PoseState {
    /// Create a new shared state starting at `initial`.
    pub fn new(initial: Pose) -> Self {
        Self {
            pose: Mutex::new(initial.normalized()),
            channels: Mutex::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
            next_observer_id: AtomicU64::new(1),
        }
    }

    /// Consistent snapshot of the current pose.
    #[inline]
    pub fn pose(&self) -> Pose {
        *self.pose.lock()
    }

    /// Current heading in degrees, [0, 360).
    #[inline]
    pub fn heading(&self) -> f64 {
        self.pose.lock().heading
    }

    /// Replace the whole pose. The heading is normalized before storing.
    pub fn set_pose(&self, pose: Pose) {
        *self.pose.lock() = pose.normalized();
    }

    /// Replace only the heading.
    pub fn set_heading(&self, heading: f64) {
        self.pose.lock().heading = wrap_heading(heading);
    }

    /// Add a displacement and rotation to the current pose.
    pub fn update_delta(&self, dx: f64, dy: f64, dheading: f64) {
        let mut pose = self.pose.lock();
        pose.x += dx;
        pose.y += dy;
        pose.heading = wrap_heading(pose.heading + dheading);
    }

    /// Integrate one odometry increment along the midpoint of the stored
    /// heading, under a single lock.
    pub fn apply_wheel_delta(&self, delta: &WheelDelta) {
        let mut pose = self.pose.lock();
        let (dx, dy, dheading) = delta.displacement(pose.heading);
        pose.x += dx;
        pose.y += dy;
        pose.heading = wrap_heading(pose.heading + dheading);
    }

    /// Install the event rule for a channel, replacing any previous rule.
    pub fn set_rule(&self, channel: SensorChannel, rule: EventRule) {
        let mut channels = self.channels.lock();
        let state = channels.entry(channel).or_default();
        state.rule = Some(rule);
        state.last_event = None;
    }

    /// Latest recorded sample for a channel.
    pub fn latest_sample(&self, channel: SensorChannel) -> Option<RawSensorSample> {
        self.channels
            .lock()
            .get(&channel)
            .and_then(|state| state.latest)
    }

    /// Record a reading taken now.
    pub fn record_sample(&self, channel: SensorChannel, value: f64) -> Option<SensorEvent> {
        self.record_sample_at(channel, value, Instant::now())
    }

    /// Record a reading taken at `timestamp`.
    ///
    /// Stores the sample with a snapshot of the current pose, evaluates the
    /// channel's rule against the previous sample and, if it triggers outside
    /// the debounce window, notifies every registered observer before
    /// returning. Observers are called with no internal lock held.
    pub fn record_sample_at(
        &self,
        channel: SensorChannel,
        value: f64,
        timestamp: Instant,
    ) -> Option<SensorEvent> {
        let sample = RawSensorSample {
            channel,
            value,
            pose: self.pose(),
            timestamp,
        };

        let event = {
            let mut channels = self.channels.lock();
            let state = channels.entry(channel).or_default();
            let previous = state.latest.replace(sample);

            match (state.rule, previous) {
                (Some(rule), Some(previous)) => rule
                    .crossing(previous.value, value)
                    .filter(|_| !rule.is_debounced(state.last_event, timestamp))
                    .map(|crossing| {
                        state.last_event = Some(timestamp);
                        SensorEvent { sample, crossing }
                    }),
                _ => None,
            }
        };

        if let Some(ref event) = event {
            log::trace!(
                "{} {:?} crossing: value={:.1} at {}",
                channel,
                event.crossing,
                value,
                sample.pose
            );
            self.notify(event);
        }

        event
    }

    fn notify(&self, event: &SensorEvent) {
        // Clone the handles so observers may (de)register from the callback
        let observers: Vec<Arc<dyn SensorObserver>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in observers {
            observer.on_event(event);
        }
    }

    /// Register an observer for sensor events.
    pub fn add_observer(&self, observer: Arc<dyn SensorObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        log::debug!("PoseState: observer {:?} registered", id);
        id
    }

    /// Deregister an observer. Returns false if it was not registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        let removed = observers.len() != before;
        if removed {
            log::debug!("PoseState: observer {:?} removed", id);
        }
        removed
    }

    /// Register an observer for the lifetime of the returned guard.
    pub fn observe(&self, observer: Arc<dyn SensorObserver>) -> ObserverGuard<'_> {
        let id = self.add_observer(observer);
        ObserverGuard::new(self, id)
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::rule::{Crossing, Trigger};
    use approx::assert_relative_eq;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<SensorEvent>>,
    }

    impl SensorObserver for Recorder {
        fn on_event(&self, event: &SensorEvent) {
            self.events.lock().push(*event);
        }
    }

    fn line_rule() -> EventRule {
        EventRule::new(40.0, Trigger::Falling, Duration::from_millis(200))
    }

    #[test]
    fn test_set_pose_round_trip() {
        let state = PoseState::default();
        let pose = Pose {
            x: 12.5,
            y: -3.25,
            heading: 45.0,
        };
        state.set_pose(pose);
        assert_eq!(state.pose(), pose);

        // Only the heading is altered by normalization
        state.set_pose(Pose {
            x: 1.0,
            y: 2.0,
            heading: -30.0,
        });
        let stored = state.pose();
        assert_eq!(stored.x, 1.0);
        assert_eq!(stored.y, 2.0);
        assert_eq!(stored.heading, 330.0);
    }

    #[test]
    fn test_set_heading_normalizes() {
        let state = PoseState::new(Pose::new(5.0, 6.0, 10.0));
        state.set_heading(370.0);
        assert_relative_eq!(state.heading(), 10.0);
        assert_eq!(state.pose().x, 5.0);
    }

    #[test]
    fn test_update_delta_is_additive() {
        let sequential = PoseState::new(Pose::new(1.0, 1.0, 350.0));
        sequential.update_delta(0.3, -0.2, 7.5);
        sequential.update_delta(0.4, 0.1, 6.0);

        let summed = PoseState::new(Pose::new(1.0, 1.0, 350.0));
        summed.update_delta(0.7, -0.1, 13.5);

        let a = sequential.pose();
        let b = summed.pose();
        assert_relative_eq!(a.x, b.x, epsilon = 1e-12);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-12);
        assert_relative_eq!(a.heading, b.heading, epsilon = 1e-9);
        assert_relative_eq!(a.heading, 3.5, epsilon = 1e-9);
    }

    #[test]
    fn test_apply_wheel_delta_uses_stored_heading() {
        let state = PoseState::new(Pose::new(0.0, 0.0, 90.0));
        state.set_heading(180.0);
        state.apply_wheel_delta(&WheelDelta {
            distance: 10.0,
            rotation: 0.0,
        });
        let pose = state.pose();
        assert_relative_eq!(pose.x, -10.0, epsilon = 1e-9);
        assert_relative_eq!(pose.y, 0.0, epsilon = 1e-9);

        // Midpoint of a quarter turn from 350° is 35°
        state.set_pose(Pose::new(0.0, 0.0, 350.0));
        state.apply_wheel_delta(&WheelDelta {
            distance: 2.0,
            rotation: 90.0,
        });
        let pose = state.pose();
        assert_relative_eq!(pose.x, 2.0 * 35f64.to_radians().cos(), epsilon = 1e-9);
        assert_relative_eq!(pose.y, 2.0 * 35f64.to_radians().sin(), epsilon = 1e-9);
        assert_relative_eq!(pose.heading, 80.0, epsilon = 1e-9);
    }

    #[test]
    fn test_record_sample_caches_latest_with_pose() {
        let state = PoseState::new(Pose::new(2.0, 3.0, 90.0));
        assert!(state.latest_sample(SensorChannel::Proximity).is_none());

        state.record_sample(SensorChannel::Proximity, 80.0);
        state.record_sample(SensorChannel::Proximity, 75.0);

        let latest = state.latest_sample(SensorChannel::Proximity).unwrap();
        assert_eq!(latest.value, 75.0);
        assert_eq!(latest.pose, Pose::new(2.0, 3.0, 90.0));
        assert_eq!(latest.channel, SensorChannel::Proximity);
    }

    #[test]
    fn test_crossing_notifies_observers() {
        let state = PoseState::default();
        state.set_rule(SensorChannel::Reflectance, line_rule());
        let recorder = Arc::new(Recorder::default());
        let _guard = state.observe(recorder.clone());

        let t0 = Instant::now();
        assert!(
            state
                .record_sample_at(SensorChannel::Reflectance, 55.0, t0)
                .is_none()
        );
        let event = state
            .record_sample_at(SensorChannel::Reflectance, 30.0, t0 + Duration::from_millis(5))
            .unwrap();
        assert_eq!(event.crossing, Crossing::Falling);
        assert_eq!(event.sample.value, 30.0);

        // Staying below the threshold is not a new crossing
        state.record_sample_at(SensorChannel::Reflectance, 28.0, t0 + Duration::from_millis(10));

        assert_eq!(recorder.events.lock().len(), 1);
    }

    #[test]
    fn test_channel_without_rule_never_notifies() {
        let state = PoseState::default();
        let recorder = Arc::new(Recorder::default());
        let _guard = state.observe(recorder.clone());

        state.record_sample(SensorChannel::Proximity, 100.0);
        state.record_sample(SensorChannel::Proximity, 5.0);

        assert!(recorder.events.lock().is_empty());
    }

    #[test]
    fn test_debounce_drops_close_crossings() {
        let state = PoseState::default();
        state.set_rule(SensorChannel::Reflectance, line_rule());
        let recorder = Arc::new(Recorder::default());
        let _guard = state.observe(recorder.clone());

        let t0 = Instant::now();
        let ms = Duration::from_millis;
        // Two crossings 80ms apart (inside the 200ms window)
        state.record_sample_at(SensorChannel::Reflectance, 55.0, t0);
        state.record_sample_at(SensorChannel::Reflectance, 30.0, t0 + ms(10));
        state.record_sample_at(SensorChannel::Reflectance, 55.0, t0 + ms(50));
        state.record_sample_at(SensorChannel::Reflectance, 30.0, t0 + ms(90));
        assert_eq!(recorder.events.lock().len(), 1);

        // A crossing after the window is delivered
        state.record_sample_at(SensorChannel::Reflectance, 55.0, t0 + ms(300));
        state.record_sample_at(SensorChannel::Reflectance, 30.0, t0 + ms(320));
        assert_eq!(recorder.events.lock().len(), 2);
    }

    #[test]
    fn test_observer_guard_deregisters() {
        let state = PoseState::default();
        state.set_rule(SensorChannel::Reflectance, line_rule());
        let recorder = Arc::new(Recorder::default());

        {
            let guard = state.observe(recorder.clone());
            assert_eq!(state.observer_count(), 1);
            assert!(state.remove_observer(guard.id()));
            assert_eq!(state.observer_count(), 0);
            // Dropping after a manual removal is harmless
        }

        let id = state.add_observer(recorder.clone());
        assert!(state.remove_observer(id));
        assert!(!state.remove_observer(id));

        state.record_sample(SensorChannel::Reflectance, 55.0);
        state.record_sample(SensorChannel::Reflectance, 30.0);
        assert!(recorder.events.lock().is_empty());
    }

    #[test]
    fn test_concurrent_reads_never_torn() {
        let state = Arc::new(PoseState::default());
        let writer_state = Arc::clone(&state);

        // Writer keeps x == y == heading
        let writer = thread::spawn(move || {
            for i in 0..2000 {
                let v = (i % 300) as f64;
                writer_state.set_pose(Pose::new(v, v, v));
            }
        });

        for _ in 0..2000 {
            let pose = state.pose();
            assert_eq!(pose.x, pose.y);
            assert_eq!(pose.x, pose.heading);
        }

        writer.join().unwrap();
    }
}
