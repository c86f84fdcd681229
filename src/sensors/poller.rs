//! Periodic sensor polling
//!
//! One poller per channel reads its sensor every period and records the raw
//! value in the shared state. Event detection and debouncing happen there;
//! the poller only forwards values.

use crate::core::periodic::spawn_periodic;
use crate::core::types::SensorChannel;
use crate::drivers::ScalarSensor;
use crate::error::Result;
use crate::state::PoseState;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const WARN_INTERVAL: Duration = Duration::from_secs(1);

/// Periodic reader for one sensor channel
pub struct SensorPoller {
    channel: SensorChannel,
    sensor: Box<dyn ScalarSensor>,
    state: Arc<PoseState>,
    last_warn: Option<Instant>,
    failures: u64,
}

impl SensorPoller {
    pub fn new(channel: SensorChannel, sensor: Box<dyn ScalarSensor>, state: Arc<PoseState>) -> Self {
        Self {
            channel,
            sensor,
            state,
            last_warn: None,
            failures: 0,
        }
    }

    /// Start the `poll-<channel>` thread.
    pub fn spawn(
        channel: SensorChannel,
        sensor: Box<dyn ScalarSensor>,
        state: Arc<PoseState>,
        period: Duration,
        running: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>> {
        let name = match channel {
            SensorChannel::Reflectance => "poll-reflectance",
            SensorChannel::Proximity => "poll-proximity",
        };
        let mut poller = Self::new(channel, sensor, state);
        spawn_periodic(name, period, running, move || poller.tick())
    }

    /// Read once and record the value. Failed reads are skipped.
    pub fn tick(&mut self) {
        match self.sensor.read() {
            Ok(value) => {
                self.state.record_sample(self.channel, value);
            }
            Err(e) => {
                self.failures += 1;
                let now = Instant::now();
                if self
                    .last_warn
                    .is_none_or(|last| now.duration_since(last) >= WARN_INTERVAL)
                {
                    log::warn!(
                        "{} poller: read failed, skipping ({} total): {}",
                        self.channel,
                        self.failures,
                        e
                    );
                    self.last_warn = Some(now);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::state::{EventRule, SensorEvent, SensorObserver, Trigger};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<Result<f64>>);

    impl ScalarSensor for Scripted {
        fn read(&mut self) -> Result<f64> {
            self.0.pop_front().unwrap_or(Ok(60.0))
        }
    }

    #[derive(Default)]
    struct Counter(Mutex<Vec<SensorEvent>>);

    impl SensorObserver for Counter {
        fn on_event(&self, event: &SensorEvent) {
            self.0.lock().push(*event);
        }
    }

    fn failure() -> Result<f64> {
        Err(Error::Sensor {
            channel: "reflectance",
            message: "bus error".into(),
        })
    }

    #[test]
    fn test_tick_records_latest_value() {
        let state = Arc::new(PoseState::default());
        let sensor = Scripted(VecDeque::from(vec![Ok(55.0), failure(), Ok(20.0)]));
        let mut poller = SensorPoller::new(SensorChannel::Reflectance, Box::new(sensor), Arc::clone(&state));

        poller.tick();
        assert_eq!(state.latest_sample(SensorChannel::Reflectance).unwrap().value, 55.0);

        // Failed read leaves the cached sample alone
        poller.tick();
        assert_eq!(state.latest_sample(SensorChannel::Reflectance).unwrap().value, 55.0);

        poller.tick();
        assert_eq!(state.latest_sample(SensorChannel::Reflectance).unwrap().value, 20.0);
        assert!(state.latest_sample(SensorChannel::Proximity).is_none());
    }

    #[test]
    fn test_failed_read_does_not_break_crossing() {
        let state = Arc::new(PoseState::default());
        state.set_rule(
            SensorChannel::Reflectance,
            EventRule::new(45.0, Trigger::Falling, Duration::ZERO),
        );
        let counter = Arc::new(Counter::default());
        let _guard = state.observe(counter.clone());

        let sensor = Scripted(VecDeque::from(vec![Ok(60.0), failure(), Ok(30.0)]));
        let mut poller = SensorPoller::new(SensorChannel::Reflectance, Box::new(sensor), Arc::clone(&state));
        for _ in 0..3 {
            poller.tick();
        }

        assert_eq!(counter.0.lock().len(), 1);
    }

    #[test]
    fn test_spawned_poller_stops_with_flag() {
        let state = Arc::new(PoseState::default());
        let running = Arc::new(AtomicBool::new(true));
        let handle = SensorPoller::spawn(
            SensorChannel::Proximity,
            Box::new(Scripted(VecDeque::new())),
            Arc::clone(&state),
            Duration::from_millis(2),
            Arc::clone(&running),
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(30));
        running.store(false, std::sync::atomic::Ordering::Relaxed);
        handle.join().unwrap();

        assert_eq!(state.latest_sample(SensorChannel::Proximity).unwrap().value, 60.0);
    }
}
