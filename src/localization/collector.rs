//! Per-pass event collection

use crate::core::types::SensorChannel;
use crate::state::{SensorEvent, SensorObserver};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Collected {
    events: Vec<SensorEvent>,
    /// Accepted events beyond `expected`
    overflow: usize,
    last_accepted: Option<Instant>,
}

/// Observer that records up to `expected` events from one channel.
///
/// An event is accepted only if more than `debounce` has elapsed (by sample
/// timestamp) since the previously accepted one. An accepted event beyond
/// `expected` is counted but not kept, and marks the pass as overflowed.
#[derive(Debug)]
pub struct CrossingCollector {
    channel: SensorChannel,
    expected: usize,
    debounce: Duration,
    inner: Mutex<Collected>,
}

impl CrossingCollector {
    pub fn new(channel: SensorChannel, expected: usize, debounce: Duration) -> Self {
        Self {
            channel,
            expected,
            debounce,
            inner: Mutex::new(Collected::default()),
        }
    }

    /// Forget everything collected so far.
    pub fn reset(&self) {
        *self.inner.lock() = Collected::default();
    }

    /// Number of events accepted in the current pass, including those past
    /// `expected`.
    pub fn count(&self) -> usize {
        let inner = self.inner.lock();
        inner.events.len() + inner.overflow
    }

    /// Events of the current pass if exactly `expected` were accepted.
    pub fn complete_pass(&self) -> Option<Vec<SensorEvent>> {
        let inner = self.inner.lock();
        (inner.overflow == 0 && inner.events.len() == self.expected).then(|| inner.events.clone())
    }
}

impl SensorObserver for CrossingCollector {
    fn on_event(&self, event: &SensorEvent) {
        if event.sample.channel != self.channel {
            return;
        }

        let timestamp = event.sample.timestamp;
        let mut inner = self.inner.lock();
        let spaced = inner
            .last_accepted
            .is_none_or(|last| timestamp.saturating_duration_since(last) > self.debounce);
        if !spaced {
            return;
        }

        if inner.events.len() < self.expected {
            inner.events.push(*event);
        } else {
            inner.overflow += 1;
        }
        inner.last_accepted = Some(timestamp);
    }
}
