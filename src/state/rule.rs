//! Threshold event rules evaluated on every recorded sample.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Direction in which a sample crossed a rule's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// Value dropped from at/above the threshold to below it.
    Falling,
    /// Value rose from below the threshold to at/above it.
    Rising,
}

/// Which crossings raise an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Only falling crossings (e.g. a light sensor passing over a dark line).
    #[default]
    Falling,
    /// Only rising crossings.
    Rising,
    /// Both directions (e.g. entering and leaving a wall's shadow).
    Both,
}

impl Trigger {
    #[inline]
    fn accepts(self, crossing: Crossing) -> bool {
        matches!(
            (self, crossing),
            (Trigger::Both, _)
                | (Trigger::Falling, Crossing::Falling)
                | (Trigger::Rising, Crossing::Rising)
        )
    }
}

/// Event rule for one sensor channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRule {
    /// Threshold separating the two value regions
    pub threshold: f64,
    /// Crossing directions that raise an event
    pub trigger: Trigger,
    /// Minimum spacing between two events on the channel
    pub debounce: Duration,
}

impl EventRule {
    /// Create a new rule.
    pub fn new(threshold: f64, trigger: Trigger, debounce: Duration) -> Self {
        Self {
            threshold,
            trigger,
            debounce,
        }
    }

    /// Classify the transition from `previous` to `current`.
    ///
    /// Returns `None` when the threshold was not crossed or the crossing
    /// direction is not one this rule triggers on.
    pub fn crossing(&self, previous: f64, current: f64) -> Option<Crossing> {
        let crossing = if previous >= self.threshold && current < self.threshold {
            Crossing::Falling
        } else if previous < self.threshold && current >= self.threshold {
            Crossing::Rising
        } else {
            return None;
        };

        self.trigger.accepts(crossing).then_some(crossing)
    }

    /// Whether an event at `now` falls inside the debounce window that
    /// started at `last_event`.
    #[inline]
    pub fn is_debounced(&self, last_event: Option<Instant>, now: Instant) -> bool {
        last_event.is_some_and(|last| now.saturating_duration_since(last) < self.debounce)
    }
}
