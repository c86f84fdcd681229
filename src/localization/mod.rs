//! One-shot absolute localization
//!
//! Both procedures rotate the robot a full turn in place while a
//! [`CrossingCollector`] records threshold events from one sensor channel,
//! then derive a pose correction from the headings at which the events
//! occurred and write it into the shared state.
//!
//! - [`line::LineLocalizer`]: reflectance sensor over a grid intersection
//! - [`proximity::ProximityLocalizer`]: distance sensor inside a wall corner

pub mod collector;
pub mod line;
pub mod proximity;

pub use collector::CrossingCollector;
pub use line::{Disambiguation, LineFix, LineLocalizer, disambiguate, solve_line_fix};
pub use proximity::ProximityLocalizer;

use crate::core::math::FULL_TURN;
use crate::core::types::Pose;
use crate::error::Result;
use crate::motion::{MotionOutcome, Navigator};
use crate::state::{PoseState, SensorEvent};
use std::fmt;
use std::sync::Arc;

/// Progress of a localizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalizerState {
    /// Not started
    #[default]
    Idle,
    /// Rotating and collecting events
    Scanning,
    /// Correction written to the shared state
    Converged,
    /// No fix; the position was not corrected. A heading fix already
    /// applied before the failure (proximity wall readings) is kept.
    Failed,
}

/// Result of a converged pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalizationReport {
    /// Pose written to the shared state
    pub pose: Pose,
    /// Heading correction applied, bias excluded (degrees)
    pub correction: f64,
    /// Rotations needed
    pub attempts: u32,
}

/// How a localization pass ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalizationOutcome {
    Converged(LocalizationReport),
    /// No fix within the retry ceiling; the position was not corrected
    NotConverged {
        attempts: u32,
        /// Events accepted in the last rotation, extras included
        events: usize,
    },
}

impl LocalizationOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, LocalizationOutcome::Converged(_))
    }
}

impl fmt::Display for LocalizationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalizationOutcome::Converged(report) => write!(
                f,
                "converged at {} after {} rotation(s), correction {:+.2}°",
                report.pose, report.attempts, report.correction
            ),
            LocalizationOutcome::NotConverged { attempts, events } => write!(
                f,
                "not converged after {} rotation(s), {} event(s) in the last",
                attempts, events
            ),
        }
    }
}

/// A localization procedure.
pub trait Localizer: Send + Sync {
    /// Run one pass, blocking until it converges or gives up.
    fn localize(&self) -> Result<LocalizationOutcome>;

    /// Current progress.
    fn state(&self) -> LocalizerState;
}

/// Result of the rotate-and-collect phase
pub(crate) enum Scan {
    Complete {
        events: Vec<SensorEvent>,
        attempts: u32,
    },
    Incomplete {
        attempts: u32,
        events: usize,
    },
}

/// Rotate clockwise a full turn until one rotation yields a pass that
/// `accept`s, at most `max_attempts` times.
///
/// The collector is registered for the duration of the call only.
pub(crate) fn scan(
    state: &PoseState,
    nav: &dyn Navigator,
    collector: &Arc<CrossingCollector>,
    max_attempts: u32,
    accept: impl Fn(&[SensorEvent]) -> bool,
) -> Result<Scan> {
    let _guard = state.observe(collector.clone());
    let mut seen = 0;

    for attempt in 1..=max_attempts {
        collector.reset();
        match nav.turn(-FULL_TURN)? {
            MotionOutcome::Completed => {}
            MotionOutcome::TimedOut => {
                log::warn!("Localizer: rotation {} timed out", attempt);
            }
            MotionOutcome::Interrupted => {
                log::warn!("Localizer: rotation {} interrupted, giving up", attempt);
                return Ok(Scan::Incomplete {
                    attempts: attempt,
                    events: collector.count(),
                });
            }
        }

        if let Some(events) = collector.complete_pass().filter(|events| accept(events)) {
            return Ok(Scan::Complete {
                events,
                attempts: attempt,
            });
        }

        seen = collector.count();
        log::info!(
            "Localizer: rotation {}/{} unusable ({} event(s))",
            attempt,
            max_attempts,
            seen
        );
    }

    Ok(Scan::Incomplete {
        attempts: max_attempts,
        events: seen,
    })
}
