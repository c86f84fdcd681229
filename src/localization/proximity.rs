//! Corner localization with the proximity sensor
//!
//! The robot starts inside the corner formed by a wall along `x = corner.x`
//! and a wall along `y = corner.y`. While it turns a full revolution the
//! reading drops below the wall threshold once (the sensor starts seeing the
//! nearby walls) and rises above it once (it stops). The middle of that arc
//! points into the corner, which lies at 225°. Facing each wall in turn then
//! gives the distances to both walls.

use super::collector::CrossingCollector;
use super::{LocalizationOutcome, LocalizationReport, Localizer, LocalizerState, Scan, scan};
use crate::config::ProximityLocalizerConfig;
use crate::core::math::{wrap_delta, wrap_heading};
use crate::core::types::{Pose, SensorChannel};
use crate::error::Result;
use crate::motion::Navigator;
use crate::state::{Crossing, PoseState, SensorEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

/// Direction from the robot into the corner
pub const CORNER_HEADING: f64 = 225.0;

/// Heading facing the wall along `x = corner.x`
const WEST: f64 = 180.0;
/// Heading facing the wall along `y = corner.y`
const SOUTH: f64 = 270.0;

/// Middle of the clockwise arc from `falling` to `rising`.
pub fn corner_midpoint(falling: f64, rising: f64) -> f64 {
    wrap_heading(falling - wrap_heading(falling - rising) / 2.0)
}

/// Heading correction implied by the wall arc.
pub fn corner_correction(falling: f64, rising: f64) -> f64 {
    wrap_delta(CORNER_HEADING - corner_midpoint(falling, rising))
}

/// Headings of the single falling and single rising edge of a pass.
fn wall_edges(events: &[SensorEvent]) -> Option<(f64, f64)> {
    let mut falling = None;
    let mut rising = None;
    for event in events {
        let slot = match event.crossing {
            Crossing::Falling => &mut falling,
            Crossing::Rising => &mut rising,
        };
        if slot.replace(event.sample.pose.heading).is_some() {
            return None;
        }
    }
    falling.zip(rising)
}

/// Proximity-sensor corner localizer.
pub struct ProximityLocalizer {
    state: Arc<PoseState>,
    nav: Arc<dyn Navigator>,
    config: ProximityLocalizerConfig,
    phase: Mutex<LocalizerState>,
}

impl ProximityLocalizer {
    pub fn new(
        state: Arc<PoseState>,
        nav: Arc<dyn Navigator>,
        config: ProximityLocalizerConfig,
    ) -> Self {
        Self {
            state,
            nav,
            config,
            phase: Mutex::new(LocalizerState::Idle),
        }
    }

    fn set_phase(&self, phase: LocalizerState) {
        *self.phase.lock() = phase;
    }

    /// Face `heading` and return the settled distance reading.
    fn wall_distance(&self, heading: f64) -> Result<Option<f64>> {
        if !self.nav.turn_to(heading)?.is_completed() {
            log::warn!("ProximityLocalizer: could not face {:.0}°", heading);
            return Ok(None);
        }
        thread::sleep(self.config.settle());

        let reading = self
            .state
            .latest_sample(SensorChannel::Proximity)
            .map(|sample| sample.value)
            .filter(|distance| *distance < self.config.max_range);
        if reading.is_none() {
            log::warn!("ProximityLocalizer: no wall echo facing {:.0}°", heading);
        }
        Ok(reading)
    }

    fn fail(&self, attempts: u32, events: usize) -> LocalizationOutcome {
        self.set_phase(LocalizerState::Failed);
        LocalizationOutcome::NotConverged { attempts, events }
    }
}

impl Localizer for ProximityLocalizer {
    fn localize(&self) -> Result<LocalizationOutcome> {
        self.set_phase(LocalizerState::Scanning);
        log::info!(
            "ProximityLocalizer: scanning for corner at ({:.2}, {:.2}) from {}",
            self.config.corner.x,
            self.config.corner.y,
            self.state.pose()
        );

        let collector = Arc::new(CrossingCollector::new(
            SensorChannel::Proximity,
            2,
            self.config.debounce(),
        ));
        let scanned = scan(
            &self.state,
            self.nav.as_ref(),
            &collector,
            self.config.max_attempts,
            |events| wall_edges(events).is_some(),
        )?;

        let (events, attempts) = match scanned {
            Scan::Complete { events, attempts } => (events, attempts),
            Scan::Incomplete { attempts, events } => {
                log::warn!("ProximityLocalizer: wall edges not found, pose unchanged");
                return Ok(self.fail(attempts, events));
            }
        };
        let Some((falling, rising)) = wall_edges(&events) else {
            return Ok(self.fail(attempts, events.len()));
        };

        let correction = corner_correction(falling, rising);
        let heading = self.state.heading() + correction + self.config.heading_bias;
        self.state.set_heading(heading);
        log::info!(
            "ProximityLocalizer: wall arc {:.1}° -> {:.1}°, correction {:+.2}°",
            falling,
            rising,
            correction
        );

        let offset = self.config.sensor_offset;
        let walls = match self.wall_distance(WEST)? {
            Some(to_west) => self.wall_distance(SOUTH)?.map(|to_south| (to_west, to_south)),
            None => None,
        };
        let Some((to_west, to_south)) = walls else {
            log::warn!("ProximityLocalizer: heading corrected, position unchanged");
            return Ok(self.fail(attempts, events.len()));
        };

        self.state.set_pose(Pose::new(
            self.config.corner.x + to_west + offset,
            self.config.corner.y + to_south + offset,
            self.state.heading(),
        ));
        self.set_phase(LocalizerState::Converged);
        log::info!("ProximityLocalizer: localized at {}", self.state.pose());

        Ok(LocalizationOutcome::Converged(LocalizationReport {
            pose: self.state.pose(),
            correction,
            attempts,
        }))
    }

    fn state(&self) -> LocalizerState {
        *self.phase.lock()
    }
}
