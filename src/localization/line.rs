//! Grid-line localization with the reflectance sensor
//!
//! The reflectance sensor sits `sensor_offset` behind the rotation centre.
//! Rotating a full turn near a grid intersection sweeps it over the line
//! parallel to the x axis twice and the line parallel to the y axis twice.
//! Starting roughly at 45° and turning clockwise, the crossings come in the
//! order x, y, x, y; the heading difference within each pair fixes the
//! distance to the other line, and comparing all four headings with their
//! expected values gives the heading error.
//!
//! ```text
//!              y line (x = gx)
//!                  |
//!   x line  -------+-------  (y = gy)
//!                  |
//!             o    |        robot south-west of the intersection
//! ```

use super::collector::CrossingCollector;
use super::{LocalizationOutcome, LocalizationReport, Localizer, LocalizerState, Scan, scan};
use crate::config::{FineAlignmentConfig, LineLocalizerConfig};
use crate::core::math::{wrap_delta, wrap_heading};
use crate::core::types::{GridPoint, Pose, SensorChannel};
use crate::error::Result;
use crate::motion::Navigator;
use crate::state::PoseState;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

/// Crossings in one usable rotation
pub const LINE_COUNT: usize = 4;

/// Largest mean heading error accepted for a sign hypothesis (degrees)
const ACCEPT_WINDOW: f64 = 45.0;

/// Which pairing of the four crossing headings was used
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Disambiguation {
    /// A sign hypothesis whose mean heading error was within 45°
    Accepted {
        /// Hypothesis index, 0..4
        hypothesis: usize,
        x_diff: f64,
        y_diff: f64,
        /// Mean heading error of the hypothesis
        mean_error: f64,
    },
    /// No hypothesis fit; the raw differences `x1 - x2` and `y1 - y2`
    RawFallback { x_diff: f64, y_diff: f64 },
}

impl Disambiguation {
    /// Differences between the x-line and y-line crossing headings.
    pub fn diffs(&self) -> (f64, f64) {
        match *self {
            Disambiguation::Accepted { x_diff, y_diff, .. }
            | Disambiguation::RawFallback { x_diff, y_diff } => (x_diff, y_diff),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Disambiguation::RawFallback { .. })
    }
}

/// Headings at which the four crossings should have occurred, given the
/// pair differences.
pub fn expected_headings(x_diff: f64, y_diff: f64) -> [f64; LINE_COUNT] {
    let (x1, x2) = if x_diff >= 0.0 {
        (270.0 + x_diff / 2.0, 270.0 - x_diff / 2.0)
    } else {
        (90.0 + x_diff / 2.0, 90.0 - x_diff / 2.0)
    };
    let (y1, y2) = if y_diff >= 0.0 {
        (180.0 + y_diff / 2.0, 180.0 - y_diff / 2.0)
    } else {
        (y_diff / 2.0, -y_diff / 2.0)
    };

    [x1, y1, x2, y2].map(wrap_heading)
}

/// Mean of the wrapped differences between expected and measured headings.
pub fn mean_heading_error(measured: &[f64; LINE_COUNT], x_diff: f64, y_diff: f64) -> f64 {
    let expected = expected_headings(x_diff, y_diff);
    let sum: f64 = expected
        .iter()
        .zip(measured)
        .map(|(actual, seen)| wrap_delta(actual - seen))
        .sum();
    sum / LINE_COUNT as f64
}

/// Pick the sign convention for the pair differences.
///
/// `headings` are the crossing headings in detection order `[x1, y1, x2, y2]`.
/// Hypothesis `j` flips the x difference for `j >= 2` and the y difference
/// for odd `j`. The first hypothesis whose mean heading error lies within
/// 45° wins; if none does, the raw differences are returned.
pub fn disambiguate(headings: &[f64; LINE_COUNT]) -> Disambiguation {
    let [x1, y1, x2, y2] = *headings;

    for j in 0..4 {
        let x_sign = if j < 2 { 1.0 } else { -1.0 };
        let y_sign = if j % 2 == 0 { 1.0 } else { -1.0 };
        let x_diff = wrap_delta(x_sign * (x1 - x2));
        let y_diff = wrap_delta(y_sign * (y1 - y2));

        let mean_error = mean_heading_error(headings, x_diff, y_diff);
        if wrap_delta(mean_error).abs() <= ACCEPT_WINDOW {
            return Disambiguation::Accepted {
                hypothesis: j,
                x_diff,
                y_diff,
                mean_error,
            };
        }
    }

    Disambiguation::RawFallback {
        x_diff: x1 - x2,
        y_diff: y1 - y2,
    }
}

/// Position and heading correction derived from one rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFix {
    pub x: f64,
    pub y: f64,
    /// To be added to the heading estimate (degrees)
    pub heading_correction: f64,
}

/// Solve for the robot position relative to `grid` and the heading error.
pub fn solve_line_fix(
    headings: &[f64; LINE_COUNT],
    disambiguation: &Disambiguation,
    grid: GridPoint,
    sensor_offset: f64,
) -> LineFix {
    let (x_diff, y_diff) = disambiguation.diffs();
    let x_diff = wrap_delta(x_diff);
    let y_diff = wrap_delta(y_diff);

    let heading_correction = mean_heading_error(headings, x_diff, y_diff);

    // Half the y-pair sweep gives the offset from the y line, and vice versa
    let dx = sensor_offset * (y_diff / 2.0).to_radians().cos();
    let dy = sensor_offset * (x_diff / 2.0).to_radians().cos();

    LineFix {
        x: if y_diff >= 0.0 { grid.x - dx } else { grid.x + dx },
        y: if x_diff >= 0.0 { grid.y - dy } else { grid.y + dy },
        heading_correction,
    }
}

/// Fine alignment sweep over one line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepPhase {
    /// Stepping until the sensor reaches the line
    Seeking,
    /// On the line, stepping until it leaves
    Crossing { t_min: f64 },
    /// Both edges seen
    Done { t_min: f64, t_max: f64 },
}

impl SweepPhase {
    /// Transition for one reflectance reading taken at `heading`.
    pub fn advance(self, value: f64, heading: f64, config: &FineAlignmentConfig) -> Self {
        match self {
            SweepPhase::Seeking if value <= config.enter_threshold => {
                SweepPhase::Crossing { t_min: heading }
            }
            SweepPhase::Crossing { t_min } if value > config.exit_threshold => SweepPhase::Done {
                t_min,
                t_max: heading,
            },
            phase => phase,
        }
    }
}

/// Heading to set after a sweep that entered the line at `t_min` and left
/// it at `t_max`, the line's true heading being `line_heading`.
pub fn aligned_heading(t_min: f64, t_max: f64, line_heading: f64) -> f64 {
    let centre = t_min + wrap_delta(t_max - t_min) / 2.0;
    wrap_heading(t_max + wrap_delta(line_heading - centre))
}

/// Reflectance-line localizer.
pub struct LineLocalizer {
    state: Arc<PoseState>,
    nav: Arc<dyn Navigator>,
    config: LineLocalizerConfig,
    phase: Mutex<LocalizerState>,
}

impl LineLocalizer {
    pub fn new(state: Arc<PoseState>, nav: Arc<dyn Navigator>, config: LineLocalizerConfig) -> Self {
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

    /// Sweep counter-clockwise over the line through the grid point to
    /// refine the heading.
    ///
    /// Returns the new heading, or `None` when the sweep could not finish
    /// and the coarse fix was kept.
    fn fine_align(&self) -> Result<Option<f64>> {
        let fine = &self.config.fine_alignment;

        if !self.nav.travel_to(self.config.grid, false)?.is_completed()
            || !self.nav.turn_to(fine.reference_heading)?.is_completed()
        {
            log::warn!("LineLocalizer: could not reach the sweep start, keeping coarse fix");
            return Ok(None);
        }

        let mut phase = SweepPhase::Seeking;
        let mut steps = 0;
        loop {
            let value = self
                .state
                .latest_sample(SensorChannel::Reflectance)
                .map(|sample| sample.value);

            if let Some(value) = value {
                let next = phase.advance(value, self.state.heading(), fine);
                if let SweepPhase::Done { t_min, t_max } = next {
                    let heading = aligned_heading(t_min, t_max, fine.line_heading);
                    log::debug!(
                        "LineLocalizer: line edges at {:.2}° and {:.2}° after {} steps",
                        t_min,
                        t_max,
                        steps
                    );
                    return Ok(Some(heading));
                }
                if next != phase {
                    phase = next;
                    continue;
                }
            }

            if steps >= fine.max_steps {
                log::warn!(
                    "LineLocalizer: fine alignment gave up after {} steps in {:?}",
                    steps,
                    phase
                );
                return Ok(None);
            }
            if !self.nav.turn(fine.step)?.is_completed() {
                log::warn!("LineLocalizer: fine alignment step did not complete");
                return Ok(None);
            }
            steps += 1;
        }
    }
}

impl Localizer for LineLocalizer {
    fn localize(&self) -> Result<LocalizationOutcome> {
        self.set_phase(LocalizerState::Scanning);
        log::info!(
            "LineLocalizer: scanning around ({:.2}, {:.2}) from {}",
            self.config.grid.x,
            self.config.grid.y,
            self.state.pose()
        );

        let collector = Arc::new(CrossingCollector::new(
            SensorChannel::Reflectance,
            LINE_COUNT,
            self.config.debounce(),
        ));
        let scanned = scan(
            &self.state,
            self.nav.as_ref(),
            &collector,
            self.config.max_attempts,
            |_| true,
        )?;

        let (events, attempts) = match scanned {
            Scan::Complete { events, attempts } => (events, attempts),
            Scan::Incomplete { attempts, events } => {
                self.set_phase(LocalizerState::Failed);
                log::warn!(
                    "LineLocalizer: no rotation produced {} crossings, pose unchanged",
                    LINE_COUNT
                );
                return Ok(LocalizationOutcome::NotConverged { attempts, events });
            }
        };

        let mut headings = [0.0; LINE_COUNT];
        for (heading, event) in headings.iter_mut().zip(&events) {
            *heading = event.sample.pose.heading;
        }
        let disambiguation = disambiguate(&headings);
        if disambiguation.is_fallback() {
            log::warn!(
                "LineLocalizer: no crossing pairing fits {:.1?}, using raw differences",
                headings
            );
        }

        let fix = solve_line_fix(
            &headings,
            &disambiguation,
            self.config.grid,
            self.config.sensor_offset,
        );
        let heading = self.state.heading() + fix.heading_correction + self.config.heading_bias;
        self.state.set_pose(Pose::new(fix.x, fix.y, heading));
        log::info!(
            "LineLocalizer: crossings {:.1?} -> {} ({:+.2}°)",
            headings,
            self.state.pose(),
            fix.heading_correction
        );

        if self.config.fine_alignment.enabled
            && let Some(aligned) = self.fine_align()?
        {
            log::info!(
                "LineLocalizer: fine alignment {:.2}° -> {:.2}°",
                self.state.heading(),
                aligned
            );
            self.state.set_heading(aligned);
        }

        thread::sleep(self.config.settle());
        self.set_phase(LocalizerState::Converged);

        Ok(LocalizationOutcome::Converged(LocalizationReport {
            pose: self.state.pose(),
            correction: fix.heading_correction,
            attempts,
        }))
    }

    fn state(&self) -> LocalizerState {
        *self.phase.lock()
    }
}
