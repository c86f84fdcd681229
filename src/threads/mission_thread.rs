//! Mission thread - localize once, then drive to the target.
//!
//! The result is sent back over a channel so the main thread can wait for
//! it while watching the shutdown flag.

use crate::config::MissionConfig;
use crate::core::types::Pose;
use crate::error::{Error, Result};
use crate::localization::{LocalizationOutcome, Localizer};
use crate::motion::{MotionOutcome, Navigator};
use crate::state::PoseState;
use crossbeam_channel::{Receiver, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// What a mission run did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissionReport {
    pub localization: LocalizationOutcome,
    /// `None` when the mission stopped before driving
    pub travel: Option<MotionOutcome>,
    /// `None` when the robot never reached the target
    pub facing: Option<MotionOutcome>,
    /// Pose estimate at the end
    pub pose: Pose,
}

impl MissionReport {
    /// Localized, reached the target and faced the final heading.
    pub fn is_complete(&self) -> bool {
        self.localization.is_converged()
            && self.travel.is_some_and(MotionOutcome::is_completed)
            && self.facing.is_some_and(MotionOutcome::is_completed)
    }
}

/// Run the mission on the calling thread.
///
/// A pass that does not converge leaves odometry uncorrected; the mission
/// carries on with it unless `abort_on_failure` is set. No new motion is
/// started once `running` is cleared.
pub fn run_mission(
    localizer: &dyn Localizer,
    nav: &dyn Navigator,
    state: &PoseState,
    mission: &MissionConfig,
    running: &AtomicBool,
) -> Result<MissionReport> {
    let localization = localizer.localize()?;
    let mut report = MissionReport {
        localization,
        travel: None,
        facing: None,
        pose: state.pose(),
    };

    match localization {
        LocalizationOutcome::Converged(_) => log::info!("Mission: {}", localization),
        LocalizationOutcome::NotConverged { .. } if mission.abort_on_failure => {
            log::error!("Mission: {}, aborting", localization);
            return Ok(report);
        }
        LocalizationOutcome::NotConverged { .. } => {
            log::warn!("Mission: {}, continuing on odometry", localization);
        }
    }

    if !running.load(Ordering::Relaxed) {
        return Ok(report);
    }
    log::info!(
        "Mission: driving to ({:.2}, {:.2})",
        mission.target.x,
        mission.target.y
    );
    let travel = nav.travel_to(mission.target, false)?;
    report.travel = Some(travel);

    if travel.is_completed() && running.load(Ordering::Relaxed) {
        report.facing = Some(nav.turn_to(mission.final_heading)?);
    } else {
        log::warn!("Mission: target not reached ({:?})", travel);
    }

    report.pose = state.pose();
    log::info!("Mission: finished at {}", report.pose);
    Ok(report)
}

/// Mission thread handle
pub struct MissionThread {
    handle: JoinHandle<()>,
}

impl MissionThread {
    /// Spawn the `mission` thread.
    ///
    /// The receiver yields exactly one result, or disconnects if the thread
    /// dies first.
    pub fn spawn(
        localizer: Arc<dyn Localizer>,
        nav: Arc<dyn Navigator>,
        state: Arc<PoseState>,
        mission: MissionConfig,
        running: Arc<AtomicBool>,
    ) -> Result<(Self, Receiver<Result<MissionReport>>)> {
        let (tx, rx) = bounded(1);
        let handle = thread::Builder::new()
            .name("mission".into())
            .spawn(move || {
                log::info!("Mission thread starting");
                let result = run_mission(
                    localizer.as_ref(),
                    nav.as_ref(),
                    &state,
                    &mission,
                    &running,
                );
                if tx.send(result).is_err() {
                    log::debug!("Mission: result receiver dropped");
                }
            })
            .map_err(|e| Error::Spawn("mission", e))?;

        Ok((Self { handle }, rx))
    }

    /// Wait for thread to finish.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::GridPoint;
    use crate::localization::{LocalizationReport, LocalizerState};
    use parking_lot::Mutex;

    struct FixedLocalizer(LocalizationOutcome);

    impl Localizer for FixedLocalizer {
        fn localize(&self) -> Result<LocalizationOutcome> {
            Ok(self.0)
        }

        fn state(&self) -> LocalizerState {
            LocalizerState::Idle
        }
    }

    /// Records commands and teleports the pose to each goal.
    struct Recorder {
        state: Arc<PoseState>,
        travel: MotionOutcome,
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(state: Arc<PoseState>, travel: MotionOutcome) -> Self {
            Self {
                state,
                travel,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl Navigator for Recorder {
        fn turn(&self, degrees: f64) -> Result<MotionOutcome> {
            self.calls.lock().push(format!("turn {}", degrees));
            Ok(MotionOutcome::Completed)
        }

        fn turn_to(&self, heading: f64) -> Result<MotionOutcome> {
            self.calls.lock().push(format!("turn_to {}", heading));
            self.state.set_heading(heading);
            Ok(MotionOutcome::Completed)
        }

        fn travel(&self, distance: f64) -> Result<MotionOutcome> {
            self.calls.lock().push(format!("travel {}", distance));
            Ok(MotionOutcome::Completed)
        }

        fn travel_to(&self, target: GridPoint, _avoid: bool) -> Result<MotionOutcome> {
            self.calls
                .lock()
                .push(format!("travel_to {} {}", target.x, target.y));
            if self.travel.is_completed() {
                let heading = self.state.heading();
                self.state.set_pose(Pose::new(target.x, target.y, heading));
            }
            Ok(self.travel)
        }

        fn stop(&self) -> Result<()> {
            Ok(())
        }
    }

    fn mission() -> MissionConfig {
        MissionConfig {
            target: GridPoint::new(30.48, 30.48),
            final_heading: 90.0,
            ..MissionConfig::default()
        }
    }

    fn converged() -> LocalizationOutcome {
        LocalizationOutcome::Converged(LocalizationReport {
            pose: Pose::new(-3.0, -4.0, 45.0),
            correction: 2.0,
            attempts: 1,
        })
    }

    static RUNNING: AtomicBool = AtomicBool::new(true);

    const NOT_CONVERGED: LocalizationOutcome = LocalizationOutcome::NotConverged {
        attempts: 3,
        events: 2,
    };

    #[test]
    fn test_converged_mission_drives_and_faces() {
        let state = Arc::new(PoseState::new(Pose::new(-3.0, -4.0, 45.0)));
        let nav = Recorder::new(Arc::clone(&state), MotionOutcome::Completed);

        let report = run_mission(&FixedLocalizer(converged()), &nav, &state, &mission(), &RUNNING).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.pose, Pose::new(30.48, 30.48, 90.0));
        assert_eq!(nav.calls(), vec!["travel_to 30.48 30.48", "turn_to 90"]);
    }

    #[test]
    fn test_failed_localization_continues_by_default() {
        let state = Arc::new(PoseState::default());
        let nav = Recorder::new(Arc::clone(&state), MotionOutcome::Completed);

        let report =
            run_mission(&FixedLocalizer(NOT_CONVERGED), &nav, &state, &mission(), &RUNNING).unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.travel, Some(MotionOutcome::Completed));
        assert_eq!(nav.calls().len(), 2);
    }

    #[test]
    fn test_failed_localization_aborts_when_configured() {
        let state = Arc::new(PoseState::default());
        let nav = Recorder::new(Arc::clone(&state), MotionOutcome::Completed);
        let mission = MissionConfig {
            abort_on_failure: true,
            ..mission()
        };

        let report = run_mission(&FixedLocalizer(NOT_CONVERGED), &nav, &state, &mission, &RUNNING).unwrap();

        assert_eq!(report.travel, None);
        assert_eq!(report.facing, None);
        assert!(nav.calls().is_empty());
        assert_eq!(report.pose, Pose::default());
    }

    #[test]
    fn test_interrupted_travel_skips_final_turn() {
        let state = Arc::new(PoseState::default());
        let nav = Recorder::new(Arc::clone(&state), MotionOutcome::Interrupted);

        let report = run_mission(&FixedLocalizer(converged()), &nav, &state, &mission(), &RUNNING).unwrap();

        assert_eq!(report.travel, Some(MotionOutcome::Interrupted));
        assert_eq!(report.facing, None);
        assert_eq!(nav.calls(), vec!["travel_to 30.48 30.48"]);
    }

    #[test]
    fn test_shutdown_stops_before_driving() {
        let state = Arc::new(PoseState::default());
        let nav = Recorder::new(Arc::clone(&state), MotionOutcome::Completed);
        let stopped = AtomicBool::new(false);

        let report =
            run_mission(&FixedLocalizer(converged()), &nav, &state, &mission(), &stopped).unwrap();

        assert!(report.localization.is_converged());
        assert_eq!(report.travel, None);
        assert!(nav.calls().is_empty());
    }

    #[test]
    fn test_thread_reports_over_channel() {
        let state = Arc::new(PoseState::default());
        let nav = Arc::new(Recorder::new(Arc::clone(&state), MotionOutcome::Completed));

        let (thread, rx) = MissionThread::spawn(
            Arc::new(FixedLocalizer(converged())),
            nav,
            Arc::clone(&state),
            mission(),
            Arc::new(AtomicBool::new(true)),
        )
        .unwrap();

        let report = rx.recv().unwrap().unwrap();
        assert!(report.is_complete());
        thread.join().unwrap();
    }
}
