//! Full-stack tests on the simulated robot
//!
//! Runs the threaded runtime (odometry, pollers, motion controller) against
//! `SimulatedRobot` in real time and compares the localized estimate with
//! the simulator's ground truth.
//!
//! | Scenario | Position Error | Heading Error |
//! |----------|---------------|---------------|
//! | Line localization | < 2 cm | < 5° |
//! | Corner localization | < 2 cm | < 5° |
//! | Mission to target | < 2 cm | < 5° |
//!
//! Run with: `cargo test --test simulated_robot`

use approx::assert_abs_diff_eq;
use disha::config::{Config, LocalizerKind};
use disha::core::math::wrap_delta;
use disha::core::types::{GridPoint, Pose};
use disha::devices::mock::SimulatedRobot;
use disha::localization::LocalizationOutcome;
use disha::threads::{Devices, MissionThread, Runtime};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const POSITION_TOLERANCE: f64 = 2.0;
const HEADING_TOLERANCE: f64 = 5.0;

/// Defaults with faster rotation and odometry so a test takes seconds.
fn fast_config() -> Config {
    let mut config = Config::default();
    config.motion.rotate_speed = 300.0;
    config.odometry.period_ms = 5;
    config.simulation.random_seed = 7;
    config.localization.settle_ms = 50;
    config.proximity.settle_ms = 50;
    config
}

/// Start the runtime with the estimate 5° off the simulator's true heading.
fn start(config: &Config) -> (SimulatedRobot, Runtime) {
    let robot = SimulatedRobot::new(config.robot, config.simulation);
    let truth = robot.true_pose();
    let estimate = Pose::new(0.0, 0.0, truth.heading - 5.0);
    let runtime = Runtime::start(
        config,
        estimate,
        Devices::from(&robot),
        Arc::new(AtomicBool::new(true)),
    )
    .unwrap();
    (robot, runtime)
}

fn assert_close(estimate: Pose, truth: Pose) {
    assert_abs_diff_eq!(estimate.x, truth.x, epsilon = POSITION_TOLERANCE);
    assert_abs_diff_eq!(estimate.y, truth.y, epsilon = POSITION_TOLERANCE);
    assert_abs_diff_eq!(
        wrap_delta(estimate.heading - truth.heading),
        0.0,
        epsilon = HEADING_TOLERANCE
    );
}

#[test]
fn test_line_localization_on_simulated_robot() {
    let config = fast_config();
    let (robot, runtime) = start(&config);

    let outcome = runtime.localizer(LocalizerKind::Line).localize().unwrap();
    let estimate = runtime.state().pose();
    let truth = robot.true_pose();
    runtime.shutdown();

    assert!(
        matches!(outcome, LocalizationOutcome::Converged(_)),
        "{}",
        outcome
    );
    assert_close(estimate, truth);
}

#[test]
fn test_corner_localization_on_simulated_robot() {
    let config = fast_config();
    let (robot, runtime) = start(&config);

    let outcome = runtime
        .localizer(LocalizerKind::Proximity)
        .localize()
        .unwrap();
    let estimate = runtime.state().pose();
    let truth = robot.true_pose();
    runtime.shutdown();

    assert!(outcome.is_converged(), "{}", outcome);
    assert_close(estimate, truth);
}

#[test]
fn test_mission_reaches_target_with_flaky_sensors() {
    let mut config = fast_config();
    config.simulation.failure_rate = 0.02;
    config.mission.target = GridPoint::new(0.0, 0.0);
    config.mission.final_heading = 90.0;
    let (robot, runtime) = start(&config);

    let running = Arc::new(AtomicBool::new(true));
    let (thread, results) = MissionThread::spawn(
        runtime.localizer(LocalizerKind::Line),
        runtime.motion().clone(),
        Arc::clone(runtime.state()),
        config.mission.clone(),
        running,
    )
    .unwrap();

    let report = results
        .recv_timeout(Duration::from_secs(60))
        .unwrap()
        .unwrap();
    thread.join().unwrap();
    let truth = robot.true_pose();
    runtime.shutdown();

    assert!(report.is_complete(), "{:?}", report);
    assert_close(report.pose, truth);
    assert_abs_diff_eq!(truth.x, 0.0, epsilon = POSITION_TOLERANCE);
    assert_abs_diff_eq!(truth.y, 0.0, epsilon = POSITION_TOLERANCE);
    assert_abs_diff_eq!(wrap_delta(truth.heading - 90.0), 0.0, epsilon = HEADING_TOLERANCE);
}

#[test]
fn test_shutdown_stops_robot_and_clears_running() {
    let config = fast_config();
    let robot = SimulatedRobot::new(config.robot, config.simulation);
    let running = Arc::new(AtomicBool::new(true));
    let runtime = Runtime::start(
        &config,
        robot.true_pose(),
        Devices::from(&robot),
        Arc::clone(&running),
    )
    .unwrap();

    runtime.motion().turn(30.0).unwrap();
    runtime.shutdown();
    assert!(!running.load(Ordering::Relaxed));

    let parked = robot.true_pose();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(robot.true_pose(), parked);
}
