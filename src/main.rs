//! Disha daemon - localizes the simulated robot and drives it to a target
//!
//! Starts odometry and sensor polling, runs the configured localizer on the
//! `mission` thread, then drives to `mission.target` and faces
//! `mission.final_heading`. Ctrl-C stops the motors and exits.

use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use disha::config::Config;
use disha::core::types::Pose;
use disha::devices::mock::SimulatedRobot;
use disha::error::{Error, Result};
use disha::motion::Navigator;
use disha::threads::{Devices, MissionThread, Runtime};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How often the main thread checks the shutdown flag
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "disha")]
#[command(about = "Grid-referenced localization and odometry for a wheeled robot")]
struct Args {
    /// Configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "disha.toml")]
    config: String,

    /// Localizer to run: line or proximity (overrides mission.localizer)
    #[arg(short, long)]
    mode: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // The log level comes from the config, so report the source once the
    // logger is up
    let config_path = Path::new(&args.config);
    let from_file = config_path.exists();
    let mut config = Config::load_or_default(config_path)?;
    if let Some(mode) = args.mode {
        config.mission.localizer = mode;
    }
    let kind = config.mission.localizer_kind()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("Disha v{} starting...", env!("CARGO_PKG_VERSION"));
    if from_file {
        log::info!("Using config: {} (localizer: {})", args.config, kind);
    } else {
        log::info!(
            "No config at {}, using defaults (localizer: {})",
            args.config,
            kind
        );
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let robot = SimulatedRobot::new(config.robot, config.simulation);
    log::info!("Simulated robot placed at {}", robot.true_pose());

    let mission = &config.mission;
    let initial = Pose::new(mission.initial_x, mission.initial_y, mission.initial_heading);
    let runtime = Runtime::start(&config, initial, Devices::from(&robot), Arc::clone(&running))?;

    let nav: Arc<dyn Navigator> = runtime.motion().clone();
    let (mission_thread, results) = MissionThread::spawn(
        runtime.localizer(kind),
        Arc::clone(&nav),
        Arc::clone(runtime.state()),
        config.mission.clone(),
        Arc::clone(&running),
    )?;

    let mut outcome = None;
    while running.load(Ordering::Relaxed) {
        match results.recv_timeout(POLL_INTERVAL) {
            Ok(result) => {
                outcome = Some(result);
                break;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                log::error!("Mission thread exited without a result");
                break;
            }
        }
    }

    if outcome.is_none() {
        // Preempt each command the mission issues until it winds down
        loop {
            nav.stop()?;
            match results.recv_timeout(POLL_INTERVAL) {
                Ok(result) => {
                    log::debug!("Mission ended after shutdown: {:?}", result);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
    if mission_thread.join().is_err() {
        log::error!("Mission thread panicked");
    }

    let estimate = runtime.state().pose();
    runtime.shutdown();

    match outcome {
        Some(Ok(report)) => {
            log::info!(
                "Mission {}: {}",
                if report.is_complete() { "complete" } else { "incomplete" },
                report.localization
            );
        }
        Some(Err(e)) => {
            log::error!("Mission failed: {}", e);
            return Err(e);
        }
        None => log::info!("Mission cancelled"),
    }
    log::info!("Estimated pose {}, true pose {}", estimate, robot.true_pose());

    Ok(())
}
