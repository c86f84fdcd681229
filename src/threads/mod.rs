//! Thread management for the localization daemon.
//!
//! - `odometry`: integrates wheel encoders into the shared pose
//! - `poll-reflectance`, `poll-proximity`: push sensor samples and raise
//!   events
//! - `mission`: runs the localizer and the follow-up motion
//!   ([`MissionThread`])
//!
//! The periodic threads run until the shared `running` flag is cleared.

mod mission_thread;

pub use mission_thread::{MissionReport, MissionThread, run_mission};

use crate::config::{Config, LocalizerKind};
use crate::core::types::{Pose, SensorChannel};
use crate::devices::mock::SimulatedRobot;
use crate::drivers::{DifferentialDrive, ScalarSensor, WheelEncoders};
use crate::error::Result;
use crate::localization::{LineLocalizer, Localizer, ProximityLocalizer};
use crate::motion::{MotionController, Navigator};
use crate::odometry::OdometryUpdater;
use crate::sensors::SensorPoller;
use crate::state::PoseState;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Driver set the runtime is built on
pub struct Devices {
    pub drive: Box<dyn DifferentialDrive>,
    pub encoders: Box<dyn WheelEncoders>,
    pub reflectance: Box<dyn ScalarSensor>,
    pub proximity: Box<dyn ScalarSensor>,
}

impl From<&SimulatedRobot> for Devices {
    fn from(robot: &SimulatedRobot) -> Self {
        Self {
            drive: Box::new(robot.drive()),
            encoders: Box::new(robot.encoders()),
            reflectance: Box::new(robot.reflectance()),
            proximity: Box::new(robot.proximity()),
        }
    }
}

/// Shared state, motion controller and the periodic threads feeding them
pub struct Runtime {
    state: Arc<PoseState>,
    motion: Arc<MotionController>,
    config: Config,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Runtime {
    /// Install the event rules and start odometry and both pollers.
    pub fn start(
        config: &Config,
        initial: Pose,
        devices: Devices,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let state = Arc::new(PoseState::new(initial));
        let sensors = &config.sensors;
        state.set_rule(SensorChannel::Reflectance, sensors.reflectance.rule());
        state.set_rule(SensorChannel::Proximity, sensors.proximity.rule());

        let mut handles = Vec::with_capacity(3);
        handles.push(OdometryUpdater::spawn(
            devices.encoders,
            Arc::clone(&state),
            &config.robot,
            &config.odometry,
            Arc::clone(&running),
        )?);
        handles.push(SensorPoller::spawn(
            SensorChannel::Reflectance,
            devices.reflectance,
            Arc::clone(&state),
            sensors.reflectance.period(),
            Arc::clone(&running),
        )?);
        handles.push(SensorPoller::spawn(
            SensorChannel::Proximity,
            devices.proximity,
            Arc::clone(&state),
            sensors.proximity.period(),
            Arc::clone(&running),
        )?);

        let motion = Arc::new(MotionController::new(
            devices.drive,
            Arc::clone(&state),
            &config.robot,
            config.motion,
        ));

        log::info!("Runtime: started at {}", state.pose());
        Ok(Self {
            state,
            motion,
            config: config.clone(),
            running,
            handles,
        })
    }

    pub fn state(&self) -> &Arc<PoseState> {
        &self.state
    }

    pub fn motion(&self) -> &Arc<MotionController> {
        &self.motion
    }

    /// Build the selected localizer on this runtime.
    pub fn localizer(&self, kind: LocalizerKind) -> Arc<dyn Localizer> {
        let nav: Arc<dyn Navigator> = self.motion.clone();
        match kind {
            LocalizerKind::Line => Arc::new(LineLocalizer::new(
                Arc::clone(&self.state),
                nav,
                self.config.localization,
            )),
            LocalizerKind::Proximity => Arc::new(ProximityLocalizer::new(
                Arc::clone(&self.state),
                nav,
                self.config.proximity,
            )),
        }
    }

    /// Stop the motors, clear `running` and join the periodic threads.
    pub fn shutdown(self) {
        if let Err(e) = self.motion.stop() {
            log::error!("Runtime: failed to stop motors: {}", e);
        }
        self.running.store(false, Ordering::Relaxed);

        for handle in self.handles {
            if handle.join().is_err() {
                log::error!("Runtime: worker thread panicked");
            }
        }
        log::info!("Runtime: stopped at {}", self.state.pose());
    }
}
