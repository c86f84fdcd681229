//! Simulated robot for hardware-free runs
//!
//! A small differential-drive robot on a floor of dark grid lines inside
//! an axis-aligned walled arena.
//!
//! | Component | Simulation Method |
//! |-----------|-------------------|
//! | Drive | Commanded wheel speeds, clamped to `max_wheel_speed` |
//! | Wheel encoders | Cumulative commanded wheel rotation |
//! | Ground truth | Differential drive kinematics + optional slip noise |
//! | Reflectance sensor | Grid line lookup at the rear-mounted sensor position |
//! | Proximity sensor | Ray cast from the front of the robot to the arena walls |
//!
//! There is no simulation thread. [`physics::SimWorld`] is advanced to the
//! current instant whenever any component touches it, so the simulation
//! runs in real time at whatever rate the pollers and the motion controller
//! access it.
//!
//! All components may fail reads at `failure_rate` to exercise the
//! skip-on-error paths.
//!
//! # Module Structure
//!
//! - [`config`]: Simulation parameters with defaults
//! - [`physics`]: Ground-truth kinematics
//! - [`sensor_sim`]: Reflectance and proximity sensors
//! - [`encoder_sim`]: Wheel encoders
//! - [`motor`]: Drive actuator
//! - [`noise`]: Seeded per-component read failures and measurement error

pub mod config;
pub mod encoder_sim;
pub mod motor;
pub mod noise;
pub mod physics;
pub mod sensor_sim;

use crate::config::RobotConfig;
use crate::core::types::Pose;
use config::SimulationConfig;
use encoder_sim::SimEncoders;
use motor::SimDrive;
use noise::{NoiseStream, SensorNoise};
use physics::SimWorld;
use sensor_sim::{SimProximity, SimReflectance};
use std::sync::Arc;

/// Factory for the simulated components, all sharing one world
pub struct SimulatedRobot {
    world: Arc<SimWorld>,
    config: SimulationConfig,
}

impl SimulatedRobot {
    pub fn new(robot: RobotConfig, config: SimulationConfig) -> Self {
        log::info!(
            "SimulatedRobot: true start {}, seed={}",
            config.start_pose(),
            config.random_seed
        );
        Self {
            world: Arc::new(SimWorld::new(robot, &config)),
            config,
        }
    }

    /// Ground-truth pose, for reporting and tests.
    pub fn true_pose(&self) -> Pose {
        self.world.pose()
    }

    pub fn drive(&self) -> SimDrive {
        SimDrive::new(Arc::clone(&self.world))
    }

    pub fn encoders(&self) -> SimEncoders {
        SimEncoders::new(
            Arc::clone(&self.world),
            self.noise(NoiseStream::Encoders, 0.0),
        )
    }

    pub fn reflectance(&self) -> SimReflectance {
        SimReflectance::new(
            Arc::clone(&self.world),
            self.config.grid,
            self.config.reflectance,
            self.noise(NoiseStream::Reflectance, self.config.reflectance.noise_stddev),
        )
    }

    pub fn proximity(&self) -> SimProximity {
        SimProximity::new(
            Arc::clone(&self.world),
            self.config.arena,
            self.config.proximity,
            self.noise(NoiseStream::Proximity, self.config.proximity.noise_stddev),
        )
    }

    fn noise(&self, stream: NoiseStream, stddev: f64) -> SensorNoise {
        SensorNoise::new(
            self.config.random_seed,
            stream,
            stddev,
            self.config.failure_rate,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{DifferentialDrive, ScalarSensor, WheelEncoders};
    use approx::assert_abs_diff_eq;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_components_share_world() {
        let robot = SimulatedRobot::new(
            RobotConfig::default(),
            SimulationConfig {
                random_seed: 5,
                ..SimulationConfig::default()
            },
        );
        let mut drive = robot.drive();
        let mut encoders = robot.encoders();
        let mut proximity = robot.proximity();

        let before = encoders.read().unwrap();
        drive.set_wheel_speeds(-200.0, 200.0).unwrap();
        thread::sleep(Duration::from_millis(50));
        drive.stop().unwrap();

        let after = encoders.read().unwrap();
        assert!(after.right > before.right);
        assert_abs_diff_eq!(after.left, -after.right, epsilon = 1e-9);
        assert!(robot.true_pose().heading > 50.0);
        assert!(proximity.read().unwrap() <= 255.0);
    }
}
