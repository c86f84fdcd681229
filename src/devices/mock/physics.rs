//! Ground-truth kinematics for the simulated robot
//!
//! The world is integrated lazily: every drive command and every sensor or
//! encoder read first advances the true pose to the current instant using
//! the wheel speeds commanded since the previous access.

use super::config::{ArenaConfig, SimulationConfig};
use super::noise::{NoiseStream, SensorNoise};
use crate::config::RobotConfig;
use crate::core::types::Pose;
use crate::drivers::WheelAngles;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Longest interval integrated in one step
const MAX_STEP: Duration = Duration::from_millis(2);

/// Pose after the wheels turned by `left` and `right` degrees.
///
/// Translation follows the midpoint heading of the step.
pub fn integrate(pose: Pose, left: f64, right: f64, robot: &RobotConfig) -> Pose {
    let left = left.to_radians() * robot.wheel_radius;
    let right = right.to_radians() * robot.wheel_radius;
    let distance = (left + right) / 2.0;
    let rotation = ((right - left) / robot.track_width).to_degrees();

    let mid = (pose.heading + rotation / 2.0).to_radians();
    Pose::new(
        pose.x + distance * mid.cos(),
        pose.y + distance * mid.sin(),
        pose.heading + rotation,
    )
}

struct WorldState {
    pose: Pose,
    /// Commanded wheel speeds (degrees/second)
    speeds: (f64, f64),
    wheels: WheelAngles,
    last_update: Instant,
    slip: SensorNoise,
}

/// Shared ground truth of the simulation
pub struct SimWorld {
    state: Mutex<WorldState>,
    robot: RobotConfig,
    arena: ArenaConfig,
    max_wheel_speed: f64,
}

impl SimWorld {
    pub fn new(robot: RobotConfig, config: &SimulationConfig) -> Self {
        Self {
            state: Mutex::new(WorldState {
                pose: config.start_pose(),
                speeds: (0.0, 0.0),
                wheels: WheelAngles::default(),
                last_update: Instant::now(),
                slip: SensorNoise::new(
                    config.random_seed,
                    NoiseStream::Slip,
                    config.encoders.slip_stddev,
                    0.0,
                ),
            }),
            robot,
            arena: config.arena,
            max_wheel_speed: config.max_wheel_speed,
        }
    }

    /// True pose now.
    pub fn pose(&self) -> Pose {
        let mut state = self.state.lock();
        self.advance(&mut state, Instant::now());
        state.pose
    }

    /// Cumulative wheel angles now.
    pub fn wheel_angles(&self) -> WheelAngles {
        let mut state = self.state.lock();
        self.advance(&mut state, Instant::now());
        state.wheels
    }

    /// Command new wheel speeds, clamped to the wheel speed limit.
    pub fn set_wheel_speeds(&self, left: f64, right: f64) {
        let mut state = self.state.lock();
        self.advance(&mut state, Instant::now());
        let limit = self.max_wheel_speed;
        state.speeds = (left.clamp(-limit, limit), right.clamp(-limit, limit));
    }

    /// Commanded wheel speeds.
    pub fn wheel_speeds(&self) -> (f64, f64) {
        self.state.lock().speeds
    }

    fn advance(&self, state: &mut WorldState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_update);
        state.last_update = now;
        if state.speeds == (0.0, 0.0) {
            return;
        }

        let mut remaining = elapsed;
        while !remaining.is_zero() {
            let dt = remaining.min(MAX_STEP);
            remaining -= dt;
            self.step(state, dt.as_secs_f64());
        }
    }

    fn step(&self, state: &mut WorldState, dt: f64) {
        let (left_speed, right_speed) = state.speeds;
        let left = left_speed * dt;
        let right = right_speed * dt;
        state.wheels.left += left;
        state.wheels.right += right;

        // Ground contact slips relative to what the encoders measure
        let slip_left = state.slip.perturb(1.0);
        let slip_right = state.slip.perturb(1.0);
        let next = integrate(state.pose, left * slip_left, right * slip_right, &self.robot);

        if self.arena.contains(next.x, next.y) {
            state.pose = next;
        } else {
            // Pinned against a wall: rotation still happens
            state.pose.heading = next.heading;
        }
    }
}
