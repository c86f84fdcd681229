//! Dead-reckoning from wheel encoders
//!
//! [`WheelOdometry`] turns cumulative wheel angles into motion increments;
//! [`OdometryUpdater`] runs it on a periodic thread and folds each increment
//! into the shared pose.

use crate::config::{OdometryConfig, RobotConfig};
use crate::core::periodic::spawn_periodic;
use crate::drivers::{WheelAngles, WheelEncoders};
use crate::error::Result;
use crate::state::PoseState;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Minimum spacing between two read-failure warnings
const WARN_INTERVAL: Duration = Duration::from_secs(1);

/// Motion between two encoder readings
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelDelta {
    /// Distance travelled by the robot centre (cm, positive = forward)
    pub distance: f64,
    /// Rotation (degrees, positive = counter-clockwise)
    pub rotation: f64,
}

impl WheelDelta {
    /// Displacement in the field frame starting from `heading`.
    ///
    /// The translation is taken along the midpoint heading of the
    /// increment. Returns `(dx, dy, dheading)`.
    pub fn displacement(&self, heading: f64) -> (f64, f64, f64) {
        let mid = (heading + self.rotation / 2.0).to_radians();
        (
            self.distance * mid.cos(),
            self.distance * mid.sin(),
            self.rotation,
        )
    }
}

/// Differential-drive odometry calculator.
///
/// Keeps the last cumulative reading as its baseline.
#[derive(Debug)]
pub struct WheelOdometry {
    /// Wheel radius (cm)
    wheel_radius: f64,
    /// Wheel separation (cm)
    track_width: f64,
    last: Option<WheelAngles>,
}

impl WheelOdometry {
    pub fn new(robot: &RobotConfig) -> Self {
        Self {
            wheel_radius: robot.wheel_radius,
            track_width: robot.track_width,
            last: None,
        }
    }

    /// Update with new cumulative wheel angles.
    ///
    /// Returns `None` on the first call (sets the baseline).
    pub fn update(&mut self, angles: WheelAngles) -> Option<WheelDelta> {
        let delta = self.last.map(|last| {
            let left = (angles.left - last.left).to_radians() * self.wheel_radius;
            let right = (angles.right - last.right).to_radians() * self.wheel_radius;

            WheelDelta {
                distance: (left + right) / 2.0,
                rotation: ((right - left) / self.track_width).to_degrees(),
            }
        });

        self.last = Some(angles);
        delta
    }
}

/// Periodic odometry task
pub struct OdometryUpdater {
    encoders: Box<dyn WheelEncoders>,
    odometry: WheelOdometry,
    state: Arc<PoseState>,
    jump_warn_cm: f64,
    last_warn: Option<Instant>,
    suppressed: u32,
}

impl OdometryUpdater {
    pub fn new(
        encoders: Box<dyn WheelEncoders>,
        state: Arc<PoseState>,
        robot: &RobotConfig,
        config: &OdometryConfig,
    ) -> Self {
        log::debug!(
            "Odometry: wheel_radius={:.2}cm, track_width={:.2}cm",
            robot.wheel_radius,
            robot.track_width
        );

        Self {
            encoders,
            odometry: WheelOdometry::new(robot),
            state,
            jump_warn_cm: config.jump_warn_cm,
            last_warn: None,
            suppressed: 0,
        }
    }

    /// Start the `odometry` thread.
    ///
    /// Runs until `running` is cleared.
    pub fn spawn(
        encoders: Box<dyn WheelEncoders>,
        state: Arc<PoseState>,
        robot: &RobotConfig,
        config: &OdometryConfig,
        running: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>> {
        let mut updater = Self::new(encoders, state, robot, config);
        spawn_periodic("odometry", config.period(), running, move || updater.tick())
    }

    /// Read the encoders once and integrate the increment.
    ///
    /// A failed read contributes nothing; the baseline is kept so the next
    /// good reading covers the whole rotation since the last one.
    pub fn tick(&mut self) {
        let angles = match self.encoders.read() {
            Ok(angles) => angles,
            Err(e) => {
                self.warn_throttled(&e.to_string());
                return;
            }
        };

        let Some(delta) = self.odometry.update(angles) else {
            log::debug!(
                "Odometry: initial wheel angles L={:.1}°, R={:.1}°",
                angles.left,
                angles.right
            );
            return;
        };

        if delta.distance.abs() > self.jump_warn_cm {
            log::warn!(
                "Odometry: large jump detected - dist={:.2}cm, rot={:.2}° (missed ticks or encoder fault)",
                delta.distance,
                delta.rotation
            );
        }

        self.state.apply_wheel_delta(&delta);
    }

    fn warn_throttled(&mut self, message: &str) {
        let now = Instant::now();
        let due = self
            .last_warn
            .is_none_or(|last| now.duration_since(last) >= WARN_INTERVAL);

        if due {
            log::warn!(
                "Odometry: encoder read failed, skipping tick ({} suppressed): {}",
                self.suppressed,
                message
            );
            self.last_warn = Some(now);
            self.suppressed = 0;
        } else {
            self.suppressed += 1;
        }
    }
}
