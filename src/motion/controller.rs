//! Closed-loop motion controller
//!
//! Every command polls the shared pose once per control period and sets
//! the wheel speeds until its target is reached. Commands are numbered; a
//! command that sees a newer number has been superseded and returns
//! [`MotionOutcome::Interrupted`] without touching the motors again.

use super::{MotionOutcome, Navigator};
use crate::config::{MotionConfig, RobotConfig};
use crate::core::math::{bearing, wrap_delta};
use crate::core::types::GridPoint;
use crate::drivers::DifferentialDrive;
use crate::error::Result;
use crate::state::PoseState;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

/// Motion controller shared by the mission thread and anything that may
/// preempt it.
pub struct MotionController {
    drive: Mutex<Box<dyn DifferentialDrive>>,
    state: Arc<PoseState>,
    config: MotionConfig,
    /// Sequence number of the newest command
    sequence: AtomicU64,
}

/// Bookkeeping for one running command
struct Command {
    seq: u64,
    started: Instant,
}

impl MotionController {
    /// Create new motion controller
    pub fn new(
        drive: Box<dyn DifferentialDrive>,
        state: Arc<PoseState>,
        robot: &RobotConfig,
        config: MotionConfig,
    ) -> Self {
        log::debug!(
            "MotionController: rotate={:.0}°/s ({:.1}°/s yaw), forward={:.0}°/s ({:.1}cm/s)",
            config.rotate_speed,
            2.0 * robot.wheel_radius * config.rotate_speed / robot.track_width,
            config.forward_speed,
            config.forward_speed.to_radians() * robot.wheel_radius
        );

        Self {
            drive: Mutex::new(drive),
            state,
            config,
            sequence: AtomicU64::new(0),
        }
    }

    /// Pose estimate the controller steers by.
    pub fn state(&self) -> &Arc<PoseState> {
        &self.state
    }

    fn begin(&self) -> Command {
        Command {
            seq: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            started: Instant::now(),
        }
    }

    #[inline]
    fn is_current(&self, cmd: &Command) -> bool {
        self.sequence.load(Ordering::SeqCst) == cmd.seq
    }

    /// Set wheel speeds if `cmd` still owns the motors.
    ///
    /// The ownership check and the write happen under the drive lock so a
    /// superseded command cannot overwrite its successor's speeds.
    fn drive(&self, cmd: &Command, left: f64, right: f64) -> Result<bool> {
        let mut drive = self.drive.lock();
        if !self.is_current(cmd) {
            return Ok(false);
        }
        drive.set_wheel_speeds(left, right)?;
        Ok(true)
    }

    fn halt(&self, cmd: &Command) -> Result<bool> {
        let mut drive = self.drive.lock();
        if !self.is_current(cmd) {
            return Ok(false);
        }
        drive.stop()?;
        Ok(true)
    }

    /// Finish `cmd` with `outcome`, stopping the motors if it still owns them.
    fn finish(&self, cmd: &Command, outcome: MotionOutcome) -> Result<MotionOutcome> {
        if self.halt(cmd)? {
            Ok(outcome)
        } else {
            Ok(MotionOutcome::Interrupted)
        }
    }

    fn timed_out(&self, cmd: &Command) -> bool {
        cmd.started.elapsed() >= self.config.command_timeout()
    }

    fn speed(&self, base: f64, remaining: f64, slow_zone: f64) -> f64 {
        if remaining > slow_zone {
            base
        } else {
            base * self.config.slow_factor
        }
    }

    /// Rotate by `degrees` as part of `cmd`.
    fn rotate(&self, cmd: &Command, degrees: f64) -> Result<MotionOutcome> {
        let target = degrees.abs();
        let direction = degrees.signum();
        let mut last = self.state.heading();
        let mut turned = 0.0;

        loop {
            if !self.is_current(cmd) {
                log::debug!("MotionController: rotation interrupted after {:.1}°", turned);
                return Ok(MotionOutcome::Interrupted);
            }

            let heading = self.state.heading();
            turned += wrap_delta(heading - last) * direction;
            last = heading;

            let remaining = target - turned;
            if remaining <= self.config.heading_tolerance {
                return self.finish(cmd, MotionOutcome::Completed);
            }
            if self.timed_out(cmd) {
                log::warn!(
                    "MotionController: rotation timed out - turned {:.1}° of {:.1}°",
                    turned * direction,
                    degrees
                );
                return self.finish(cmd, MotionOutcome::TimedOut);
            }

            let speed = self.speed(self.config.rotate_speed, remaining, self.config.slow_zone_deg);
            if !self.drive(cmd, -direction * speed, direction * speed)? {
                return Ok(MotionOutcome::Interrupted);
            }
            thread::sleep(self.config.control_period());
        }
    }

    /// Rotate by a signed relative angle (positive = counter-clockwise).
    ///
    /// Rotation is accumulated from wrapped per-tick heading changes, so
    /// turns of a full revolution or more are supported.
    pub fn turn(&self, degrees: f64) -> Result<MotionOutcome> {
        let cmd = self.begin();
        log::debug!("MotionController: turn {:.1}° (#{})", degrees, cmd.seq);
        self.rotate(&cmd, degrees)
    }

    /// Rotate to an absolute heading the short way round.
    pub fn turn_to(&self, heading: f64) -> Result<MotionOutcome> {
        let cmd = self.begin();
        let delta = wrap_delta(heading - self.state.heading());
        log::debug!(
            "MotionController: turn_to {:.1}° by {:.1}° (#{})",
            heading,
            delta,
            cmd.seq
        );
        self.rotate(&cmd, delta)
    }

    /// Drive straight for a signed distance (cm).
    pub fn travel(&self, distance: f64) -> Result<MotionOutcome> {
        let cmd = self.begin();
        let start = self.state.pose();
        let (ux, uy) = {
            let h = start.heading.to_radians();
            (h.cos(), h.sin())
        };
        let target = distance.abs();
        let direction = distance.signum();
        log::debug!("MotionController: travel {:.1}cm (#{})", distance, cmd.seq);

        loop {
            if !self.is_current(&cmd) {
                return Ok(MotionOutcome::Interrupted);
            }

            // Progress measured along the starting heading
            let pose = self.state.pose();
            let travelled = ((pose.x - start.x) * ux + (pose.y - start.y) * uy) * direction;
            let remaining = target - travelled;
            if remaining <= self.config.distance_tolerance {
                return self.finish(&cmd, MotionOutcome::Completed);
            }
            if self.timed_out(&cmd) {
                log::warn!(
                    "MotionController: travel timed out - {:.1}cm of {:.1}cm",
                    travelled,
                    target
                );
                return self.finish(&cmd, MotionOutcome::TimedOut);
            }

            let speed = direction
                * self.speed(self.config.forward_speed, remaining, self.config.slow_zone_cm);
            if !self.drive(&cmd, speed, speed)? {
                return Ok(MotionOutcome::Interrupted);
            }
            thread::sleep(self.config.control_period());
        }
    }

    /// Face `target` and drive to it in a straight line.
    ///
    /// Driving ends within the distance tolerance, or as soon as the
    /// distance starts growing again (target passed abeam).
    pub fn travel_to(&self, target: GridPoint, avoid: bool) -> Result<MotionOutcome> {
        let cmd = self.begin();
        if avoid {
            log::debug!("MotionController: obstacle avoidance unavailable, driving straight");
        }

        let pose = self.state.pose();
        let distance = pose.position().distance(&target);
        log::debug!(
            "MotionController: travel_to ({:.1}, {:.1}) from {} - {:.1}cm (#{})",
            target.x,
            target.y,
            pose,
            distance,
            cmd.seq
        );
        if distance <= self.config.distance_tolerance {
            return self.finish(&cmd, MotionOutcome::Completed);
        }

        let heading = bearing(target.x - pose.x, target.y - pose.y);
        let outcome = self.rotate(&cmd, wrap_delta(heading - pose.heading))?;
        if !outcome.is_completed() {
            return Ok(outcome);
        }

        let mut closest = distance;
        loop {
            if !self.is_current(&cmd) {
                return Ok(MotionOutcome::Interrupted);
            }

            let remaining = self.state.pose().position().distance(&target);
            if remaining <= self.config.distance_tolerance {
                return self.finish(&cmd, MotionOutcome::Completed);
            }
            if remaining > closest + self.config.distance_tolerance {
                log::debug!(
                    "MotionController: passed target, stopping {:.2}cm away",
                    remaining
                );
                return self.finish(&cmd, MotionOutcome::Completed);
            }
            if self.timed_out(&cmd) {
                log::warn!(
                    "MotionController: travel_to timed out {:.1}cm from target",
                    remaining
                );
                return self.finish(&cmd, MotionOutcome::TimedOut);
            }
            closest = closest.min(remaining);

            let speed = self.speed(self.config.forward_speed, remaining, self.config.slow_zone_cm);
            if !self.drive(&cmd, speed, speed)? {
                return Ok(MotionOutcome::Interrupted);
            }
            thread::sleep(self.config.control_period());
        }
    }

    /// Stop the wheels and supersede any running command.
    pub fn stop(&self) -> Result<()> {
        let cmd = self.begin();
        self.halt(&cmd).map(|_| ())
    }
}

impl Navigator for MotionController {
    fn turn(&self, degrees: f64) -> Result<MotionOutcome> {
        MotionController::turn(self, degrees)
    }

    fn turn_to(&self, heading: f64) -> Result<MotionOutcome> {
        MotionController::turn_to(self, heading)
    }

    fn travel(&self, distance: f64) -> Result<MotionOutcome> {
        MotionController::travel(self, distance)
    }

    fn travel_to(&self, target: GridPoint, avoid: bool) -> Result<MotionOutcome> {
        MotionController::travel_to(self, target, avoid)
    }

    fn stop(&self) -> Result<()> {
        MotionController::stop(self)
    }
}
