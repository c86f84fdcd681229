//! Motion primitives driven by the live pose estimate
//!
//! - [`controller::MotionController`]: closed-loop `turn`/`travel` on the
//!   differential drive
//! - [`Navigator`]: the motion capability localizers depend on

pub mod controller;

pub use controller::MotionController;

use crate::core::types::GridPoint;
use crate::error::Result;

/// How a motion command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionOutcome {
    /// Target reached
    Completed,
    /// Superseded by a newer command
    Interrupted,
    /// Command timeout elapsed before the target was reached
    TimedOut,
}

impl MotionOutcome {
    #[inline]
    pub fn is_completed(self) -> bool {
        self == MotionOutcome::Completed
    }
}

/// Blocking motion capability.
///
/// Angles in degrees (positive = counter-clockwise), distances in
/// centimetres. Each call returns once the motion has ended.
pub trait Navigator: Send + Sync {
    /// Rotate in place by a signed relative angle.
    fn turn(&self, degrees: f64) -> Result<MotionOutcome>;

    /// Rotate in place to an absolute heading, the short way round.
    fn turn_to(&self, heading: f64) -> Result<MotionOutcome>;

    /// Drive straight for a signed distance.
    fn travel(&self, distance: f64) -> Result<MotionOutcome>;

    /// Face `target` and drive to it.
    ///
    /// `avoid` requests obstacle avoidance, which is not implemented; the
    /// robot always drives straight.
    fn travel_to(&self, target: GridPoint, avoid: bool) -> Result<MotionOutcome>;

    /// Stop immediately, interrupting any running command.
    fn stop(&self) -> Result<()>;
}
