//! Angle normalization in degrees.
//!
//! Every stored heading and every heading difference in the crate goes
//! through [`to_range`] so that wrap-around at the 0/360 boundary is handled
//! the same way everywhere.

/// Full turn in degrees.
pub const FULL_TURN: f64 = 360.0;

/// Which end of a 360° interval is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    /// `[lower, lower + 360)`, e.g. headings in `[0, 360)`.
    Lower,
    /// `(lower, lower + 360]`, e.g. differences in `(-180, 180]`.
    Upper,
}

impl Closed {
    #[inline]
    fn contains(self, angle: f64, lower: f64) -> bool {
        let upper = lower + FULL_TURN;
        match self {
            Closed::Lower => angle >= lower && angle < upper,
            Closed::Upper => angle > lower && angle <= upper,
        }
    }
}

/// Map `angle` into the 360°-wide interval anchored at `lower`.
///
/// Angles already inside the interval are returned unchanged, which makes
/// the function idempotent. Non-finite input maps to the closed end of the
/// interval.
///
/// # Example
/// ```
/// use disha::core::math::{Closed, to_range};
///
/// assert_eq!(to_range(-90.0, 0.0, Closed::Lower), 270.0);
/// assert_eq!(to_range(360.0, 0.0, Closed::Lower), 0.0);
/// assert_eq!(to_range(-180.0, -180.0, Closed::Upper), 180.0);
/// assert_eq!(to_range(725.0, -180.0, Closed::Upper), 5.0);
/// ```
pub fn to_range(angle: f64, lower: f64, closed: Closed) -> f64 {
    if closed.contains(angle, lower) {
        return angle;
    }

    let mut offset = (angle - lower).rem_euclid(FULL_TURN);
    match closed {
        Closed::Lower if offset >= FULL_TURN => offset = 0.0,
        Closed::Upper if offset == 0.0 || offset > FULL_TURN => offset = FULL_TURN,
        _ => {}
    }

    let wrapped = lower + offset;
    if closed.contains(wrapped, lower) {
        return wrapped;
    }

    // Rounding of `lower + offset` can land a hair outside the interval
    if wrapped.is_finite() {
        let nudged = if wrapped < lower + FULL_TURN / 2.0 {
            wrapped + FULL_TURN
        } else {
            wrapped - FULL_TURN
        };
        if closed.contains(nudged, lower) {
            return nudged;
        }
    }

    match closed {
        Closed::Lower => lower,
        Closed::Upper => lower + FULL_TURN,
    }
}

/// Normalize a heading to `[0, 360)`.
#[inline]
pub fn wrap_heading(angle: f64) -> f64 {
    to_range(angle, 0.0, Closed::Lower)
}

/// Normalize a heading difference to `(-180, 180]`.
#[inline]
pub fn wrap_delta(angle: f64) -> f64 {
    to_range(angle, -180.0, Closed::Upper)
}

/// Signed shortest rotation from heading `from` to heading `to`.
///
/// Positive is counter-clockwise.
#[inline]
pub fn heading_diff(from: f64, to: f64) -> f64 {
    wrap_delta(to - from)
}

/// Bearing in degrees of the vector `(dx, dy)`, in `[0, 360)`.
#[inline]
pub fn bearing(dx: f64, dy: f64) -> f64 {
    wrap_heading(dy.atan2(dx).to_degrees())
}
