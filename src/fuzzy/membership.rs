//! Piecewise-linear membership functions

use serde::{Deserialize, Serialize};

/// Shape of a fuzzy set. Every shape is clamped to [0, 1] for any input,
/// and NaN has no membership anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Membership {
    /// 1 up to `full`, linear down to 0 at `zero`.
    Falling { full: f64, zero: f64 },
    /// 0 up to `zero`, linear up to 1 at `full`.
    Rising { zero: f64, full: f64 },
    Triangle { left: f64, peak: f64, right: f64 },
    Trapezoid {
        left: f64,
        left_top: f64,
        right_top: f64,
        right: f64,
    },
}

impl Membership {
    pub fn degree(&self, x: f64) -> f64 {
        if x.is_nan() {
            return 0.0;
        }
        let raw = match *self {
            Membership::Falling { full, zero } => 1.0 - ramp(x, full, zero),
            Membership::Rising { zero, full } => ramp(x, zero, full),
            Membership::Triangle { left, peak, right } => {
                ramp(x, left, peak).min(1.0 - ramp(x, peak, right))
            }
            Membership::Trapezoid {
                left,
                left_top,
                right_top,
                right,
            } => ramp(x, left, left_top).min(1.0 - ramp(x, right_top, right)),
        };
        raw.clamp(0.0, 1.0)
    }
}

/// 0 at or below `from`, 1 at or above `to`, linear between.
fn ramp(x: f64, from: f64, to: f64) -> f64 {
    if x <= from {
        0.0
    } else if x >= to {
        1.0
    } else {
        (x - from) / (to - from)
    }
}
