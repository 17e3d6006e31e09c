//! Row bounds
//!
//! Every residual row `g_i` is feasible when `lower_i ≤ g_i ≤ upper_i`.
//! Equality constraints use `lower == upper`, one-sided constraints use an
//! infinite limit.

use serde::{Deserialize, Serialize};

use crate::error::{NlpError, NlpResult};

/// Lower and upper limit of a single residual row or variable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

/// Bounds of a whole constraint, one entry per residual row
pub type VecBound = Vec<Bounds>;

impl Bounds {
    /// Unbounded in both directions
    pub const NONE: Bounds = Bounds {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };
    /// g = 0
    pub const ZERO: Bounds = Bounds {
        lower: 0.0,
        upper: 0.0,
    };
    /// g ≥ 0
    pub const GREATER_ZERO: Bounds = Bounds {
        lower: 0.0,
        upper: f64::INFINITY,
    };
    /// g ≤ 0
    pub const SMALLER_ZERO: Bounds = Bounds {
        lower: f64::NEG_INFINITY,
        upper: 0.0,
    };

    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Equality bound `g = value`
    pub const fn equal(value: f64) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    /// Symmetric band `center ± deviation`
    pub fn around(center: f64, deviation: f64) -> Self {
        Self {
            lower: center - deviation,
            upper: center + deviation,
        }
    }

    /// Whether `lower ≤ upper` (NaN limits are never valid)
    pub fn is_valid(&self) -> bool {
        self.lower <= self.upper
    }

    /// Distance by which `value` lies outside the bound (0 if inside)
    ///
    /// A NaN value is never inside and counts as infinitely far away.
    pub fn violation(&self, value: f64) -> f64 {
        if value.is_nan() {
            f64::INFINITY
        } else if value < self.lower {
            self.lower - value
        } else if value > self.upper {
            value - self.upper
        } else {
            0.0
        }
    }

    /// Whether `value` lies inside the bound up to `tolerance`
    pub fn contains(&self, value: f64, tolerance: f64) -> bool {
        self.violation(value) <= tolerance
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::NONE
    }
}

/// Check `lower ≤ upper` for every row, reporting the first offending row
pub fn validate_bounds(bounds: &[Bounds]) -> NlpResult<()> {
    match bounds.iter().position(|b| !b.is_valid()) {
        Some(row) => Err(NlpError::InvalidBound {
            row,
            lower: bounds[row].lower,
            upper: bounds[row].upper,
        }),
        None => Ok(()),
    }
}
