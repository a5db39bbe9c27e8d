//! Series smoothing
//!
//! Two-pole super smoother applied ahead of swing scanning so that minor
//! noise does not produce spurious extrema.

use std::f64::consts::{PI, SQRT_2};

use crate::Period;

/// Two-pole super smoother with a fixed length.
///
/// Output has the input's length. Positions holding a non-finite input are
/// NaN and leave the filter state untouched; history before the first finite
/// value is seeded with that value, so a constant series passes through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperSmoother {
    pub length: Period,
}

impl Default for SuperSmoother {
    fn default() -> Self {
        Self {
            length: Period::new_const(super::helpers::DEFAULT_SMOOTH_LENGTH),
        }
    }
}

impl SuperSmoother {
    pub fn new(length: Period) -> Self {
        Self { length }
    }

    /// Filter coefficients `(c1, c2, c3)`; they always sum to one.
    pub fn coefficients(&self) -> (f64, f64, f64) {
        let length = self.length.get() as f64;
        let a1 = (-SQRT_2 * PI / length).exp();
        let c2 = 2.0 * a1 * (SQRT_2 * PI / length).cos();
        let c3 = -a1 * a1;
        let c1 = 1.0 - c2 - c3;
        (c1, c2, c3)
    }

    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        let (c1, c2, c3) = self.coefficients();
        let mut out = vec![f64::NAN; values.len()];

        // (previous input, y[i-1], y[i-2])
        let mut state: Option<(f64, f64, f64)> = None;
        for (i, &x) in values.iter().enumerate() {
            if !x.is_finite() {
                continue;
            }
            let (prev, y1, y2) = state.unwrap_or((x, x, x));
            let y = c1 * (x + prev) / 2.0 + c2 * y1 + c3 * y2;
            out[i] = y;
            state = Some((x, y, y1));
        }
        out
    }
}

/// Smooth `values` with a super smoother of the given length.
#[inline]
pub fn super_smoother(values: &[f64], length: Period) -> Vec<f64> {
    SuperSmoother::new(length).apply(values)
}
