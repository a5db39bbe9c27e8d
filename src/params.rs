//! Tunable detector parameters and sweeps over them
//!
//! A detector that implements [`ParameterizedDetector`] lists its knobs as
//! [`ParamMeta`] and can be rebuilt from a name -> value map. [`sweep`]
//! expands every knob's range into a grid and builds one detector per point,
//! which is how alternative swing windows or crossover levels are compared
//! over the same series.
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! use swingscan::params::{sweep, ParameterizedDetector};
//! use swingscan::prelude::*;
//!
//! let mut point = HashMap::new();
//! point.insert("lookback", 3.0);
//! let detector = SwingDetector::with_params(&point)?;
//! assert_eq!(detector.lookback.get(), 3);
//!
//! let variants = sweep::<MomentumShiftDetector>()?;
//! assert_eq!(variants.len(), 7);
//! # Ok::<(), PatternError>(())
//! ```

use std::collections::HashMap;

use crate::{PatternError, Period, Result, Threshold};

/// Value domain of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Finite oscillator or percentage level
    Level,
    /// Whole number of bars, at least one
    Period,
}

/// One tunable parameter: its default and the inclusive `(min, max, step)` sweep range
#[derive(Debug, Clone)]
pub struct ParamMeta {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: f64,
    pub range: (f64, f64, f64),
    pub description: &'static str,
}

impl ParamMeta {
    pub const fn level(
        name: &'static str,
        default: f64,
        range: (f64, f64, f64),
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Level,
            default,
            range,
            description,
        }
    }

    pub const fn period(
        name: &'static str,
        default: f64,
        range: (f64, f64, f64),
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Period,
            default,
            range,
            description,
        }
    }

    /// Values from `min` to `max` in `step` increments.
    ///
    /// Points are computed as `min + k * step` so long sweeps do not drift.
    /// A non-positive step yields only `min`.
    pub fn grid(&self) -> Vec<f64> {
        let (min, max, step) = self.range;
        if step.is_nan() || step <= 0.0 || max < min {
            return vec![min];
        }
        let count = ((max - min) / step + 1e-9).floor() as usize + 1;
        (0..count).map(|k| min + k as f64 * step).collect()
    }

    pub fn validate(&self, value: f64) -> Result<()> {
        let (min, max, _) = self.range;
        if !value.is_finite() {
            return Err(PatternError::InvalidValue("Parameter must be finite"));
        }
        if value < min || value > max {
            return Err(PatternError::OutOfRange {
                field: self.name,
                value,
                min,
                max,
            });
        }
        if self.kind == ParamKind::Period && (value < 1.0 || value.fract() != 0.0) {
            return Err(PatternError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
    }
}

/// Detector that can be rebuilt from named parameter values.
pub trait ParameterizedDetector: Sized {
    fn param_meta() -> &'static [ParamMeta];

    /// Missing names fall back to the detector's defaults.
    fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;
}

/// Every combination of the detector's parameter grids, validated and built.
pub fn sweep<D: ParameterizedDetector>() -> Result<Vec<D>> {
    let mut points: Vec<HashMap<&str, f64>> = vec![HashMap::new()];
    for meta in D::param_meta() {
        let grid = meta.grid();
        for value in &grid {
            meta.validate(*value)?;
        }
        points = points
            .into_iter()
            .flat_map(|point| {
                grid.iter().map(move |&value| {
                    let mut next = point.clone();
                    next.insert(meta.name, value);
                    next
                })
            })
            .collect();
    }
    points.iter().map(D::with_params).collect()
}

pub fn level_param(params: &HashMap<&str, f64>, name: &str, default: f64) -> Result<Threshold> {
    Threshold::new(params.get(name).copied().unwrap_or(default))
}

/// Fractional values are rejected rather than truncated
pub fn period_param(params: &HashMap<&str, f64>, name: &str, default: usize) -> Result<Period> {
    match params.get(name).copied() {
        None => Period::new(default),
        Some(value) if value >= 1.0 && value.fract() == 0.0 => Period::new(value as usize),
        Some(_) => Err(PatternError::InvalidValue("Period must be a positive integer")),
    }
}
