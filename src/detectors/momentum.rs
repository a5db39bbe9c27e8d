//! Momentum patterns
//!
//! Trend classification over a short trailing window (MACD histogram shift)
//! and direction flips of a trend-following indicator.

use std::collections::HashMap;

use tracing::trace;

use super::helpers::{all_finite, DEFAULT_FLIP_WINDOW, DEFAULT_TREND_WINDOW};
use crate::params::{period_param, ParamMeta, ParameterizedDetector};
use crate::{
    Classification, Direction, PatternCategory, PatternDetector, PatternError, PatternId,
    PatternMatch, PatternMetadata, Period, Result, SeriesSet, Snapshot, Trend,
};

pub const MOMENTUM_SHIFT: PatternId = PatternId("MOMENTUM_SHIFT");
pub const SUPERTREND_FLIP: PatternId = PatternId("SUPERTREND_FLIP");

impl_with_defaults!(MomentumShiftDetector, DirectionFlipDetector);

/// Direction of the last `window` values.
///
/// Every consecutive pair must move strictly the same way; anything else,
/// including a non-finite value or fewer than `window` points, is `Neutral`.
pub fn classify_trend(values: &[f64], window: usize) -> Trend {
    if window < 2 || values.len() < window {
        return Trend::Neutral;
    }
    let recent = &values[values.len() - window..];
    if !all_finite(recent) {
        return Trend::Neutral;
    }

    if recent.windows(2).all(|w| w[1] > w[0]) {
        Trend::Increasing
    } else if recent.windows(2).all(|w| w[1] < w[0]) {
        Trend::Decreasing
    } else {
        Trend::Neutral
    }
}

/// Histogram momentum turning consistently up or down
#[derive(Debug, Clone, Copy)]
pub struct MomentumShiftDetector {
    pub key: &'static str,
    pub window: Period,
}

impl Default for MomentumShiftDetector {
    fn default() -> Self {
        Self {
            key: "macd_hist",
            window: Period::new_const(DEFAULT_TREND_WINDOW),
        }
    }
}

impl PatternDetector for MomentumShiftDetector {
    fn id(&self) -> PatternId {
        MOMENTUM_SHIFT
    }

    fn min_len(&self) -> usize {
        self.window.get()
    }

    fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch> {
        let Some(values) = series.get(self.key) else {
            return Vec::new();
        };
        let window = self.window.get();

        let trend = classify_trend(values, window);
        let direction = match trend {
            Trend::Increasing => Direction::Bullish,
            Trend::Decreasing => Direction::Bearish,
            Trend::Neutral => return Vec::new(),
        };

        let last = values.len() - 1;
        let first = values[values.len() - window];
        vec![PatternMatch {
            pattern_id: MOMENTUM_SHIFT,
            direction,
            index: last,
            classification: Classification::Trend(trend),
            values: Snapshot::new()
                .with(self.key, values[last])
                .with("change", values[last] - first),
        }]
    }

    fn validate_config(&self) -> Result<()> {
        if self.window.get() < 2 {
            return Err(PatternError::OutOfRange {
                field: "window",
                value: self.window.get() as f64,
                min: 2.0,
                max: f64::INFINITY,
            });
        }
        Ok(())
    }

    fn metadata(&self) -> PatternMetadata {
        PatternMetadata {
            name: "Momentum Shift",
            description: "Histogram strictly rising or falling over the trailing window",
            category: PatternCategory::Momentum,
        }
    }
}

// ============================================================
// DIRECTION FLIP
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flip {
    /// First index carrying the new direction
    pub index: usize,
    pub from: f64,
    pub to: f64,
}

/// Most recent change of a direction series (e.g. +1/-1) within the last `window` values.
pub fn find_direction_flip(direction: &[f64], window: usize) -> Option<Flip> {
    let len = direction.len();
    for i in 1..window.min(len) {
        let (from, to) = (direction[len - i - 1], direction[len - i]);
        if from.is_nan() || to.is_nan() {
            trace!(offset = i, "skipping direction value");
            continue;
        }
        if from != to {
            return Some(Flip {
                index: len - i,
                from,
                to,
            });
        }
    }
    None
}

/// Supertrend switching sides
#[derive(Debug, Clone, Copy)]
pub struct DirectionFlipDetector {
    pub key: &'static str,
    pub window: Period,
}

impl Default for DirectionFlipDetector {
    fn default() -> Self {
        Self {
            key: "supertrend_direction",
            window: Period::new_const(DEFAULT_FLIP_WINDOW),
        }
    }
}

impl PatternDetector for DirectionFlipDetector {
    fn id(&self) -> PatternId {
        SUPERTREND_FLIP
    }

    fn min_len(&self) -> usize {
        2
    }

    fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch> {
        let Some(values) = series.get(self.key) else {
            return Vec::new();
        };
        let Some(flip) = find_direction_flip(values, self.window.get()) else {
            return Vec::new();
        };

        let direction = if flip.to > 0.0 {
            Direction::Bullish
        } else if flip.to < 0.0 {
            Direction::Bearish
        } else {
            Direction::Neutral
        };

        vec![PatternMatch {
            pattern_id: SUPERTREND_FLIP,
            direction,
            index: flip.index,
            classification: Classification::None,
            values: Snapshot::new().with("from", flip.from).with("to", flip.to),
        }]
    }

    fn metadata(&self) -> PatternMetadata {
        PatternMetadata {
            name: "Supertrend Flip",
            description: "Trend direction series changing sign",
            category: PatternCategory::Momentum,
        }
    }
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATIONS
// ============================================================

static MOMENTUM_SHIFT_PARAMS: &[ParamMeta] = &[ParamMeta::period(
    "window",
    3.0,
    (2.0, 8.0, 1.0),
    "Trailing values that must move the same way",
)];

impl ParameterizedDetector for MomentumShiftDetector {
    fn param_meta() -> &'static [ParamMeta] {
        MOMENTUM_SHIFT_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            window: period_param(params, "window", DEFAULT_TREND_WINDOW)?,
            ..Self::default()
        })
    }
}
