//! Swing extremum detection and classification
//!
//! A swing high at `i` is strictly greater than every value in the
//! `lookback` positions before it and the `lookahead` positions after it;
//! swing lows mirror this with strictly smaller. Any tie disqualifies the
//! candidate, and positions too close to either end are never swings.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::helpers::{
    all_finite, non_finite_prefix, rolling_max, rolling_min, window_is_finite, DEFAULT_LOOKAHEAD,
    DEFAULT_LOOKBACK, DEFAULT_SMOOTH_LENGTH,
};
use super::smoothing::super_smoother;
use crate::params::{period_param, ParamMeta, ParameterizedDetector};
use crate::{
    Classification, Direction, PatternCategory, PatternDetector, PatternId, PatternMatch,
    PatternMetadata, Period, Result, SeriesSet, Snapshot,
};

pub const SWING_HIGH: PatternId = PatternId("SWING_HIGH");
pub const SWING_LOW: PatternId = PatternId("SWING_LOW");

impl_with_defaults!(SwingDetector);

// ============================================================
// TYPES
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwingKind {
    High,
    Low,
}

impl SwingKind {
    /// Strict dominance: ties never count
    #[inline]
    fn beats(self, candidate: f64, other: f64) -> bool {
        match self {
            SwingKind::High => candidate > other,
            SwingKind::Low => candidate < other,
        }
    }
}

/// Position of a swing relative to the previous swing of the same kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwingClass {
    HigherHigh,
    LowerHigh,
    HigherLow,
    LowerLow,
    /// First swing of its kind, nothing to compare against
    #[default]
    Unclassified,
}

impl SwingClass {
    pub fn label(self) -> &'static str {
        match self {
            SwingClass::HigherHigh => "higher high",
            SwingClass::LowerHigh => "lower high",
            SwingClass::HigherLow => "higher low",
            SwingClass::LowerLow => "lower low",
            SwingClass::Unclassified => "unclassified",
        }
    }

    /// Higher highs and higher lows lean bullish, lower ones bearish
    pub fn direction(self) -> Direction {
        match self {
            SwingClass::HigherHigh | SwingClass::HigherLow => Direction::Bullish,
            SwingClass::LowerHigh | SwingClass::LowerLow => Direction::Bearish,
            SwingClass::Unclassified => Direction::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwingPoint {
    pub index: usize,
    /// Value of the scanned (possibly smoothed) series at `index`
    pub price: f64,
    pub kind: SwingKind,
    pub class: SwingClass,
}

/// How the extremum scan is evaluated. Both strategies flag exactly the same positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStrategy {
    /// Compare every candidate against its full window, O(n * (lookback + lookahead))
    #[default]
    Direct,
    /// Rolling extrema via monotonic deques, O(n)
    Monotonic,
}

// ============================================================
// EXTREMUM SCAN
// ============================================================

/// Flags strict swing highs. Windows containing a non-finite value are skipped.
pub fn swing_highs(values: &[f64], lookback: usize, lookahead: usize) -> Vec<bool> {
    scan_direct(values, lookback, lookahead, SwingKind::High)
}

/// Flags strict swing lows, see [`swing_highs`].
pub fn swing_lows(values: &[f64], lookback: usize, lookahead: usize) -> Vec<bool> {
    scan_direct(values, lookback, lookahead, SwingKind::Low)
}

/// [`swing_highs`] evaluated with rolling maxima.
pub fn swing_highs_monotonic(values: &[f64], lookback: usize, lookahead: usize) -> Vec<bool> {
    scan_monotonic(values, lookback, lookahead, SwingKind::High)
}

/// [`swing_lows`] evaluated with rolling minima.
pub fn swing_lows_monotonic(values: &[f64], lookback: usize, lookahead: usize) -> Vec<bool> {
    scan_monotonic(values, lookback, lookahead, SwingKind::Low)
}

fn scan_direct(values: &[f64], lookback: usize, lookahead: usize, kind: SwingKind) -> Vec<bool> {
    let n = values.len();
    let mut flags = vec![false; n];
    if n <= lookback + lookahead {
        return flags;
    }

    for i in lookback..n - lookahead {
        if !all_finite(&values[i - lookback..=i + lookahead]) {
            trace!(index = i, "skipping swing candidate with non-finite window");
            continue;
        }
        let candidate = values[i];
        flags[i] = values[i - lookback..i]
            .iter()
            .chain(&values[i + 1..=i + lookahead])
            .all(|&other| kind.beats(candidate, other));
    }
    flags
}

fn scan_monotonic(values: &[f64], lookback: usize, lookahead: usize, kind: SwingKind) -> Vec<bool> {
    let n = values.len();
    let mut flags = vec![false; n];
    if n <= lookback + lookahead {
        return flags;
    }

    let prefix = non_finite_prefix(values);
    let (left, right) = match kind {
        SwingKind::High => (rolling_max(values, lookback), rolling_max(values, lookahead)),
        SwingKind::Low => (rolling_min(values, lookback), rolling_min(values, lookahead)),
    };

    for i in lookback..n - lookahead {
        if !window_is_finite(&prefix, i - lookback, i + lookahead) {
            trace!(index = i, "skipping swing candidate with non-finite window");
            continue;
        }
        let candidate = values[i];
        // left[i - 1] covers [i - lookback, i), right[i + lookahead] covers (i, i + lookahead]
        let left_ok = lookback == 0 || kind.beats(candidate, left[i - 1]);
        let right_ok = lookahead == 0 || kind.beats(candidate, right[i + lookahead]);
        flags[i] = left_ok && right_ok;
    }
    flags
}

// ============================================================
// CLASSIFICATION
// ============================================================

/// Walk flagged positions in index order and classify each swing against
/// the previous swing of the same kind. Highs and lows keep independent
/// state; at a shared index the high is emitted first.
pub fn classify_swings(
    high: &[f64],
    low: &[f64],
    high_flags: &[bool],
    low_flags: &[bool],
) -> Vec<SwingPoint> {
    let n = high_flags.len().max(low_flags.len());
    let mut last_high: Option<f64> = None;
    let mut last_low: Option<f64> = None;
    let mut points = Vec::new();

    for index in 0..n {
        if high_flags.get(index).copied().unwrap_or(false) {
            if let Some(&price) = high.get(index) {
                let class = match last_high {
                    Some(prev) if price > prev => SwingClass::HigherHigh,
                    Some(_) => SwingClass::LowerHigh,
                    None => SwingClass::Unclassified,
                };
                last_high = Some(price);
                points.push(SwingPoint {
                    index,
                    price,
                    kind: SwingKind::High,
                    class,
                });
            }
        }

        if low_flags.get(index).copied().unwrap_or(false) {
            if let Some(&price) = low.get(index) {
                let class = match last_low {
                    Some(prev) if price < prev => SwingClass::LowerLow,
                    Some(_) => SwingClass::HigherLow,
                    None => SwingClass::Unclassified,
                };
                last_low = Some(price);
                points.push(SwingPoint {
                    index,
                    price,
                    kind: SwingKind::Low,
                    class,
                });
            }
        }
    }
    points
}

// ============================================================
// DETECTOR
// ============================================================

/// Swing highs on `high_key` and swing lows on `low_key`.
///
/// Both series are optionally smoothed first; classification and the
/// reported `price` use the scanned values, the raw input is kept as `raw`.
#[derive(Debug, Clone, Copy)]
pub struct SwingDetector {
    pub high_key: &'static str,
    pub low_key: &'static str,
    pub lookback: Period,
    pub lookahead: Period,
    pub smooth_length: Option<Period>,
    pub strategy: ScanStrategy,
}

impl Default for SwingDetector {
    fn default() -> Self {
        Self {
            high_key: "high",
            low_key: "low",
            lookback: Period::new_const(DEFAULT_LOOKBACK),
            lookahead: Period::new_const(DEFAULT_LOOKAHEAD),
            smooth_length: Some(Period::new_const(DEFAULT_SMOOTH_LENGTH)),
            strategy: ScanStrategy::Direct,
        }
    }
}

impl SwingDetector {
    /// Raw-series detector with explicit windows
    pub fn unsmoothed(lookback: usize, lookahead: usize) -> Result<Self> {
        Ok(Self {
            lookback: Period::new(lookback)?,
            lookahead: Period::new(lookahead)?,
            smooth_length: None,
            ..Self::default()
        })
    }

    pub fn with_strategy(mut self, strategy: ScanStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Smoothed copies of the inputs, or the inputs themselves
    fn scanned<'a>(&self, values: &'a [f64]) -> Cow<'a, [f64]> {
        match self.smooth_length {
            Some(length) => Cow::Owned(super_smoother(values, length)),
            None => Cow::Borrowed(values),
        }
    }

    fn flags(&self, values: &[f64], kind: SwingKind) -> Vec<bool> {
        let (lookback, lookahead) = (self.lookback.get(), self.lookahead.get());
        match self.strategy {
            ScanStrategy::Direct => scan_direct(values, lookback, lookahead, kind),
            ScanStrategy::Monotonic => scan_monotonic(values, lookback, lookahead, kind),
        }
    }

    /// Classified swing points over `high`/`low`. Either may be empty.
    pub fn find_swings(&self, high: &[f64], low: &[f64]) -> Vec<SwingPoint> {
        let high = self.scanned(high);
        let low = self.scanned(low);
        let high_flags = self.flags(&high, SwingKind::High);
        let low_flags = self.flags(&low, SwingKind::Low);
        classify_swings(&high, &low, &high_flags, &low_flags)
    }
}

impl PatternDetector for SwingDetector {
    fn id(&self) -> PatternId {
        PatternId("SWING")
    }

    fn min_len(&self) -> usize {
        self.lookback.get() + self.lookahead.get() + 1
    }

    fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch> {
        let high = series.get(self.high_key).unwrap_or(&[]);
        let low = series.get(self.low_key).unwrap_or(&[]);

        self.find_swings(high, low)
            .into_iter()
            .map(|point| {
                let (pattern_id, raw) = match point.kind {
                    SwingKind::High => (SWING_HIGH, high[point.index]),
                    SwingKind::Low => (SWING_LOW, low[point.index]),
                };
                let mut values = Snapshot::new().with("price", point.price);
                if self.smooth_length.is_some() {
                    values = values.with("raw", raw);
                }
                PatternMatch {
                    pattern_id,
                    direction: point.class.direction(),
                    index: point.index,
                    classification: Classification::Swing(point.class),
                    values,
                }
            })
            .collect()
    }

    fn metadata(&self) -> PatternMetadata {
        PatternMetadata {
            name: "Swing High / Swing Low",
            description: "Strict local extrema classified as higher/lower highs and lows",
            category: PatternCategory::Structure,
        }
    }
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATIONS
// ============================================================

static SWING_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 5.0, (2.0, 20.0, 1.0), "Bars before a swing that it must exceed"),
    ParamMeta::period("lookahead", 5.0, (2.0, 20.0, 1.0), "Bars after a swing that it must exceed"),
    ParamMeta::period("smooth_length", 10.0, (2.0, 40.0, 2.0), "Super smoother length"),
];

impl ParameterizedDetector for SwingDetector {
    fn param_meta() -> &'static [ParamMeta] {
        SWING_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            lookback: period_param(params, "lookback", DEFAULT_LOOKBACK)?,
            lookahead: period_param(params, "lookahead", DEFAULT_LOOKAHEAD)?,
            smooth_length: Some(period_param(params, "smooth_length", DEFAULT_SMOOTH_LENGTH)?),
            ..Self::default()
        })
    }
}
