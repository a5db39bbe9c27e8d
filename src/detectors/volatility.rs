//! Volatility patterns
//!
//! Band squeeze at the latest period, ATR spikes, and the volatility regime:
//! trend over the recent window and the latest reading against its averages.

use tracing::trace;

use super::helpers::{
    finite_mean, tail, DEFAULT_RECENT_WINDOW, DEFAULT_SPIKE_PCT, MIN_OSCILLATOR_HISTORY,
};
use crate::{
    Classification, Direction, PatternCategory, PatternDetector, PatternError, PatternId,
    PatternMatch, PatternMetadata, Period, Result, SeriesSet, Snapshot, Threshold, Trend,
};

pub const TTM_SQUEEZE: PatternId = PatternId("TTM_SQUEEZE");
pub const VOLATILITY_SPIKE: PatternId = PatternId("VOLATILITY_SPIKE");
pub const VOLATILITY_TREND: PatternId = PatternId("VOLATILITY_TREND");
pub const ABOVE_AVERAGE_VOLATILITY: PatternId = PatternId("ABOVE_AVERAGE_VOLATILITY");
pub const HIGH_VOLATILITY: PatternId = PatternId("HIGH_VOLATILITY");
pub const LOW_VOLATILITY: PatternId = PatternId("LOW_VOLATILITY");

impl_with_defaults!(SqueezeDetector, VolatilitySpikeDetector, VolatilityRegimeDetector);

// ============================================================
// SQUEEZE
// ============================================================

fn aligned_len(columns: [(&str, usize); 4]) -> Result<usize> {
    let expected = columns[0].1;
    for (name, got) in columns {
        if got != expected {
            return Err(PatternError::MisalignedSeries {
                name: name.to_string(),
                expected,
                got,
            });
        }
    }
    Ok(expected)
}

#[inline]
fn squeezed_at(iu: &[f64], il: &[f64], ou: &[f64], ol: &[f64], i: usize) -> bool {
    // comparisons against NaN are false, so missing values never squeeze
    iu[i] <= ou[i] && il[i] >= ol[i]
}

/// Whether the inner band sits fully inside the outer band at the last index.
///
/// Only the final period is inspected. Empty input is not a squeeze.
pub fn is_squeeze(
    inner_upper: &[f64],
    inner_lower: &[f64],
    outer_upper: &[f64],
    outer_lower: &[f64],
) -> Result<bool> {
    let len = aligned_len([
        ("inner_upper", inner_upper.len()),
        ("inner_lower", inner_lower.len()),
        ("outer_upper", outer_upper.len()),
        ("outer_lower", outer_lower.len()),
    ])?;
    if len == 0 {
        return Ok(false);
    }
    Ok(squeezed_at(inner_upper, inner_lower, outer_upper, outer_lower, len - 1))
}

/// Per-period squeeze state over the whole history.
pub fn squeeze_flags(
    inner_upper: &[f64],
    inner_lower: &[f64],
    outer_upper: &[f64],
    outer_lower: &[f64],
) -> Result<Vec<bool>> {
    let len = aligned_len([
        ("inner_upper", inner_upper.len()),
        ("inner_lower", inner_lower.len()),
        ("outer_upper", outer_upper.len()),
        ("outer_lower", outer_lower.len()),
    ])?;
    Ok((0..len)
        .map(|i| squeezed_at(inner_upper, inner_lower, outer_upper, outer_lower, i))
        .collect())
}

/// Number of consecutive squeezed periods ending at the last index.
pub fn squeeze_run_length(
    inner_upper: &[f64],
    inner_lower: &[f64],
    outer_upper: &[f64],
    outer_lower: &[f64],
) -> Result<usize> {
    let flags = squeeze_flags(inner_upper, inner_lower, outer_upper, outer_lower)?;
    Ok(flags.iter().rev().take_while(|&&f| f).count())
}

/// Bollinger bands inside Keltner channels at the latest period
#[derive(Debug, Clone, Copy)]
pub struct SqueezeDetector {
    pub inner_upper_key: &'static str,
    pub inner_lower_key: &'static str,
    pub outer_upper_key: &'static str,
    pub outer_lower_key: &'static str,
}

impl Default for SqueezeDetector {
    fn default() -> Self {
        Self {
            inner_upper_key: "bb_upper",
            inner_lower_key: "bb_lower",
            outer_upper_key: "kc_upper",
            outer_lower_key: "kc_lower",
        }
    }
}

impl PatternDetector for SqueezeDetector {
    fn id(&self) -> PatternId {
        TTM_SQUEEZE
    }

    fn min_len(&self) -> usize {
        1
    }

    fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch> {
        let (Some(iu), Some(il), Some(ou), Some(ol)) = (
            series.get(self.inner_upper_key),
            series.get(self.inner_lower_key),
            series.get(self.outer_upper_key),
            series.get(self.outer_lower_key),
        ) else {
            return Vec::new();
        };

        let Ok(run) = squeeze_run_length(iu, il, ou, ol) else {
            return Vec::new();
        };
        if run == 0 {
            return Vec::new();
        }

        let last = iu.len() - 1;
        vec![PatternMatch {
            pattern_id: TTM_SQUEEZE,
            direction: Direction::Neutral,
            index: last,
            classification: Classification::None,
            values: Snapshot::new()
                .with("inner_width", iu[last] - il[last])
                .with("outer_width", ou[last] - ol[last])
                .with("run_length", run as f64),
        }]
    }

    fn metadata(&self) -> PatternMetadata {
        PatternMetadata {
            name: "TTM Squeeze",
            description: "Inner band fully inside the outer band at the latest period",
            category: PatternCategory::Volatility,
        }
    }
}

// ============================================================
// VOLATILITY SPIKE
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spike {
    pub index: usize,
    pub before: f64,
    pub after: f64,
    /// Rise over two periods, in percent
    pub change_pct: f64,
}

/// Positions where `values[i]` exceeds `values[i - 2]` by more than `spike_pct` percent.
///
/// Non-finite values and non-positive bases are skipped.
pub fn find_volatility_spikes(values: &[f64], spike_pct: f64) -> Vec<Spike> {
    let factor = 1.0 + spike_pct / 100.0;
    (2..values.len())
        .filter_map(|i| {
            let (before, after) = (values[i - 2], values[i]);
            if !before.is_finite() || !after.is_finite() || before <= 0.0 {
                trace!(index = i, "skipping volatility value");
                return None;
            }
            (after > before * factor).then(|| Spike {
                index: i,
                before,
                after,
                change_pct: (after / before - 1.0) * 100.0,
            })
        })
        .collect()
}

/// Sudden ATR expansion; every spike in the recent window is reported
#[derive(Debug, Clone, Copy)]
pub struct VolatilitySpikeDetector {
    pub key: &'static str,
    pub spike_pct: Threshold,
    pub recent: Period,
}

impl Default for VolatilitySpikeDetector {
    fn default() -> Self {
        Self {
            key: "atr",
            spike_pct: Threshold::new_const(DEFAULT_SPIKE_PCT),
            recent: Period::new_const(DEFAULT_RECENT_WINDOW),
        }
    }
}

impl PatternDetector for VolatilitySpikeDetector {
    fn id(&self) -> PatternId {
        VOLATILITY_SPIKE
    }

    fn min_len(&self) -> usize {
        3
    }

    fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch> {
        let Some(values) = series.get(self.key) else {
            return Vec::new();
        };
        let (offset, recent) = tail(values, self.recent.get());

        find_volatility_spikes(recent, self.spike_pct.get())
            .into_iter()
            .map(|spike| PatternMatch {
                pattern_id: VOLATILITY_SPIKE,
                direction: Direction::Neutral,
                index: offset + spike.index,
                classification: Classification::None,
                values: Snapshot::new()
                    .with(self.key, spike.after)
                    .with("before", spike.before)
                    .with("change_pct", spike.change_pct),
            })
            .collect()
    }

    fn validate_config(&self) -> Result<()> {
        if self.spike_pct.get() <= 0.0 {
            return Err(PatternError::OutOfRange {
                field: "spike_pct",
                value: self.spike_pct.get(),
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        Ok(())
    }

    fn metadata(&self) -> PatternMetadata {
        PatternMetadata {
            name: "Volatility Spike",
            description: "ATR rising sharply over two periods",
            category: PatternCategory::Volatility,
        }
    }
}

// ============================================================
// VOLATILITY REGIME
// ============================================================

/// Percent change from the first to the last value.
///
/// `None` for fewer than two values, a non-finite endpoint or a non-positive start.
pub fn volatility_change_pct(values: &[f64]) -> Option<f64> {
    let (&start, &end) = (values.first()?, values.last()?);
    if values.len() < 2 || !start.is_finite() || !end.is_finite() || start <= 0.0 {
        return None;
    }
    Some((end / start - 1.0) * 100.0)
}

/// Latest value over the mean of the last `n` values, with that mean.
///
/// `None` when fewer than `n` values exist, the window holds a non-finite
/// value or the mean is not positive.
pub fn ratio_to_mean(values: &[f64], n: usize) -> Option<(f64, f64)> {
    if n == 0 || values.len() < n {
        return None;
    }
    let (_, window) = tail(values, n);
    let mean = finite_mean(window)?;
    let last = *window.last()?;
    (mean > 0.0).then(|| (last / mean, mean))
}

/// Volatility trend and level of one ATR-like series, judged at the latest period.
///
/// Emits up to three events on the last index:
/// - `VOLATILITY_TREND` when the recent window moved at least `trend_pct` percent
/// - `ABOVE_AVERAGE_VOLATILITY` when the latest value beats the recent mean by `above_average_ratio`
/// - `HIGH_VOLATILITY` / `LOW_VOLATILITY` against the mean of the last `long` values
#[derive(Debug, Clone, Copy)]
pub struct VolatilityRegimeDetector {
    pub key: &'static str,
    pub recent: Period,
    pub trend_pct: Threshold,
    pub above_average_ratio: Threshold,
    pub long: Period,
    pub high_ratio: Threshold,
    pub low_ratio: Threshold,
}

impl Default for VolatilityRegimeDetector {
    fn default() -> Self {
        Self {
            key: "atr",
            recent: Period::new_const(DEFAULT_RECENT_WINDOW),
            trend_pct: Threshold::new_const(20.0),
            above_average_ratio: Threshold::new_const(1.2),
            long: Period::new_const(50),
            high_ratio: Threshold::new_const(1.3),
            low_ratio: Threshold::new_const(0.7),
        }
    }
}

impl PatternDetector for VolatilityRegimeDetector {
    fn id(&self) -> PatternId {
        PatternId("VOLATILITY_REGIME")
    }

    fn min_len(&self) -> usize {
        MIN_OSCILLATOR_HISTORY
    }

    fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch> {
        let Some(values) = series.get(self.key) else {
            return Vec::new();
        };
        let Some(&current) = values.last() else {
            return Vec::new();
        };
        let last = values.len() - 1;
        let (_, recent) = tail(values, self.recent.get());
        let mut matches = Vec::new();

        if let Some(change_pct) = volatility_change_pct(recent) {
            if change_pct.abs() >= self.trend_pct.get() {
                let trend = if change_pct > 0.0 {
                    Trend::Increasing
                } else {
                    Trend::Decreasing
                };
                matches.push(PatternMatch {
                    pattern_id: VOLATILITY_TREND,
                    direction: Direction::Neutral,
                    index: last,
                    classification: Classification::Trend(trend),
                    values: Snapshot::new()
                        .with("start", recent[0])
                        .with("end", current)
                        .with("change_pct", change_pct)
                        .with("periods", recent.len() as f64),
                });
            }
        }

        if let Some((ratio, mean)) = ratio_to_mean(recent, recent.len()) {
            if ratio > self.above_average_ratio.get() {
                matches.push(self.level_match(ABOVE_AVERAGE_VOLATILITY, last, current, mean, ratio));
            }
        }

        match ratio_to_mean(values, self.long.get()) {
            Some((ratio, mean)) if ratio > self.high_ratio.get() => {
                matches.push(self.level_match(HIGH_VOLATILITY, last, current, mean, ratio));
            }
            Some((ratio, mean)) if ratio < self.low_ratio.get() => {
                matches.push(self.level_match(LOW_VOLATILITY, last, current, mean, ratio));
            }
            Some(_) => {}
            None => trace!(len = values.len(), "no long-run volatility average"),
        }

        matches
    }

    fn validate_config(&self) -> Result<()> {
        for (field, value) in [
            ("trend_pct", self.trend_pct.get()),
            ("above_average_ratio", self.above_average_ratio.get()),
            ("low_ratio", self.low_ratio.get()),
        ] {
            if value <= 0.0 {
                return Err(PatternError::OutOfRange {
                    field,
                    value,
                    min: 0.0,
                    max: f64::INFINITY,
                });
            }
        }
        if self.high_ratio.get() <= self.low_ratio.get() {
            return Err(PatternError::OutOfRange {
                field: "high_ratio",
                value: self.high_ratio.get(),
                min: self.low_ratio.get(),
                max: f64::INFINITY,
            });
        }
        Ok(())
    }

    fn metadata(&self) -> PatternMetadata {
        PatternMetadata {
            name: "Volatility Regime",
            description: "Volatility trend and latest level against its averages",
            category: PatternCategory::Volatility,
        }
    }
}

impl VolatilityRegimeDetector {
    fn level_match(
        &self,
        pattern_id: PatternId,
        index: usize,
        current: f64,
        mean: f64,
        ratio: f64,
    ) -> PatternMatch {
        PatternMatch {
            pattern_id,
            direction: Direction::Neutral,
            index,
            classification: Classification::None,
            values: Snapshot::new()
                .with(self.key, current)
                .with("average", mean)
                .with("ratio", ratio),
        }
    }
}
