//! Oscillator crossover detection
//!
//! Finds the most recent crossover of a fast line over a slow line (or of a
//! single line over a fixed level) inside a short recent window. Offsets are
//! walked from the latest bar backwards, so the first hit is the newest.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::helpers::DEFAULT_CROSS_WINDOW;
use crate::config::ZoneLevels;
use crate::params::{level_param, period_param, ParamMeta, ParameterizedDetector};
use crate::{
    Classification, Direction, PatternCategory, PatternDetector, PatternError, PatternId,
    PatternMatch, PatternMetadata, Period, Result, SeriesSet, Snapshot, Zone,
};

pub const STOCH_BULLISH_CROSS: PatternId = PatternId("STOCH_BULLISH_CROSS");
pub const STOCH_BEARISH_CROSS: PatternId = PatternId("STOCH_BEARISH_CROSS");
pub const MACD_BULLISH_CROSS: PatternId = PatternId("MACD_BULLISH_CROSS");
pub const MACD_BEARISH_CROSS: PatternId = PatternId("MACD_BEARISH_CROSS");
pub const MACD_ZERO_BULLISH: PatternId = PatternId("MACD_ZERO_BULLISH");
pub const MACD_ZERO_BEARISH: PatternId = PatternId("MACD_ZERO_BEARISH");
pub const DI_BULLISH_CROSS: PatternId = PatternId("DI_BULLISH_CROSS");
pub const DI_BEARISH_CROSS: PatternId = PatternId("DI_BEARISH_CROSS");

impl_with_defaults!(LevelCrossDetector);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrossDirection {
    /// Fast at or below slow, then strictly above
    Bullish,
    /// Fast at or above slow, then strictly below
    Bearish,
}

impl CrossDirection {
    #[inline]
    fn crossed(self, fast_before: f64, slow_before: f64, fast_after: f64, slow_after: f64) -> bool {
        match self {
            CrossDirection::Bullish => fast_before <= slow_before && fast_after > slow_after,
            CrossDirection::Bearish => fast_before >= slow_before && fast_after < slow_after,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            CrossDirection::Bullish => Direction::Bullish,
            CrossDirection::Bearish => Direction::Bearish,
        }
    }
}

/// A crossover found in the recent window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Crossover {
    /// Scan offset `i`: the pre-cross bar is `len - 1 - i`
    pub offset: usize,
    /// Index of the post-cross bar
    pub index: usize,
    /// Bars between the post-cross bar and the latest bar
    pub periods_ago: usize,
    pub fast: f64,
    pub slow: f64,
    /// Whether either line was in the zone at the post-cross bar
    pub in_zone: bool,
}

// ============================================================
// SCAN
// ============================================================

fn check_aligned(fast: &[f64], slow: &[f64]) -> Result<()> {
    if fast.len() != slow.len() {
        return Err(PatternError::MisalignedSeries {
            name: "slow".to_string(),
            expected: fast.len(),
            got: slow.len(),
        });
    }
    Ok(())
}

/// Most recent crossover of `fast` over `slow` in the last `window` bars.
///
/// Offsets `1..window` are examined (window capped at `len - 1`); offsets
/// with a NaN on either side are skipped. Series shorter than two values
/// have no crossover. Mismatched lengths are a caller error.
pub fn find_crossover(
    fast: &[f64],
    slow: &[f64],
    window: usize,
    direction: CrossDirection,
    zone: Option<Zone>,
) -> Result<Option<Crossover>> {
    check_aligned(fast, slow)?;
    Ok(crossings(fast.len(), window, direction, zone, |i| (fast[i], slow[i])).next())
}

/// Every crossover in the window, newest first. See [`find_crossover`].
pub fn find_crossovers(
    fast: &[f64],
    slow: &[f64],
    window: usize,
    direction: CrossDirection,
    zone: Option<Zone>,
) -> Result<Vec<Crossover>> {
    check_aligned(fast, slow)?;
    Ok(crossings(fast.len(), window, direction, zone, |i| (fast[i], slow[i])).collect())
}

/// Most recent crossing of `values` over a fixed `level`.
pub fn find_level_cross(
    values: &[f64],
    level: f64,
    window: usize,
    direction: CrossDirection,
) -> Option<Crossover> {
    crossings(values.len(), window, direction, None, |i| (values[i], level)).next()
}

/// Stochastic %K over %D in the last five bars, flagged when either line is oversold.
pub fn stochastic_bullish_crossover(k: &[f64], d: &[f64]) -> Result<Option<Crossover>> {
    find_crossover(
        k,
        d,
        DEFAULT_CROSS_WINDOW,
        CrossDirection::Bullish,
        Some(ZoneLevels::STOCHASTIC.oversold_zone()),
    )
}

fn crossings<F>(
    len: usize,
    window: usize,
    direction: CrossDirection,
    zone: Option<Zone>,
    at: F,
) -> impl Iterator<Item = Crossover>
where
    F: Fn(usize) -> (f64, f64),
{
    let window = if len < 2 { 1 } else { window.min(len - 1) };

    (1..window).filter_map(move |offset| {
        let before = len - 1 - offset;
        let (fast_before, slow_before) = at(before);
        let (fast_after, slow_after) = at(before + 1);

        if fast_before.is_nan() || slow_before.is_nan() || fast_after.is_nan() || slow_after.is_nan() {
            trace!(offset, "skipping crossover offset with missing values");
            return None;
        }

        direction
            .crossed(fast_before, slow_before, fast_after, slow_after)
            .then(|| Crossover {
                offset,
                index: before + 1,
                periods_ago: offset - 1,
                fast: fast_after,
                slow: slow_after,
                in_zone: zone.is_some_and(|z| z.contains_either(fast_after, slow_after)),
            })
    })
}

// ============================================================
// DETECTORS
// ============================================================

/// Which crossovers in the window a detector reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossReport {
    /// Only the newest crossover
    #[default]
    Latest,
    /// Every crossover, left to the aggregator's cap
    All,
}

/// Fast/slow line crossover (stochastic %K/%D, MACD line/signal, +DI/-DI)
#[derive(Debug, Clone, Copy)]
pub struct CrossoverDetector {
    pub pattern_id: PatternId,
    pub fast_key: &'static str,
    pub slow_key: &'static str,
    pub window: Period,
    pub direction: CrossDirection,
    pub zone: Option<Zone>,
    pub report: CrossReport,
    /// Extra column read at the crossover bar, e.g. ADX for the DI lines
    pub context_key: Option<&'static str>,
}

impl Default for CrossoverDetector {
    fn default() -> Self {
        Self::stochastic_bullish()
    }
}

impl CrossoverDetector {
    pub fn stochastic_bullish() -> Self {
        Self {
            pattern_id: STOCH_BULLISH_CROSS,
            fast_key: "stoch_k",
            slow_key: "stoch_d",
            window: Period::new_const(DEFAULT_CROSS_WINDOW),
            direction: CrossDirection::Bullish,
            zone: Some(ZoneLevels::STOCHASTIC.oversold_zone()),
            report: CrossReport::Latest,
            context_key: None,
        }
    }

    pub fn stochastic_bearish() -> Self {
        Self {
            pattern_id: STOCH_BEARISH_CROSS,
            direction: CrossDirection::Bearish,
            zone: Some(ZoneLevels::STOCHASTIC.overbought_zone()),
            ..Self::stochastic_bullish()
        }
    }

    pub fn macd_bullish() -> Self {
        Self {
            pattern_id: MACD_BULLISH_CROSS,
            fast_key: "macd_line",
            slow_key: "macd_signal",
            window: Period::new_const(DEFAULT_CROSS_WINDOW),
            direction: CrossDirection::Bullish,
            zone: None,
            report: CrossReport::All,
            context_key: None,
        }
    }

    pub fn macd_bearish() -> Self {
        Self {
            pattern_id: MACD_BEARISH_CROSS,
            direction: CrossDirection::Bearish,
            ..Self::macd_bullish()
        }
    }

    /// +DI crossing above -DI, reported with the ADX reading at the cross
    pub fn di_bullish() -> Self {
        Self {
            pattern_id: DI_BULLISH_CROSS,
            fast_key: "plus_di",
            slow_key: "minus_di",
            context_key: Some("adx"),
            ..Self::macd_bullish()
        }
    }

    pub fn di_bearish() -> Self {
        Self {
            pattern_id: DI_BEARISH_CROSS,
            direction: CrossDirection::Bearish,
            ..Self::di_bullish()
        }
    }

    /// Take the zone from oscillator levels: oversold for bullish crosses,
    /// overbought for bearish ones. Detectors without a zone are unchanged.
    pub fn with_levels(mut self, levels: ZoneLevels) -> Self {
        if self.zone.is_some() {
            self.zone = Some(match self.direction {
                CrossDirection::Bullish => levels.oversold_zone(),
                CrossDirection::Bearish => levels.overbought_zone(),
            });
        }
        self
    }

    fn to_match(&self, cross: &Crossover, series: &SeriesSet<'_>) -> PatternMatch {
        let classification = match self.zone {
            Some(_) => Classification::Zone {
                in_zone: cross.in_zone,
            },
            None => Classification::None,
        };

        let mut values = Snapshot::new()
            .with(self.fast_key, cross.fast)
            .with(self.slow_key, cross.slow);
        if let Some(key) = self.context_key {
            if let Some(&context) = series.get(key).and_then(|c| c.get(cross.index)) {
                values = values.with(key, context);
            }
        }

        PatternMatch {
            pattern_id: self.pattern_id,
            direction: self.direction.direction(),
            index: cross.index,
            classification,
            values,
        }
    }
}

impl PatternDetector for CrossoverDetector {
    fn id(&self) -> PatternId {
        self.pattern_id
    }

    fn min_len(&self) -> usize {
        2
    }

    fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch> {
        let (Some(fast), Some(slow)) = (series.get(self.fast_key), series.get(self.slow_key)) else {
            return Vec::new();
        };
        // SeriesSet keeps columns aligned, so the length check cannot fail here
        let Ok(found) = find_crossovers(fast, slow, self.window.get(), self.direction, self.zone)
        else {
            return Vec::new();
        };

        let keep = match self.report {
            CrossReport::Latest => 1,
            CrossReport::All => found.len(),
        };
        found
            .iter()
            .take(keep)
            .map(|cross| self.to_match(cross, series))
            .collect()
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
        if let Some(zone) = self.zone {
            zone.validate()?;
        }
        Ok(())
    }

    fn metadata(&self) -> PatternMetadata {
        PatternMetadata {
            name: self.pattern_id.as_str(),
            description: "Fast/slow line crossovers in the recent window",
            category: PatternCategory::Crossover,
        }
    }
}

/// Single line crossing a fixed level in either direction (MACD zero line).
///
/// Reports the most recent bullish and the most recent bearish crossing.
#[derive(Debug, Clone, Copy)]
pub struct LevelCrossDetector {
    pub bullish_id: PatternId,
    pub bearish_id: PatternId,
    pub key: &'static str,
    pub level: f64,
    pub window: Period,
}

impl Default for LevelCrossDetector {
    fn default() -> Self {
        Self {
            bullish_id: MACD_ZERO_BULLISH,
            bearish_id: MACD_ZERO_BEARISH,
            key: "macd_line",
            level: 0.0,
            window: Period::new_const(DEFAULT_CROSS_WINDOW),
        }
    }
}

impl PatternDetector for LevelCrossDetector {
    fn id(&self) -> PatternId {
        self.bullish_id
    }

    fn min_len(&self) -> usize {
        2
    }

    fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch> {
        let Some(values) = series.get(self.key) else {
            return Vec::new();
        };

        [
            (CrossDirection::Bullish, self.bullish_id),
            (CrossDirection::Bearish, self.bearish_id),
        ]
        .into_iter()
        .filter_map(|(direction, pattern_id)| {
            let cross = find_level_cross(values, self.level, self.window.get(), direction)?;
            Some(PatternMatch {
                pattern_id,
                direction: direction.direction(),
                index: cross.index,
                classification: Classification::None,
                values: Snapshot::new().with(self.key, cross.fast),
            })
        })
        .collect()
    }

    fn validate_config(&self) -> Result<()> {
        crate::Threshold::new(self.level)?;
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
            name: "Level Crossover",
            description: "Line crossing a fixed level, such as the MACD zero line",
            category: PatternCategory::Crossover,
        }
    }
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATIONS
// ============================================================

static STOCH_CROSS_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 5.0, (2.0, 10.0, 1.0), "Recent bars searched for a crossover"),
    ParamMeta::level("oversold", 30.0, (10.0, 40.0, 5.0), "Oversold level for either line"),
];

impl ParameterizedDetector for CrossoverDetector {
    fn param_meta() -> &'static [ParamMeta] {
        STOCH_CROSS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            window: period_param(params, "window", DEFAULT_CROSS_WINDOW)?,
            zone: Some(Zone::Below(
                level_param(params, "oversold", ZoneLevels::STOCHASTIC.oversold)?.get(),
            )),
            ..Self::stochastic_bullish()
        })
    }
}
