//! Price/oscillator divergence
//!
//! Price pushing to a new extreme (or moving over a short span) while the
//! oscillator fails to follow. Evaluated at the latest period only.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::helpers::{all_finite, MIN_OSCILLATOR_HISTORY};
use crate::{
    Classification, Direction, PatternCategory, PatternDetector, PatternError, PatternId,
    PatternMatch, PatternMetadata, Period, Result, SeriesSet, Snapshot,
};

pub const RSI_BULLISH_DIVERGENCE: PatternId = PatternId("RSI_BULLISH_DIVERGENCE");
pub const RSI_BEARISH_DIVERGENCE: PatternId = PatternId("RSI_BEARISH_DIVERGENCE");
pub const STOCH_BULLISH_DIVERGENCE: PatternId = PatternId("STOCH_BULLISH_DIVERGENCE");
pub const STOCH_BEARISH_DIVERGENCE: PatternId = PatternId("STOCH_BEARISH_DIVERGENCE");
pub const MACD_BULLISH_DIVERGENCE: PatternId = PatternId("MACD_BULLISH_DIVERGENCE");
pub const MACD_BEARISH_DIVERGENCE: PatternId = PatternId("MACD_BEARISH_DIVERGENCE");

/// Bars compared by the new-extreme method (the latest bar plus the ones before it)
pub const DEFAULT_EXTREME_LOOKBACK: usize = 14;
/// Distance back to the reference bar of the short-term method
pub const DEFAULT_SHORT_TERM_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergenceMethod {
    /// The latest price breaks below the previous `lookback - 1` lows (or above
    /// the highs) while the oscillator does not make the same break
    NewExtreme,
    /// Price and oscillator move in opposite directions between the bar
    /// `lookback - 1` periods back and the latest bar
    ShortTerm,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Divergence {
    pub direction: Direction,
    /// Latest bar, where the divergence is judged
    pub index: usize,
    pub price: f64,
    pub indicator: f64,
}

/// Divergence between `price` and `indicator` at their last index.
///
/// Needs at least `lookback` values (and `lookback >= 2`); any non-finite
/// value among those compared means no divergence.
pub fn find_divergence(
    price: &[f64],
    indicator: &[f64],
    lookback: usize,
    method: DivergenceMethod,
) -> Result<Option<Divergence>> {
    if price.len() != indicator.len() {
        return Err(PatternError::MisalignedSeries {
            name: "indicator".to_string(),
            expected: price.len(),
            got: indicator.len(),
        });
    }
    let len = price.len();
    if lookback < 2 || len < lookback {
        return Ok(None);
    }

    let start = len - lookback;
    let (p, ind) = (&price[start..], &indicator[start..]);
    if !all_finite(p) || !all_finite(ind) {
        trace!(start, "skipping divergence window with non-finite values");
        return Ok(None);
    }
    let (p_last, i_last) = (p[lookback - 1], ind[lookback - 1]);

    let direction = match method {
        DivergenceMethod::NewExtreme => {
            let prior = ..lookback - 1;
            let lower_low = |v: &[f64], last: f64| v[prior].iter().all(|&x| last < x);
            let higher_high = |v: &[f64], last: f64| v[prior].iter().all(|&x| last > x);

            if lower_low(p, p_last) && !lower_low(ind, i_last) {
                Direction::Bullish
            } else if higher_high(p, p_last) && !higher_high(ind, i_last) {
                Direction::Bearish
            } else {
                return Ok(None);
            }
        }
        DivergenceMethod::ShortTerm => {
            let (p_ref, i_ref) = (p[0], ind[0]);
            if p_last < p_ref && i_last > i_ref {
                Direction::Bullish
            } else if p_last > p_ref && i_last < i_ref {
                Direction::Bearish
            } else {
                return Ok(None);
            }
        }
    };

    Ok(Some(Divergence {
        direction,
        index: len - 1,
        price: p_last,
        indicator: i_last,
    }))
}

/// Divergence of one oscillator against a price column
#[derive(Debug, Clone, Copy)]
pub struct DivergenceDetector {
    pub bullish_id: PatternId,
    pub bearish_id: PatternId,
    pub price_key: &'static str,
    pub indicator_key: &'static str,
    pub method: DivergenceMethod,
    pub lookback: Period,
}

impl DivergenceDetector {
    /// Close making a new 14-bar low/high that RSI does not confirm
    pub fn rsi() -> Self {
        Self {
            bullish_id: RSI_BULLISH_DIVERGENCE,
            bearish_id: RSI_BEARISH_DIVERGENCE,
            price_key: "close",
            indicator_key: "rsi",
            method: DivergenceMethod::NewExtreme,
            lookback: Period::new_const(DEFAULT_EXTREME_LOOKBACK),
        }
    }

    pub fn stochastic() -> Self {
        Self {
            bullish_id: STOCH_BULLISH_DIVERGENCE,
            bearish_id: STOCH_BEARISH_DIVERGENCE,
            indicator_key: "stoch_k",
            method: DivergenceMethod::ShortTerm,
            lookback: Period::new_const(DEFAULT_SHORT_TERM_LOOKBACK),
            ..Self::rsi()
        }
    }

    pub fn macd() -> Self {
        Self {
            bullish_id: MACD_BULLISH_DIVERGENCE,
            bearish_id: MACD_BEARISH_DIVERGENCE,
            indicator_key: "macd_line",
            ..Self::stochastic()
        }
    }
}

impl PatternDetector for DivergenceDetector {
    fn id(&self) -> PatternId {
        self.bullish_id
    }

    fn min_len(&self) -> usize {
        self.lookback.get().max(MIN_OSCILLATOR_HISTORY)
    }

    fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch> {
        let (Some(price), Some(indicator)) =
            (series.get(self.price_key), series.get(self.indicator_key))
        else {
            return Vec::new();
        };
        let Ok(Some(divergence)) =
            find_divergence(price, indicator, self.lookback.get(), self.method)
        else {
            return Vec::new();
        };

        let pattern_id = match divergence.direction {
            Direction::Bearish => self.bearish_id,
            _ => self.bullish_id,
        };
        vec![PatternMatch {
            pattern_id,
            direction: divergence.direction,
            index: divergence.index,
            classification: Classification::None,
            values: Snapshot::new()
                .with(self.price_key, divergence.price)
                .with(self.indicator_key, divergence.indicator),
        }]
    }

    fn validate_config(&self) -> Result<()> {
        if self.lookback.get() < 2 {
            return Err(PatternError::OutOfRange {
                field: "lookback",
                value: self.lookback.get() as f64,
                min: 2.0,
                max: f64::INFINITY,
            });
        }
        Ok(())
    }

    fn metadata(&self) -> PatternMetadata {
        PatternMetadata {
            name: self.bullish_id.as_str(),
            description: "Price and oscillator disagreeing at the latest period",
            category: PatternCategory::Divergence,
        }
    }
}
