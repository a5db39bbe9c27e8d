//! Double bottoms and tops in an oscillator
//!
//! A W-bottom is two similar troughs below a threshold with a clearly higher
//! peak between them; an M-top mirrors it above the threshold. Troughs and
//! peaks are two-bar pivots: strictly beyond the values two positions away
//! on either side.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::helpers::{all_finite, tail, DEFAULT_RECENT_WINDOW, MIN_OSCILLATOR_HISTORY};
use crate::{
    Classification, Direction, PatternCategory, PatternDetector, PatternError, PatternId,
    PatternMatch, PatternMetadata, Period, Result, SeriesSet, Snapshot, Threshold,
};

pub const RSI_W_BOTTOM: PatternId = PatternId("RSI_W_BOTTOM");
pub const RSI_M_TOP: PatternId = PatternId("RSI_M_TOP");

/// Minimum distance between the two extremes
pub const DOUBLE_MIN_SEPARATION: usize = 5;
/// Second extremes are searched below `first + DOUBLE_MAX_SPAN`
pub const DOUBLE_MAX_SPAN: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoubleKind {
    Bottom,
    Top,
}

impl DoubleKind {
    #[inline]
    fn beyond(self, value: f64, other: f64) -> bool {
        match self {
            DoubleKind::Bottom => value < other,
            DoubleKind::Top => value > other,
        }
    }
}

/// Shape limits of one double pattern
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoubleShape {
    pub kind: DoubleKind,
    /// Both extremes must lie beyond this level
    pub threshold: f64,
    /// Largest allowed difference between the two extremes
    pub similarity: f64,
    /// The middle extreme must be beyond `ratio * mean(first, second)`,
    /// above it for bottoms and below it for tops
    pub intermediate_ratio: f64,
}

impl DoubleShape {
    pub const W_BOTTOM: Self = Self {
        kind: DoubleKind::Bottom,
        threshold: 35.0,
        similarity: 5.0,
        intermediate_ratio: 1.15,
    };

    pub const M_TOP: Self = Self {
        kind: DoubleKind::Top,
        threshold: 65.0,
        similarity: 5.0,
        intermediate_ratio: 0.85,
    };

    fn is_pivot(&self, values: &[f64], i: usize) -> bool {
        if i < 2 || i + 2 >= values.len() {
            return false;
        }
        let v = values[i];
        self.kind.beyond(v, values[i - 2])
            && self.kind.beyond(v, values[i + 2])
            && self.kind.beyond(v, self.threshold)
    }

    fn intermediate(&self, between: &[f64]) -> Option<f64> {
        if between.is_empty() || !all_finite(between) {
            return None;
        }
        let fold = match self.kind {
            DoubleKind::Bottom => f64::max,
            DoubleKind::Top => f64::min,
        };
        between.iter().copied().reduce(fold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DoublePattern {
    pub first: usize,
    pub second: usize,
    pub first_value: f64,
    pub second_value: f64,
    /// Peak between two bottoms, or trough between two tops
    pub intermediate: f64,
}

impl DoublePattern {
    #[inline]
    fn mean(&self) -> f64 {
        (self.first_value + self.second_value) / 2.0
    }
}

/// Double patterns in `values`, ordered by their first extreme.
///
/// Each first extreme pairs with the nearest valid second extreme. When two
/// patterns end within half the minimum separation of each other, only the
/// more extreme one (lower mean for bottoms, higher for tops) is kept.
/// Series shorter than the minimum oscillator history yield nothing.
pub fn find_double_patterns(values: &[f64], shape: DoubleShape) -> Vec<DoublePattern> {
    let n = values.len();
    let mut patterns: Vec<DoublePattern> = Vec::new();
    if n < MIN_OSCILLATOR_HISTORY {
        return patterns;
    }

    for first in 3..n - 3 {
        if !shape.is_pivot(values, first) {
            continue;
        }
        let Some(candidate) = match_second(values, first, shape) else {
            continue;
        };

        match patterns.last().copied() {
            Some(last) if candidate.second < last.second + DOUBLE_MIN_SEPARATION / 2 => {
                if shape.kind.beyond(candidate.mean(), last.mean()) {
                    trace!(first, second = candidate.second, "replacing overlapping double pattern");
                    patterns.pop();
                    patterns.push(candidate);
                }
            }
            _ => patterns.push(candidate),
        }
    }
    patterns
}

fn match_second(values: &[f64], first: usize, shape: DoubleShape) -> Option<DoublePattern> {
    let end = (first + DOUBLE_MAX_SPAN).min(values.len() - 3);

    (first + DOUBLE_MIN_SEPARATION..end).find_map(|second| {
        if !shape.is_pivot(values, second)
            || (values[first] - values[second]).abs() >= shape.similarity
        {
            return None;
        }
        let intermediate = shape.intermediate(&values[first + 1..second])?;
        let bound = (values[first] + values[second]) / 2.0 * shape.intermediate_ratio;
        let clear = match shape.kind {
            DoubleKind::Bottom => intermediate > bound,
            DoubleKind::Top => intermediate < bound,
        };
        clear.then_some(DoublePattern {
            first,
            second,
            first_value: values[first],
            second_value: values[second],
            intermediate,
        })
    })
}

/// RSI W-bottoms or M-tops in the recent window
#[derive(Debug, Clone, Copy)]
pub struct DoublePatternDetector {
    pub pattern_id: PatternId,
    pub key: &'static str,
    pub shape: DoubleShape,
    pub recent: Period,
}

impl DoublePatternDetector {
    pub fn rsi_w_bottom() -> Self {
        Self {
            pattern_id: RSI_W_BOTTOM,
            key: "rsi",
            shape: DoubleShape::W_BOTTOM,
            recent: Period::new_const(DEFAULT_RECENT_WINDOW),
        }
    }

    pub fn rsi_m_top() -> Self {
        Self {
            pattern_id: RSI_M_TOP,
            shape: DoubleShape::M_TOP,
            ..Self::rsi_w_bottom()
        }
    }
}

impl PatternDetector for DoublePatternDetector {
    fn id(&self) -> PatternId {
        self.pattern_id
    }

    fn min_len(&self) -> usize {
        MIN_OSCILLATOR_HISTORY
    }

    fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch> {
        let Some(values) = series.get(self.key) else {
            return Vec::new();
        };
        let (offset, recent) = tail(values, self.recent.get());
        let direction = match self.shape.kind {
            DoubleKind::Bottom => Direction::Bullish,
            DoubleKind::Top => Direction::Bearish,
        };

        find_double_patterns(recent, self.shape)
            .into_iter()
            .map(|p| PatternMatch {
                pattern_id: self.pattern_id,
                direction,
                index: offset + p.second,
                classification: Classification::None,
                values: Snapshot::new()
                    .with("first", p.first_value)
                    .with("second", p.second_value)
                    .with("intermediate", p.intermediate)
                    .with("span", (p.second - p.first) as f64),
            })
            .collect()
    }

    fn validate_config(&self) -> Result<()> {
        Threshold::new(self.shape.threshold)?;
        for (field, value) in [
            ("similarity", self.shape.similarity),
            ("intermediate_ratio", self.shape.intermediate_ratio),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PatternError::OutOfRange {
                    field,
                    value,
                    min: 0.0,
                    max: f64::INFINITY,
                });
            }
        }
        Ok(())
    }

    fn metadata(&self) -> PatternMetadata {
        PatternMetadata {
            name: self.pattern_id.as_str(),
            description: "Two similar oscillator extremes with a clear swing between them",
            category: PatternCategory::Reversal,
        }
    }
}
