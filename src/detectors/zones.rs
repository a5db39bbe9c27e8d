//! Threshold zone runs
//!
//! Contiguous stretches where an oscillator stays inside an extreme zone,
//! e.g. RSI below 30 or above 70.

use serde::Serialize;

use super::helpers::{tail, DEFAULT_RECENT_WINDOW};
use crate::{
    Classification, Direction, PatternCategory, PatternDetector, PatternId, PatternMatch,
    PatternMetadata, Period, Result, SeriesSet, Snapshot, Zone,
};

pub const RSI_OVERSOLD: PatternId = PatternId("RSI_OVERSOLD");
pub const RSI_OVERBOUGHT: PatternId = PatternId("RSI_OVERBOUGHT");

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneRun {
    pub start: usize,
    /// Inclusive
    pub end: usize,
    /// Lowest value of a `Below` run, highest of an `Above` run
    pub extreme: f64,
}

impl ZoneRun {
    #[inline]
    pub fn duration(&self) -> usize {
        self.end - self.start + 1
    }
}

/// All maximal runs of consecutive values inside `zone`. NaN ends a run.
pub fn find_zone_runs(values: &[f64], zone: Zone) -> Vec<ZoneRun> {
    let mut runs = Vec::new();
    let mut current: Option<ZoneRun> = None;

    for (i, &value) in values.iter().enumerate() {
        if zone.contains(value) {
            current = Some(match current {
                Some(run) => ZoneRun {
                    end: i,
                    extreme: match zone {
                        Zone::Below(_) => run.extreme.min(value),
                        Zone::Above(_) => run.extreme.max(value),
                    },
                    ..run
                },
                None => ZoneRun {
                    start: i,
                    end: i,
                    extreme: value,
                },
            });
        } else if let Some(run) = current.take() {
            runs.push(run);
        }
    }
    runs.extend(current);
    runs
}

/// Reports the latest zone run inside the recent window
#[derive(Debug, Clone, Copy)]
pub struct ZoneRunDetector {
    pub pattern_id: PatternId,
    pub key: &'static str,
    pub zone: Zone,
    pub recent: Period,
}

impl ZoneRunDetector {
    pub fn rsi_oversold(level: f64) -> Self {
        Self {
            pattern_id: RSI_OVERSOLD,
            key: "rsi",
            zone: Zone::Below(level),
            recent: Period::new_const(DEFAULT_RECENT_WINDOW),
        }
    }

    pub fn rsi_overbought(level: f64) -> Self {
        Self {
            pattern_id: RSI_OVERBOUGHT,
            zone: Zone::Above(level),
            ..Self::rsi_oversold(level)
        }
    }
}

impl PatternDetector for ZoneRunDetector {
    fn id(&self) -> PatternId {
        self.pattern_id
    }

    fn min_len(&self) -> usize {
        1
    }

    fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch> {
        let Some(values) = series.get(self.key) else {
            return Vec::new();
        };
        let (offset, recent) = tail(values, self.recent.get());
        let runs = find_zone_runs(recent, self.zone);
        let Some(latest) = runs.last() else {
            return Vec::new();
        };

        let direction = match self.zone {
            Zone::Below(_) => Direction::Bullish,
            Zone::Above(_) => Direction::Bearish,
        };

        vec![PatternMatch {
            pattern_id: self.pattern_id,
            direction,
            index: offset + latest.end,
            classification: Classification::Zone {
                in_zone: latest.end + 1 == recent.len(),
            },
            values: Snapshot::new()
                .with("extreme", latest.extreme)
                .with("duration", latest.duration() as f64)
                .with("runs", runs.len() as f64),
        }]
    }

    fn validate_config(&self) -> Result<()> {
        self.zone.validate()
    }

    fn metadata(&self) -> PatternMetadata {
        PatternMetadata {
            name: self.pattern_id.as_str(),
            description: "Latest run of an oscillator inside its extreme zone",
            category: PatternCategory::Zone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_zone_runs() {
        let rsi = [45.0, 28.0, 25.0, 31.0, 29.0, f64::NAN, 27.0];
        let runs = find_zone_runs(&rsi, Zone::Below(30.0));
        assert_eq!(runs.len(), 3);
        assert_eq!((runs[0].start, runs[0].end, runs[0].extreme), (1, 2, 25.0));
        assert_eq!(runs[1].duration(), 1);
        assert_eq!(runs[2].start, 6);
    }

    #[test]
    fn test_overbought_extreme_is_max() {
        let rsi = [72.0, 78.0, 74.0];
        let runs = find_zone_runs(&rsi, Zone::Above(70.0));
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].extreme, 78.0);
    }
}
