//! Pattern aggregation
//!
//! Turns index-based detector matches into presentation-ready events:
//! recency relative to the latest completed period, resolved timestamps,
//! a per-pattern cap and a short description.

use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::trace;

use crate::config::DEFAULT_MAX_EVENTS_PER_PATTERN;
use crate::detectors::SwingClass;
use crate::{Classification, Direction, PatternError, PatternId, PatternMatch, Result, Snapshot};

/// A classified pattern occurrence ready for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternEvent {
    pub pattern_id: PatternId,
    pub direction: Direction,
    pub index: usize,
    /// 0 = most recent completed period
    pub periods_ago: usize,
    pub timestamp: Option<DateTime<Utc>>,
    pub values: Snapshot,
    pub classification: Classification,
    pub description: String,
}

/// Single-use aggregation over one series length.
///
/// The timestamp array, when given, must already exclude any candle that
/// has not closed, so its last entry is the latest completed period.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator<'a> {
    len: usize,
    timestamps: Option<&'a [i64]>,
    cap: usize,
}

impl<'a> Aggregator<'a> {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            timestamps: None,
            cap: DEFAULT_MAX_EVENTS_PER_PATTERN,
        }
    }

    /// Attach epoch-millisecond timestamps, one per period.
    pub fn timestamps(mut self, timestamps: &'a [i64]) -> Result<Self> {
        if timestamps.len() != self.len {
            return Err(PatternError::MisalignedSeries {
                name: "timestamps".to_string(),
                expected: self.len,
                got: timestamps.len(),
            });
        }
        self.timestamps = Some(timestamps);
        Ok(self)
    }

    /// Keep at most `cap` of the most recent events per pattern id
    pub fn cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    /// `None` for indices past the end of the series
    #[inline]
    pub fn periods_ago(&self, index: usize) -> Option<usize> {
        (index < self.len).then(|| self.len - 1 - index)
    }

    pub fn timestamp_at(&self, index: usize) -> Option<DateTime<Utc>> {
        let millis = *self.timestamps?.get(index)?;
        DateTime::<Utc>::from_timestamp_millis(millis)
    }

    /// Events ordered by recency (ties keep detector order), capped per pattern id.
    pub fn aggregate(&self, matches: impl IntoIterator<Item = PatternMatch>) -> Vec<PatternEvent> {
        let mut events: Vec<PatternEvent> = matches
            .into_iter()
            .filter_map(|m| {
                let Some(periods_ago) = self.periods_ago(m.index) else {
                    trace!(
                        pattern = m.pattern_id.as_str(),
                        index = m.index,
                        "dropping out-of-range match"
                    );
                    return None;
                };
                Some(PatternEvent {
                    pattern_id: m.pattern_id,
                    direction: m.direction,
                    index: m.index,
                    periods_ago,
                    timestamp: self.timestamp_at(m.index),
                    values: m.values,
                    classification: m.classification,
                    description: describe(&m, periods_ago),
                })
            })
            .collect();

        events.sort_by_key(|e| e.periods_ago);

        let mut counts: HashMap<PatternId, usize> = HashMap::new();
        events.retain(|e| {
            let count = counts.entry(e.pattern_id).or_insert(0);
            *count += 1;
            *count <= self.cap
        });
        events
    }
}

/// Human-readable summary of a match, e.g.
/// `"Swing high (higher high) 3 periods ago with price=101.2500."`
pub fn describe(m: &PatternMatch, periods_ago: usize) -> String {
    let mut text = humanize(m.pattern_id.as_str());

    match m.classification {
        Classification::Swing(class) if class != SwingClass::Unclassified => {
            let _ = write!(text, " ({})", class.label());
        }
        Classification::Zone { in_zone: true } => text.push_str(" in extreme zone"),
        Classification::Trend(trend) => {
            let _ = write!(text, " ({})", trend.label());
        }
        _ => {}
    }

    match periods_ago {
        0 => text.push_str(" on the latest period"),
        1 => text.push_str(" 1 period ago"),
        n => {
            let _ = write!(text, " {n} periods ago");
        }
    }

    for (i, (name, value)) in m.values.iter().enumerate() {
        text.push_str(if i == 0 { " with " } else { ", " });
        let _ = write!(text, "{name}={value:.4}");
    }
    text.push('.');
    text
}

const ACRONYMS: &[&str] = &["TTM", "MACD", "RSI", "ATR"];

/// `STOCH_BULLISH_CROSS` -> `Stoch bullish cross`, acronyms kept upper-case
fn humanize(id: &str) -> String {
    let words: Vec<String> = id
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            if ACRONYMS.contains(&w) {
                w.to_string()
            } else {
                w.to_lowercase()
            }
        })
        .collect();
    let joined = words.join(" ");

    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => joined,
    }
}
