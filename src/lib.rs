//! # swingscan
//!
//! Pattern detection over index-aligned numeric series derived from market candles:
//! swing highs/lows, oscillator crossovers, volatility squeezes and momentum shifts,
//! plus divergences and RSI double patterns.
//!
//! ## Quick Start
//!
//! ```rust
//! use swingscan::prelude::*;
//!
//! let high = [10.0, 11.0, 12.0, 15.0, 12.0, 11.0, 10.0];
//! let low = [9.0, 10.0, 11.0, 14.0, 11.0, 10.0, 9.0];
//!
//! // Every column handed to one scan must share the same length
//! let series = SeriesSet::new().with("high", &high)?.with("low", &low)?;
//!
//! let engine = EngineBuilder::new()
//!     .add(BuiltinDetector::Swing(SwingDetector::unsmoothed(3, 3)?))
//!     .build()?;
//!
//! let events = engine.scan(&series)?;
//! assert_eq!(events[0].pattern_id, SWING_HIGH);
//! assert_eq!(events[0].periods_ago, 3);
//! # Ok::<(), swingscan::PatternError>(())
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod config;
pub mod detectors;
pub mod events;
pub mod params;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::{EngineConfig, Thresholds, ZoneLevels},
        // Detectors
        detectors::*,
        // Aggregation
        events::{describe, Aggregator, PatternEvent},
        // Parameters
        params::{level_param, period_param, sweep, ParamKind, ParamMeta, ParameterizedDetector},
        // Parallel
        scan_parallel,
        // Engine
        BuiltinDetector,
        Classification,
        Columns,
        Direction,
        EngineBuilder,
        // Core traits
        PatternDetector,
        PatternEngine,
        // Errors
        PatternError,
        PatternId,
        PatternMatch,
        Period,
        Result,
        ScanError,
        ScanResult,
        SeriesSet,
        Snapshot,
        Threshold,
        Trend,
        Zone,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors raised at the library boundary.
///
/// A missing pattern is never an error: detectors report absence through
/// `None` or an empty list. Only caller bugs and bad parameters end up here.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Series `{name}` has {got} values, expected {expected}")]
    MisalignedSeries {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Timestamps required but none were supplied")]
    MissingTimestamps,
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Finite threshold level (oscillator cutoff, percentage, band level)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Threshold(f64);

impl Threshold {
    /// Create a new Threshold, rejecting NaN and infinities
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(PatternError::InvalidValue(
                "Threshold cannot be NaN or infinite",
            ));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Serialize for Threshold {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Threshold {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Threshold::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

/// Extreme zone of an oscillator, bounded by a single threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Zone {
    /// Oversold style zone: values strictly below the level
    Below(f64),
    /// Overbought style zone: values strictly above the level
    Above(f64),
}

impl Zone {
    #[inline]
    pub fn level(self) -> f64 {
        match self {
            Zone::Below(level) | Zone::Above(level) => level,
        }
    }

    /// NaN is never inside a zone
    #[inline]
    pub fn contains(self, value: f64) -> bool {
        match self {
            Zone::Below(level) => value < level,
            Zone::Above(level) => value > level,
        }
    }

    /// True when either line of an oscillator pair sits inside the zone
    #[inline]
    pub fn contains_either(self, a: f64, b: f64) -> bool {
        self.contains(a) || self.contains(b)
    }

    pub fn validate(self) -> Result<()> {
        Threshold::new(self.level()).map(|_| ())
    }
}

// ============================================================
// INPUT SERIES
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    /// Candle open time in epoch milliseconds
    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Owned, column-oriented copy of a bar slice
#[derive(Debug, Clone, Default)]
pub struct Columns {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
    /// Present only when every bar carries a timestamp
    pub timestamps: Option<Vec<i64>>,
}

impl Columns {
    pub fn from_bars<T: OHLCV>(bars: &[T]) -> Self {
        let timestamps: Option<Vec<i64>> = bars.iter().map(|b| b.timestamp()).collect();

        Self {
            open: bars.iter().map(|b| b.open()).collect(),
            high: bars.iter().map(|b| b.high()).collect(),
            low: bars.iter().map(|b| b.low()).collect(),
            close: bars.iter().map(|b| b.close()).collect(),
            volume: bars.iter().map(|b| b.volume()).collect(),
            timestamps,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.close.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// Lend the columns out as `open`, `high`, `low`, `close`, `volume`.
    /// Further indicator columns of the same length can be inserted afterwards.
    pub fn series_set(&self) -> SeriesSet<'_> {
        let mut set = SeriesSet::new();
        set.len = Some(self.len());
        for (name, values) in [
            ("open", &self.open),
            ("high", &self.high),
            ("low", &self.low),
            ("close", &self.close),
            ("volume", &self.volume),
        ] {
            set.columns.insert(name, values.as_slice());
        }
        set.timestamps = self.timestamps.as_deref();
        set
    }
}

/// Named, index-aligned series borrowed from the caller for one analysis call.
///
/// The first inserted column fixes the length; any later column or timestamp
/// array of a different length is rejected with [`PatternError::MisalignedSeries`].
#[derive(Debug, Clone, Default)]
pub struct SeriesSet<'a> {
    len: Option<usize>,
    columns: HashMap<&'a str, &'a [f64]>,
    timestamps: Option<&'a [i64]>,
}

impl<'a> SeriesSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`SeriesSet::insert`]
    pub fn with(mut self, name: &'a str, values: &'a [f64]) -> Result<Self> {
        self.insert(name, values)?;
        Ok(self)
    }

    pub fn insert(&mut self, name: &'a str, values: &'a [f64]) -> Result<()> {
        self.check_len(name, values.len())?;
        self.columns.insert(name, values);
        Ok(())
    }

    /// Attach candle timestamps (epoch ms). The caller must already have
    /// dropped any candle that has not closed yet.
    pub fn with_timestamps(mut self, timestamps: &'a [i64]) -> Result<Self> {
        self.check_len("timestamps", timestamps.len())?;
        self.timestamps = Some(timestamps);
        Ok(self)
    }

    fn check_len(&mut self, name: &str, got: usize) -> Result<()> {
        match self.len {
            Some(expected) if expected != got => Err(PatternError::MisalignedSeries {
                name: name.to_string(),
                expected,
                got,
            }),
            Some(_) => Ok(()),
            None => {
                self.len = Some(got);
                Ok(())
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len.unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&'a [f64]> {
        self.columns.get(name).copied()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    #[inline]
    pub fn timestamps(&self) -> Option<&'a [i64]> {
        self.timestamps
    }

    /// Column names in sorted order
    pub fn names(&self) -> Vec<&'a str> {
        let mut names: Vec<&'a str> = self.columns.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

// ============================================================
// PATTERN MATCH - result of detection (Copy, no allocations)
// ============================================================

/// Unique identifier for a pattern type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(pub &'static str);

impl PatternId {
    /// Returns the string identifier
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Returns the typical/expected direction of this pattern.
    ///
    /// - `Some(Direction::Bullish)` - pattern typically signals bullish moves
    /// - `Some(Direction::Bearish)` - pattern typically signals bearish moves
    /// - `Some(Direction::Neutral)` - pattern has no directional bias
    /// - `None` - direction depends on the classification of each occurrence
    pub fn typical_direction(&self) -> Option<Direction> {
        match self.0 {
            "STOCH_BULLISH_CROSS"
            | "MACD_BULLISH_CROSS"
            | "MACD_ZERO_BULLISH"
            | "DI_BULLISH_CROSS"
            | "RSI_OVERSOLD"
            | "RSI_W_BOTTOM"
            | "RSI_BULLISH_DIVERGENCE"
            | "STOCH_BULLISH_DIVERGENCE"
            | "MACD_BULLISH_DIVERGENCE" => Some(Direction::Bullish),
            "STOCH_BEARISH_CROSS"
            | "MACD_BEARISH_CROSS"
            | "MACD_ZERO_BEARISH"
            | "DI_BEARISH_CROSS"
            | "RSI_OVERBOUGHT"
            | "RSI_M_TOP"
            | "RSI_BEARISH_DIVERGENCE"
            | "STOCH_BEARISH_DIVERGENCE"
            | "MACD_BEARISH_DIVERGENCE" => Some(Direction::Bearish),
            "TTM_SQUEEZE" | "VOLATILITY_SPIKE" | "VOLATILITY_TREND" | "ABOVE_AVERAGE_VOLATILITY"
            | "HIGH_VOLATILITY" | "LOW_VOLATILITY" => Some(Direction::Neutral),
            // SWING_HIGH, SWING_LOW, MOMENTUM_SHIFT, SUPERTREND_FLIP and unknown ids
            _ => None,
        }
    }

    /// Returns true if the same pattern can point either way
    pub fn is_bidirectional(&self) -> bool {
        self.typical_direction().is_none()
    }
}

impl Serialize for PatternId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.0)
    }
}

/// Direction/bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

/// Monotonic direction of a short trailing window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Increasing,
    Decreasing,
    #[default]
    Neutral,
}

impl Trend {
    #[inline]
    pub fn is_increasing(self) -> bool {
        matches!(self, Trend::Increasing)
    }

    #[inline]
    pub fn is_decreasing(self) -> bool {
        matches!(self, Trend::Decreasing)
    }

    pub fn label(self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Neutral => "neutral",
        }
    }
}

/// Detector-specific classification attached to a match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Classification {
    Swing(SwingClass),
    /// Whether the oscillator sat in its extreme zone at the detection point
    Zone { in_zone: bool },
    Trend(Trend),
    #[default]
    None,
}

/// Maximum number of readings a [`Snapshot`] holds
pub const SNAPSHOT_CAPACITY: usize = 4;

/// Named numeric readings captured at the detection point.
///
/// Fixed capacity keeps [`PatternMatch`] `Copy`; readings past capacity are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Snapshot {
    readings: [(&'static str, f64); SNAPSHOT_CAPACITY],
    len: usize,
}

impl Snapshot {
    pub const fn new() -> Self {
        Self {
            readings: [("", 0.0); SNAPSHOT_CAPACITY],
            len: 0,
        }
    }

    #[must_use]
    pub fn with(mut self, name: &'static str, value: f64) -> Self {
        if self.len < SNAPSHOT_CAPACITY {
            self.readings[self.len] = (name, value);
            self.len += 1;
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.readings[..self.len].iter().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Serialize for Snapshot {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = s.serialize_map(Some(self.len))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// Result of pattern detection - Copy, no allocations.
///
/// Index based; time context is attached later by [`events::Aggregator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternMatch {
    pub pattern_id: PatternId,
    pub direction: Direction,
    /// Bar index where the pattern completed
    pub index: usize,
    pub classification: Classification,
    pub values: Snapshot,
}

// ============================================================
// PATTERN DETECTOR TRAITS
// ============================================================

/// Family a detector belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternCategory {
    Structure,
    Crossover,
    Volatility,
    Momentum,
    Zone,
    Divergence,
    Reversal,
    Custom,
}

/// Additional metadata about a detector
#[derive(Debug, Clone)]
pub struct PatternMetadata {
    pub name: &'static str,
    pub description: &'static str,
    pub category: PatternCategory,
}

/// Pattern detector over a [`SeriesSet`].
///
/// Detectors are pure: they read the borrowed columns they need and return
/// every match found. A missing column or too little history yields no
/// matches. The trait is object safe, so custom detectors can be boxed.
pub trait PatternDetector: Send + Sync {
    /// Identifies the detector; its matches may carry finer-grained ids
    fn id(&self) -> PatternId;
    fn min_len(&self) -> usize;
    fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    fn metadata(&self) -> PatternMetadata {
        PatternMetadata {
            name: self.id().0,
            description: "",
            category: PatternCategory::Custom,
        }
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - fast path via enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, series)),*
                }
            }

            #[inline]
            pub fn id(&self) -> PatternId {
                match self {
                    $(Self::$variant(d) => PatternDetector::id(d)),*
                }
            }

            #[inline]
            pub fn min_len(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_len(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }

            pub fn metadata(&self) -> PatternMetadata {
                match self {
                    $(Self::$variant(d) => PatternDetector::metadata(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    // Structure
    Swing(SwingDetector),

    // Oscillator crossovers
    Crossover(CrossoverDetector),
    LevelCross(LevelCrossDetector),

    // Volatility
    Squeeze(SqueezeDetector),
    VolatilitySpike(VolatilitySpikeDetector),
    VolatilityRegime(VolatilityRegimeDetector),

    // Momentum
    MomentumShift(MomentumShiftDetector),
    DirectionFlip(DirectionFlipDetector),

    // Threshold zones and oscillator shapes
    ZoneRun(ZoneRunDetector),
    DoublePattern(DoublePatternDetector),

    // Price against oscillator
    Divergence(DivergenceDetector),
}

// ============================================================
// PATTERN ENGINE
// ============================================================

use config::{EngineConfig, ZoneLevels};
use events::{Aggregator, PatternEvent};

/// Main pattern detection engine
pub struct PatternEngine {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn PatternDetector>>,
    config: EngineConfig,
}

impl PatternEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            builtin: Vec::new(),
            custom: Vec::new(),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of registered detectors (builtin and custom)
    #[inline]
    pub fn detector_count(&self) -> usize {
        self.builtin.len() + self.custom.len()
    }

    /// Run every detector and return raw, index-based matches.
    pub fn detect(&self, series: &SeriesSet<'_>) -> Vec<PatternMatch> {
        let len = series.len();
        let mut results = Vec::new();

        // Fast path: builtin detectors (enum dispatch, no vtable)
        for detector in &self.builtin {
            if len >= detector.min_len() {
                results.extend(
                    detector
                        .detect(series)
                        .into_iter()
                        .filter(|m| self.should_include(m)),
                );
            }
        }

        // Slow path: custom detectors (vtable)
        for detector in &self.custom {
            if len >= detector.min_len() {
                results.extend(
                    detector
                        .detect(series)
                        .into_iter()
                        .filter(|m| self.should_include(m)),
                );
            }
        }

        for m in &results {
            debug!(
                pattern = m.pattern_id.as_str(),
                index = m.index,
                direction = ?m.direction,
                "pattern detected"
            );
        }

        results
    }

    /// Detect and aggregate into timestamped, capped events.
    pub fn scan(&self, series: &SeriesSet<'_>) -> Result<Vec<PatternEvent>> {
        let mut aggregator =
            Aggregator::new(series.len()).cap(self.config.max_events_per_pattern);

        match series.timestamps() {
            Some(timestamps) => aggregator = aggregator.timestamps(timestamps)?,
            None if self.config.require_timestamps => {
                return Err(PatternError::MissingTimestamps)
            }
            None => {}
        }

        let events = aggregator.aggregate(self.detect(series));
        debug!(len = series.len(), events = events.len(), "scan complete");
        Ok(events)
    }

    /// Scan and return events grouped by pattern id.
    pub fn scan_grouped(
        &self,
        series: &SeriesSet<'_>,
    ) -> Result<BTreeMap<&'static str, Vec<PatternEvent>>> {
        let mut grouped: BTreeMap<&'static str, Vec<PatternEvent>> = BTreeMap::new();
        for event in self.scan(series)? {
            grouped
                .entry(event.pattern_id.as_str())
                .or_default()
                .push(event);
        }
        Ok(grouped)
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    fn should_include(&self, m: &PatternMatch) -> bool {
        match self.config.pattern_filter {
            Some(ref filter) => filter.iter().any(|id| id == m.pattern_id.as_str()),
            None => true,
        }
    }

    fn validate(&self) -> Result<()> {
        self.config.validate()?;
        for d in &self.builtin {
            d.validate_config()?;
        }
        for d in &self.custom {
            d.validate_config()?;
        }
        Ok(())
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating PatternEngine instances
pub struct EngineBuilder {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn PatternDetector>>,
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            builtin: Vec::new(),
            custom: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    /// Replace the whole configuration. Call before the `with_*_defaults`
    /// methods: the stochastic crossover zones read `thresholds["stoch_k"]`
    /// and the RSI zone runs read `thresholds["rsi"]`.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Add every builtin detector with its default configuration
    pub fn with_all_defaults(self) -> Self {
        self.with_structure_defaults()
            .with_crossover_defaults()
            .with_volatility_defaults()
            .with_momentum_defaults()
            .with_zone_defaults()
            .with_divergence_defaults()
    }

    /// Swing highs/lows on smoothed `high`/`low`
    pub fn with_structure_defaults(mut self) -> Self {
        self.builtin
            .push(BuiltinDetector::Swing(SwingDetector::with_defaults()));
        self
    }

    /// Stochastic crossovers zoned by the configured `stoch_k` levels, MACD
    /// signal and DMI crossovers, MACD zero-line cross
    pub fn with_crossover_defaults(mut self) -> Self {
        let stochastic = self
            .config
            .thresholds
            .get_or("stoch_k", ZoneLevels::STOCHASTIC);
        self.builtin.extend([
            BuiltinDetector::Crossover(
                CrossoverDetector::stochastic_bullish().with_levels(stochastic),
            ),
            BuiltinDetector::Crossover(
                CrossoverDetector::stochastic_bearish().with_levels(stochastic),
            ),
            BuiltinDetector::Crossover(CrossoverDetector::macd_bullish()),
            BuiltinDetector::Crossover(CrossoverDetector::macd_bearish()),
            BuiltinDetector::Crossover(CrossoverDetector::di_bullish()),
            BuiltinDetector::Crossover(CrossoverDetector::di_bearish()),
            BuiltinDetector::LevelCross(LevelCrossDetector::with_defaults()),
        ]);
        self
    }

    /// TTM squeeze, ATR spikes and the ATR volatility regime
    pub fn with_volatility_defaults(mut self) -> Self {
        self.builtin.extend([
            BuiltinDetector::Squeeze(SqueezeDetector::with_defaults()),
            BuiltinDetector::VolatilitySpike(VolatilitySpikeDetector::with_defaults()),
            BuiltinDetector::VolatilityRegime(VolatilityRegimeDetector::with_defaults()),
        ]);
        self
    }

    /// MACD histogram momentum shift and supertrend flips
    pub fn with_momentum_defaults(mut self) -> Self {
        self.builtin.extend([
            BuiltinDetector::MomentumShift(MomentumShiftDetector::with_defaults()),
            BuiltinDetector::DirectionFlip(DirectionFlipDetector::with_defaults()),
        ]);
        self
    }

    /// RSI oversold/overbought runs using the configured `rsi` levels,
    /// RSI W-bottoms and M-tops
    pub fn with_zone_defaults(mut self) -> Self {
        let levels = self.config.thresholds.get_or("rsi", ZoneLevels::RSI);
        self.builtin.extend([
            BuiltinDetector::ZoneRun(ZoneRunDetector::rsi_oversold(levels.oversold)),
            BuiltinDetector::ZoneRun(ZoneRunDetector::rsi_overbought(levels.overbought)),
            BuiltinDetector::DoublePattern(DoublePatternDetector::rsi_w_bottom()),
            BuiltinDetector::DoublePattern(DoublePatternDetector::rsi_m_top()),
        ]);
        self
    }

    /// Close against RSI, stochastic %K and the MACD line
    pub fn with_divergence_defaults(mut self) -> Self {
        self.builtin.extend([
            BuiltinDetector::Divergence(DivergenceDetector::rsi()),
            BuiltinDetector::Divergence(DivergenceDetector::stochastic()),
            BuiltinDetector::Divergence(DivergenceDetector::macd()),
        ]);
        self
    }

    /// Add a builtin detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.builtin.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.builtin.push(detector);
        Ok(self)
    }

    /// Add a custom detector (slow path)
    pub fn add_custom<D: PatternDetector + 'static>(mut self, detector: D) -> Self {
        self.custom.push(Box::new(detector));
        self
    }

    /// Keep at most `cap` events per pattern id
    pub fn max_events_per_pattern(mut self, cap: usize) -> Self {
        self.config.max_events_per_pattern = cap;
        self
    }

    /// Fail scans that carry no timestamps
    pub fn require_timestamps(mut self, enable: bool) -> Self {
        self.config.require_timestamps = enable;
        self
    }

    /// Filter to specific patterns only
    pub fn only_patterns(mut self, ids: impl IntoIterator<Item = PatternId>) -> Self {
        self.config.pattern_filter = Some(ids.into_iter().map(|id| id.0.to_string()).collect());
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<PatternEngine> {
        let engine = PatternEngine {
            builtin: self.builtin,
            custom: self.custom,
            config: self.config,
        };
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub events: Vec<PatternEvent>,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: PatternError,
}

/// Parallel scanning of multiple instruments.
///
/// Each instrument is analysed independently; nothing is shared between
/// scans beyond the read-only engine.
pub fn scan_parallel<'a, I>(engine: &PatternEngine, instruments: I) -> (Vec<ScanResult>, Vec<ScanError>)
where
    I: IntoParallelIterator<Item = (&'a str, SeriesSet<'a>)>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, series)| {
            engine
                .scan(&series)
                .map(|events| ScanResult {
                    symbol: symbol.to_string(),
                    events,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
