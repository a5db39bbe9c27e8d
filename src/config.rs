//! Engine configuration
//!
//! Everything is plain serde data so callers can load it from JSON next to
//! their own settings. Missing fields fall back to the defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{PatternError, Result, Zone};

/// Default cap on emitted events per pattern id
pub const DEFAULT_MAX_EVENTS_PER_PATTERN: usize = 10;

/// Oversold/overbought levels of one oscillator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneLevels {
    pub oversold: f64,
    pub overbought: f64,
}

impl ZoneLevels {
    pub const RSI: Self = Self::new(30.0, 70.0);
    /// Zone of the stochastic crossover detectors; applied to %K and %D alike
    pub const STOCHASTIC: Self = Self::new(30.0, 70.0);

    pub const fn new(oversold: f64, overbought: f64) -> Self {
        Self {
            oversold,
            overbought,
        }
    }

    #[inline]
    pub fn oversold_zone(self) -> Zone {
        Zone::Below(self.oversold)
    }

    #[inline]
    pub fn overbought_zone(self) -> Zone {
        Zone::Above(self.overbought)
    }

    pub fn validate(self, name: &str) -> Result<()> {
        if !self.oversold.is_finite() || !self.overbought.is_finite() {
            return Err(PatternError::InvalidConfig(format!(
                "{name}: levels must be finite"
            )));
        }
        if self.oversold >= self.overbought {
            return Err(PatternError::InvalidConfig(format!(
                "{name}: oversold {} must be below overbought {}",
                self.oversold, self.overbought
            )));
        }
        Ok(())
    }
}

/// Named oscillator levels, keyed by series name.
///
/// `rsi` drives the RSI zone runs and `stoch_k` the stochastic crossover
/// zones; other names are kept for custom detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Thresholds(BTreeMap<String, ZoneLevels>);

impl Default for Thresholds {
    fn default() -> Self {
        let levels = [("rsi", ZoneLevels::RSI), ("stoch_k", ZoneLevels::STOCHASTIC)];
        Self(
            levels
                .into_iter()
                .map(|(name, l)| (name.to_string(), l))
                .collect(),
        )
    }
}

impl Thresholds {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<ZoneLevels> {
        self.0.get(name).copied()
    }

    /// Configured levels for `name`, or `fallback` when the table has none
    pub fn get_or(&self, name: &str, fallback: ZoneLevels) -> ZoneLevels {
        self.get(name).unwrap_or(fallback)
    }

    pub fn set(&mut self, name: impl Into<String>, levels: ZoneLevels) {
        self.0.insert(name.into(), levels);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ZoneLevels)> {
        self.0.iter().map(|(name, l)| (name.as_str(), *l))
    }

    pub fn validate(&self) -> Result<()> {
        self.iter().try_for_each(|(name, levels)| levels.validate(name))
    }
}

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Most recent events kept per pattern id
    pub max_events_per_pattern: usize,
    /// When set, only these pattern ids are reported
    pub pattern_filter: Option<Vec<String>>,
    /// Reject scans without a timestamp column
    pub require_timestamps: bool,
    pub thresholds: Thresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events_per_pattern: DEFAULT_MAX_EVENTS_PER_PATTERN,
            pattern_filter: None,
            require_timestamps: false,
            thresholds: Thresholds::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PatternError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PatternError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_events_per_pattern == 0 {
            return Err(PatternError::InvalidConfig(
                "max_events_per_pattern must be at least 1".to_string(),
            ));
        }
        self.thresholds.validate()
    }
}
