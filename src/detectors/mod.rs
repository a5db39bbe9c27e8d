//! Series pattern detectors
//!
//! Every detector reads named columns from a [`crate::SeriesSet`] and emits
//! index-based [`crate::PatternMatch`]es.
//!
//! # Pattern Families
//!
//! - **Structure**: swing highs/lows with higher/lower classification
//! - **Crossover**: stochastic, MACD signal and DMI crossovers, MACD zero line
//! - **Volatility**: TTM squeeze, ATR spikes, volatility trend and level
//! - **Momentum**: MACD histogram shift, supertrend flips
//! - **Zone**: RSI oversold/overbought runs
//! - **Divergence**: price against RSI, stochastic and MACD
//! - **Reversal**: RSI W-bottoms and M-tops

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
    ($($detector:ty),* $(,)?) => {
        $(impl $detector {
            pub fn with_defaults() -> Self {
                Self::default()
            }
        })*
    };
}

pub mod crossover;
pub mod divergence;
pub mod double;
pub mod momentum;
pub mod smoothing;
pub mod swing;
pub mod volatility;
pub mod zones;

// Re-export all detectors for convenience
pub use crossover::*;
pub use divergence::*;
pub use double::*;
pub use helpers::*;
pub use momentum::*;
pub use smoothing::*;
pub use swing::*;
pub use volatility::*;
pub use zones::*;
