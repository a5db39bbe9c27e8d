//! Common helpers shared across detector modules
//!
//! Default windows and thresholds, non-finite bookkeeping and the
//! monotonic-deque rolling extrema used by the fast swing scan.

use std::collections::VecDeque;

// ============================================================
// DEFAULTS
// ============================================================

/// Bars before a candidate that must be strictly dominated
pub const DEFAULT_LOOKBACK: usize = 5;
/// Bars after a candidate that must be strictly dominated
pub const DEFAULT_LOOKAHEAD: usize = 5;
/// Super smoother length applied before swing scanning
pub const DEFAULT_SMOOTH_LENGTH: usize = 10;
/// Recent window searched for crossovers (offsets 1..window)
pub const DEFAULT_CROSS_WINDOW: usize = 5;
/// Trailing values inspected by the momentum trend classifier
pub const DEFAULT_TREND_WINDOW: usize = 3;
/// Recent values scanned for threshold runs and volatility spikes
pub const DEFAULT_RECENT_WINDOW: usize = 30;
/// ATR rise over two periods, in percent, that counts as a spike
pub const DEFAULT_SPIKE_PCT: f64 = 30.0;
/// Recent window searched for supertrend direction changes
pub const DEFAULT_FLIP_WINDOW: usize = 5;
/// History an oscillator needs before divergence, double-pattern and
/// volatility-regime detection run
pub const MIN_OSCILLATOR_HISTORY: usize = 14;

// ============================================================
// NON-FINITE HANDLING
// ============================================================

#[inline]
pub fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Arithmetic mean; `None` for an empty slice or any non-finite value.
pub fn finite_mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty() && all_finite(values))
        .then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Prefix counts of non-finite values: `prefix[k]` counts `values[..k]`.
pub fn non_finite_prefix(values: &[f64]) -> Vec<usize> {
    let mut prefix = Vec::with_capacity(values.len() + 1);
    let mut count = 0;
    prefix.push(count);
    for v in values {
        if !v.is_finite() {
            count += 1;
        }
        prefix.push(count);
    }
    prefix
}

/// True when `values[start..=end]` holds only finite values.
#[inline]
pub fn window_is_finite(prefix: &[usize], start: usize, end: usize) -> bool {
    prefix[end + 1] == prefix[start]
}

/// The last `n` values together with the index of the first one.
#[inline]
pub fn tail(values: &[f64], n: usize) -> (usize, &[f64]) {
    let start = values.len().saturating_sub(n);
    (start, &values[start..])
}

// ============================================================
// ROLLING EXTREMA
// ============================================================

/// Trailing maximum over `width` values; `out[k]` covers `values[k + 1 - width..=k]`.
///
/// Positions before a full window, and windows without any finite value,
/// are NaN. Non-finite values never enter the deque.
pub fn rolling_max(values: &[f64], width: usize) -> Vec<f64> {
    rolling_extreme(values, width, |back, new| back <= new)
}

/// Trailing minimum, see [`rolling_max`].
pub fn rolling_min(values: &[f64], width: usize) -> Vec<f64> {
    rolling_extreme(values, width, |back, new| back >= new)
}

fn rolling_extreme(values: &[f64], width: usize, dominated: impl Fn(f64, f64) -> bool) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if width == 0 || n < width {
        return out;
    }

    let mut deque: VecDeque<usize> = VecDeque::with_capacity(width);
    for (k, &value) in values.iter().enumerate() {
        if k >= width {
            while deque.front().is_some_and(|&front| front <= k - width) {
                deque.pop_front();
            }
        }

        if value.is_finite() {
            while deque.back().is_some_and(|&back| dominated(values[back], value)) {
                deque.pop_back();
            }
            deque.push_back(k);
        }

        if k + 1 >= width {
            if let Some(&front) = deque.front() {
                out[k] = values[front];
            }
        }
    }
    out
}
