//! Integration tests for the swingscan pattern detection library.
//!
//! These tests validate the public API against hand-checked fixtures.

use swingscan::prelude::*;

/// Hourly timestamps starting at a fixed epoch
fn make_timestamps(n: usize) -> Vec<i64> {
    (0..n as i64).map(|i| 1_700_000_000_000 + i * 3_600_000).collect()
}

/// Simple test bar structure
#[derive(Debug, Clone, Copy)]
struct TestBar {
    h: f64,
    l: f64,
    t: i64,
}

impl OHLCV for TestBar {
    fn open(&self) -> f64 {
        (self.h + self.l) / 2.0
    }

    fn high(&self) -> f64 {
        self.h
    }

    fn low(&self) -> f64 {
        self.l
    }

    fn close(&self) -> f64 {
        (self.h + self.l) / 2.0
    }

    fn volume(&self) -> f64 {
        1000.0
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.t)
    }
}

/// Zig-zag highs: peaks at 2 (5.0), 6 (7.0) and 10 (6.0); lows half a point below
fn make_zigzag() -> Vec<TestBar> {
    let highs = [1.0, 2.0, 5.0, 2.0, 1.0, 3.0, 7.0, 3.0, 1.0, 2.0, 6.0, 2.0, 1.0];
    highs
        .iter()
        .zip(make_timestamps(highs.len()))
        .map(|(&h, t)| TestBar { h, l: h - 0.5, t })
        .collect()
}

// ============================================================
// CROSSOVER TESTS
// ============================================================

#[test]
fn test_crossover_fixture() {
    let f = [20.0, 22.0, 24.0, 26.0, 28.5, 35.0, 42.0, 50.0];
    let s = [25.0, 24.0, 26.0, 28.0, 27.0, 32.0, 38.0, 45.0];

    let cross = stochastic_bullish_crossover(&f, &s)
        .unwrap()
        .expect("crossover in window");
    assert_eq!(cross.periods_ago, 3);
    assert_eq!(cross.offset, 4);
    assert_eq!(cross.index, 4);
    assert!((cross.fast - 28.5).abs() < 1e-9);
    assert!((cross.slow - 27.0).abs() < 1e-9);
    assert!(cross.in_zone);
}

#[test]
fn test_crossover_zone_uses_crossover_instant() {
    // Both lines below 30 at the cross, well above it by the last bar
    let k = [15.0, 18.0, 20.0, 23.0, 27.5, 35.0, 45.0, 55.0];
    let d = [20.0, 19.0, 23.0, 26.0, 25.0, 32.0, 42.0, 52.0];

    let cross = stochastic_bullish_crossover(&k, &d).unwrap().unwrap();
    assert_eq!(cross.index, 4);
    assert_eq!((cross.fast, cross.slow), (27.5, 25.0));
    assert!(cross.in_zone);
    assert!(!Zone::Below(30.0).contains_either(k[7], d[7]));
}

#[test]
fn test_crossover_on_latest_bar() {
    let k = [45.0, 48.0, 50.0, 52.0, 55.0, 58.0, 60.0];
    let d = [50.0, 52.0, 54.0, 56.0, 57.0, 58.5, 59.0];

    let cross = stochastic_bullish_crossover(&k, &d).unwrap().unwrap();
    assert_eq!(cross.offset, 1);
    assert_eq!(cross.periods_ago, 0);
    assert_eq!(cross.index, 6);
    assert!(!cross.in_zone);
}

#[test]
fn test_crossover_window_capped_by_length() {
    let k = [20.0, 18.0, 19.0, 22.0, 25.0];
    let d = [22.0, 21.0, 20.0, 23.0, 24.0];

    let cross = stochastic_bullish_crossover(&k, &d).unwrap().unwrap();
    assert_eq!(cross.offset, 1);
    assert!(cross.in_zone);
}

#[test]
fn test_no_crossover_when_fast_stays_above() {
    let f = [50.0, 51.0, 52.0, 53.0, 54.0, 55.0];
    let s = [40.0, 41.0, 42.0, 43.0, 44.0, 45.0];
    assert!(stochastic_bullish_crossover(&f, &s).unwrap().is_none());
}

#[test]
fn test_crossover_degenerate_lengths() {
    assert!(stochastic_bullish_crossover(&[], &[]).unwrap().is_none());
    assert!(stochastic_bullish_crossover(&[10.0], &[20.0]).unwrap().is_none());
    assert!(stochastic_bullish_crossover(&[10.0, 30.0], &[20.0, 20.0])
        .unwrap()
        .is_none());
}

#[test]
fn test_crossover_misaligned_is_error() {
    let result = stochastic_bullish_crossover(&[1.0, 2.0, 3.0], &[1.0, 2.0]);
    assert!(matches!(result, Err(PatternError::MisalignedSeries { .. })));
}

#[test]
fn test_crossover_skips_nan_offsets() {
    let f = [10.0, 10.0, 20.0, 10.0, 20.0, 20.0];
    let s = [15.0, 15.0, 15.0, 15.0, 15.0, 15.0];
    let cross = find_crossover(&f, &s, 5, CrossDirection::Bullish, None)
        .unwrap()
        .unwrap();
    assert_eq!(cross.index, 4);

    let s = [15.0, 15.0, 15.0, f64::NAN, 15.0, 15.0];
    let cross = find_crossover(&f, &s, 5, CrossDirection::Bullish, None)
        .unwrap()
        .unwrap();
    assert_eq!(cross.index, 2);
    assert_eq!(cross.periods_ago, 3);
    assert!(!cross.in_zone);
}

#[test]
fn test_bearish_crossover() {
    let f = [80.0, 78.0, 75.0, 72.0];
    let s = [75.0, 76.0, 77.0, 74.0];
    let cross = find_crossover(&f, &s, 5, CrossDirection::Bearish, Some(Zone::Above(70.0)))
        .unwrap()
        .unwrap();
    assert_eq!(cross.index, 2);
    assert_eq!(cross.periods_ago, 1);
    assert!(cross.in_zone);
}

#[test]
fn test_level_cross() {
    let macd = [-0.4, -0.2, 0.1, 0.3, 0.2];
    let cross = find_level_cross(&macd, 0.0, 5, CrossDirection::Bullish).unwrap();
    assert_eq!(cross.index, 2);
    assert!(find_level_cross(&macd, 0.0, 5, CrossDirection::Bearish).is_none());
}

#[test]
fn test_macd_detector_reports_every_crossover() {
    let line = [-1.0, -1.0, -1.0, 1.0, -1.0, 1.0, 2.0];
    let signal = [0.0; 7];
    let series = SeriesSet::new()
        .with("macd_line", &line)
        .and_then(|s| s.with("macd_signal", &signal))
        .unwrap();

    let bullish: Vec<_> = CrossoverDetector::macd_bullish()
        .detect(&series)
        .iter()
        .map(|m| m.index)
        .collect();
    assert_eq!(bullish, vec![5, 3]);

    let bearish = CrossoverDetector::macd_bearish().detect(&series);
    assert_eq!(bearish.len(), 1);
    assert_eq!(bearish[0].index, 4);

    // stochastic crossovers keep only the newest
    let series = SeriesSet::new()
        .with("stoch_k", &line)
        .and_then(|s| s.with("stoch_d", &signal))
        .unwrap();
    let latest = CrossoverDetector::stochastic_bullish().detect(&series);
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].index, 5);
}

#[test]
fn test_di_crossovers_carry_adx() {
    let plus_di = [10.0, 12.0, 15.0, 22.0, 25.0, 20.0, 18.0];
    let minus_di = [20.0, 19.0, 18.0, 17.0, 16.0, 21.0, 23.0];
    let adx = [20.0, 21.0, 22.0, 23.0, 24.0, 25.0, 26.0];
    let series = SeriesSet::new()
        .with("plus_di", &plus_di)
        .and_then(|s| s.with("minus_di", &minus_di))
        .and_then(|s| s.with("adx", &adx))
        .unwrap();

    let bullish = CrossoverDetector::di_bullish().detect(&series);
    assert_eq!(bullish.len(), 1);
    assert_eq!(bullish[0].pattern_id, DI_BULLISH_CROSS);
    assert_eq!(bullish[0].index, 3);
    assert_eq!(bullish[0].values.get("plus_di"), Some(22.0));
    assert_eq!(bullish[0].values.get("adx"), Some(23.0));
    assert_eq!(bullish[0].classification, Classification::None);

    let bearish = CrossoverDetector::di_bearish().detect(&series);
    assert_eq!(bearish.len(), 1);
    assert_eq!(bearish[0].direction, Direction::Bearish);
    assert_eq!(bearish[0].index, 5);
    assert_eq!(bearish[0].values.get("adx"), Some(25.0));

    // without an adx column the crossover is still reported
    let series = SeriesSet::new()
        .with("plus_di", &plus_di)
        .and_then(|s| s.with("minus_di", &minus_di))
        .unwrap();
    let bullish = CrossoverDetector::di_bullish().detect(&series);
    assert_eq!(bullish[0].values.get("adx"), None);
}

// ============================================================
// SQUEEZE TESTS
// ============================================================

#[test]
fn test_squeeze_fixture() {
    let (ou, ol) = ([110.0, 110.0], [90.0, 90.0]);

    assert!(is_squeeze(&[105.0, 108.0], &[95.0, 92.0], &ou, &ol).unwrap());
    // upper band escapes
    assert!(!is_squeeze(&[105.0, 111.0], &[95.0, 92.0], &ou, &ol).unwrap());
    // lower band escapes
    assert!(!is_squeeze(&[105.0, 108.0], &[95.0, 89.0], &ou, &ol).unwrap());
    // touching counts
    assert!(is_squeeze(&[105.0, 110.0], &[95.0, 90.0], &ou, &ol).unwrap());
}

#[test]
fn test_squeeze_nan_is_not_squeeze() {
    let ou = [110.0];
    let ol = [90.0];
    assert!(!is_squeeze(&[f64::NAN], &[95.0], &ou, &ol).unwrap());
}

#[test]
fn test_squeeze_run_length() {
    let iu = [115.0, 105.0, 106.0, 107.0];
    let il = [85.0, 95.0, 94.0, 93.0];
    let ou = [110.0; 4];
    let ol = [90.0; 4];
    assert_eq!(squeeze_flags(&iu, &il, &ou, &ol).unwrap(), vec![false, true, true, true]);
    assert_eq!(squeeze_run_length(&iu, &il, &ou, &ol).unwrap(), 3);
}

// ============================================================
// SWING TESTS
// ============================================================

#[test]
fn test_swing_classification_sequence() {
    let bars = make_zigzag();
    let columns = Columns::from_bars(&bars);
    let detector = SwingDetector::unsmoothed(2, 2).unwrap();

    let points = detector.find_swings(&columns.high, &columns.low);
    let highs: Vec<_> = points
        .iter()
        .filter(|p| p.kind == SwingKind::High)
        .map(|p| (p.index, p.class))
        .collect();
    assert_eq!(
        highs,
        vec![
            (2, SwingClass::Unclassified),
            (6, SwingClass::HigherHigh),
            (10, SwingClass::LowerHigh),
        ]
    );

    let lows: Vec<_> = points
        .iter()
        .filter(|p| p.kind == SwingKind::Low)
        .map(|p| (p.index, p.class))
        .collect();
    assert_eq!(
        lows,
        vec![(4, SwingClass::Unclassified), (8, SwingClass::HigherLow)]
    );
}

#[test]
fn test_swing_degenerate_boundary() {
    // n <= lookback + lookahead leaves no interior candidate
    let mut values = vec![1.0; 10];
    values[5] = 10.0;
    assert!(swing_highs(&values, 5, 5).iter().all(|f| !f));
    assert!(swing_highs_monotonic(&values, 5, 5).iter().all(|f| !f));

    values.push(1.0);
    assert!(swing_highs(&values, 5, 5)[5]);
}

#[test]
fn test_swing_strategies_through_detector() {
    let bars = make_zigzag();
    let columns = Columns::from_bars(&bars);
    let direct = SwingDetector::unsmoothed(2, 2).unwrap();
    let monotonic = direct.with_strategy(ScanStrategy::Monotonic);

    assert_eq!(
        direct.find_swings(&columns.high, &columns.low),
        monotonic.find_swings(&columns.high, &columns.low)
    );
}

#[test]
fn test_smoothed_swings_report_raw_value() {
    let highs: Vec<f64> = (0..60)
        .map(|i| 100.0 + 10.0 * (i as f64 * std::f64::consts::PI / 15.0).sin())
        .collect();
    let series = SeriesSet::new().with("high", &highs).unwrap();

    let matches = SwingDetector::with_defaults().detect(&series);
    assert!(!matches.is_empty());
    for m in &matches {
        assert_eq!(m.pattern_id, SWING_HIGH);
        assert_eq!(m.values.get("raw"), Some(highs[m.index]));
        assert!(m.values.get("price").is_some());
    }
}

#[test]
fn test_smoothed_swing_skipped_when_raw_window_has_nan() {
    let clean: Vec<f64> = (0..60)
        .map(|i| 100.0 + 10.0 * (i as f64 * std::f64::consts::PI / 15.0).sin())
        .collect();
    let detector = SwingDetector::with_defaults();
    let series = SeriesSet::new().with("high", &clean).unwrap();
    let peak = detector
        .detect(&series)
        .iter()
        .map(|m| m.index)
        .find(|&i| i + 7 < clean.len())
        .expect("swing high in the clean series");

    let mut highs = clean.clone();
    let gap = peak + 1;
    highs[gap] = f64::NAN;
    let series = SeriesSet::new().with("high", &highs).unwrap();
    let matches = detector.detect(&series);

    // every candidate whose window reaches the gap is dropped
    assert!(matches.iter().all(|m| m.index != peak));
    assert!(matches.iter().all(|m| m.index.abs_diff(gap) > 5));
}

// ============================================================
// MOMENTUM TESTS
// ============================================================

#[test]
fn test_momentum_trend_classifier() {
    assert_eq!(classify_trend(&[1.0, 0.6, 0.2], 3), Trend::Decreasing);
    assert_eq!(classify_trend(&[-0.3, -0.1, 0.2], 3), Trend::Increasing);
    assert_eq!(classify_trend(&[0.2, 0.6, 0.2], 3), Trend::Neutral);
    assert_eq!(classify_trend(&[0.6, 0.2], 3), Trend::Neutral);
    assert_eq!(classify_trend(&[0.6, 0.4, 0.2], 1), Trend::Neutral);
}

// ============================================================
// ENGINE TESTS
// ============================================================

/// Eight aligned periods covering crossover, squeeze and momentum
struct Fixture {
    k: Vec<f64>,
    d: Vec<f64>,
    hist: Vec<f64>,
    bb_upper: Vec<f64>,
    bb_lower: Vec<f64>,
    kc_upper: Vec<f64>,
    kc_lower: Vec<f64>,
    timestamps: Vec<i64>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            k: vec![20.0, 22.0, 24.0, 26.0, 28.5, 35.0, 42.0, 50.0],
            d: vec![25.0, 24.0, 26.0, 28.0, 27.0, 32.0, 38.0, 45.0],
            hist: vec![0.1, 0.3, 0.6, 0.8, 0.7, 0.5, 0.3, 0.1],
            bb_upper: vec![112.0, 111.0, 109.0, 108.0, 107.0, 106.0, 105.0, 104.0],
            bb_lower: vec![88.0, 89.0, 91.0, 92.0, 93.0, 94.0, 95.0, 96.0],
            kc_upper: vec![110.0; 8],
            kc_lower: vec![90.0; 8],
            timestamps: make_timestamps(8),
        }
    }

    fn series(&self) -> SeriesSet<'_> {
        SeriesSet::new()
            .with("stoch_k", &self.k)
            .and_then(|s| s.with("stoch_d", &self.d))
            .and_then(|s| s.with("macd_hist", &self.hist))
            .and_then(|s| s.with("bb_upper", &self.bb_upper))
            .and_then(|s| s.with("bb_lower", &self.bb_lower))
            .and_then(|s| s.with("kc_upper", &self.kc_upper))
            .and_then(|s| s.with("kc_lower", &self.kc_lower))
            .and_then(|s| s.with_timestamps(&self.timestamps))
            .unwrap()
    }
}

#[test]
fn test_engine_scan_scenario() {
    let fixture = Fixture::new();
    let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
    let events = engine.scan(&fixture.series()).unwrap();

    let cross = events
        .iter()
        .find(|e| e.pattern_id == STOCH_BULLISH_CROSS)
        .expect("stochastic crossover");
    assert_eq!(cross.periods_ago, 3);
    assert_eq!(cross.classification, Classification::Zone { in_zone: true });
    assert_eq!(
        cross.timestamp.map(|t| t.timestamp_millis()),
        Some(fixture.timestamps[4])
    );
    assert_eq!(cross.values.get("stoch_k"), Some(28.5));
    assert!(cross.description.contains("3 periods ago"));

    let squeeze = events
        .iter()
        .find(|e| e.pattern_id == TTM_SQUEEZE)
        .expect("squeeze on the latest bar");
    assert_eq!(squeeze.periods_ago, 0);
    assert_eq!(squeeze.values.get("run_length"), Some(6.0));

    let shift = events
        .iter()
        .find(|e| e.pattern_id == MOMENTUM_SHIFT)
        .expect("falling histogram");
    assert_eq!(shift.direction, Direction::Bearish);
    assert_eq!(shift.classification, Classification::Trend(Trend::Decreasing));

    // missing columns produce nothing
    assert!(events.iter().all(|e| e.pattern_id != SWING_HIGH));
    assert!(events.iter().all(|e| e.pattern_id != RSI_OVERSOLD));

    // most recent first
    assert!(events.windows(2).all(|w| w[0].periods_ago <= w[1].periods_ago));
}

#[test]
fn test_engine_scan_is_pure() {
    let fixture = Fixture::new();
    let before = fixture.k.clone();
    let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

    let first = engine.scan(&fixture.series()).unwrap();
    let second = engine.scan(&fixture.series()).unwrap();
    assert_eq!(first, second);
    assert_eq!(fixture.k, before);
}

#[test]
fn test_engine_caps_events_per_pattern() {
    let columns = Columns::from_bars(&make_zigzag());
    let engine = EngineBuilder::new()
        .add(BuiltinDetector::Swing(SwingDetector::unsmoothed(2, 2).unwrap()))
        .max_events_per_pattern(1)
        .build()
        .unwrap();

    let events = engine.scan(&columns.series_set()).unwrap();
    let highs: Vec<_> = events.iter().filter(|e| e.pattern_id == SWING_HIGH).collect();
    assert_eq!(highs.len(), 1);
    assert_eq!(highs[0].index, 10);
    assert_eq!(highs[0].periods_ago, 2);
}

#[test]
fn test_engine_zone_levels_from_config() {
    let rsi = [50.0, 40.0, 28.0, 26.0, 35.0, 40.0];
    let series = SeriesSet::new().with("rsi", &rsi).unwrap();

    let engine = EngineBuilder::new().with_zone_defaults().build().unwrap();
    let events = engine.scan(&series).unwrap();
    let oversold = events
        .iter()
        .find(|e| e.pattern_id == RSI_OVERSOLD)
        .expect("default oversold run");
    assert_eq!(oversold.index, 3);
    assert_eq!(oversold.values.get("extreme"), Some(26.0));
    assert_eq!(oversold.values.get("duration"), Some(2.0));

    let config = EngineConfig::from_json_str(
        r#"{ "thresholds": { "rsi": { "oversold": 25, "overbought": 75 } } }"#,
    )
    .unwrap();
    let engine = EngineBuilder::new()
        .config(config)
        .with_zone_defaults()
        .build()
        .unwrap();
    assert!(engine.scan(&series).unwrap().is_empty());
}

#[test]
fn test_engine_stochastic_zone_from_config() {
    let fixture = Fixture::new();
    let zoned = |engine: PatternEngine| {
        engine
            .scan(&fixture.series())
            .unwrap()
            .into_iter()
            .find(|e| e.pattern_id == STOCH_BULLISH_CROSS)
            .map(|e| e.classification)
    };

    // default oversold 30 holds %K = 28.5 and %D = 27 at the cross
    let engine = EngineBuilder::new().with_crossover_defaults().build().unwrap();
    assert_eq!(zoned(engine), Some(Classification::Zone { in_zone: true }));

    let config = EngineConfig::from_json_str(
        r#"{ "thresholds": { "stoch_k": { "oversold": 20, "overbought": 80 } } }"#,
    )
    .unwrap();
    let engine = EngineBuilder::new()
        .config(config)
        .with_crossover_defaults()
        .build()
        .unwrap();
    assert_eq!(zoned(engine), Some(Classification::Zone { in_zone: false }));
}

#[test]
fn test_engine_caps_macd_crossovers() {
    let line = [-1.0, -1.0, -1.0, 1.0, -1.0, 1.0, 2.0];
    let signal = [0.0; 7];
    let series = SeriesSet::new()
        .with("macd_line", &line)
        .and_then(|s| s.with("macd_signal", &signal))
        .unwrap();

    let engine = EngineBuilder::new().with_crossover_defaults().build().unwrap();
    let crosses = engine
        .scan(&series)
        .unwrap()
        .into_iter()
        .filter(|e| e.pattern_id == MACD_BULLISH_CROSS)
        .count();
    assert_eq!(crosses, 2);

    let engine = EngineBuilder::new()
        .with_crossover_defaults()
        .max_events_per_pattern(1)
        .build()
        .unwrap();
    let events = engine.scan(&series).unwrap();
    let crosses: Vec<_> = events
        .iter()
        .filter(|e| e.pattern_id == MACD_BULLISH_CROSS)
        .collect();
    assert_eq!(crosses.len(), 1);
    assert_eq!(crosses[0].index, 5);
}

#[test]
fn test_engine_rsi_divergence() {
    // close keeps falling; RSI turns up on the last bar
    let close: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
    let mut rsi: Vec<f64> = (0..20).map(|i| 40.0 - i as f64).collect();
    rsi[19] = 30.0;
    let series = SeriesSet::new()
        .with("close", &close)
        .and_then(|s| s.with("rsi", &rsi))
        .unwrap();

    let engine = EngineBuilder::new().with_divergence_defaults().build().unwrap();
    let events = engine.scan(&series).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].pattern_id, RSI_BULLISH_DIVERGENCE);
    assert_eq!(events[0].direction, Direction::Bullish);
    assert_eq!(events[0].periods_ago, 0);
    assert_eq!(events[0].values.get("rsi"), Some(30.0));
    assert_eq!(events[0].values.get("close"), Some(81.0));

    // RSI confirming the low is no divergence
    rsi[19] = 15.0;
    let series = SeriesSet::new()
        .with("close", &close)
        .and_then(|s| s.with("rsi", &rsi))
        .unwrap();
    assert!(engine.scan(&series).unwrap().is_empty());
}

#[test]
fn test_parallel_scan_reports_errors_per_instrument() {
    let fixture = Fixture::new();
    let engine = EngineBuilder::new()
        .with_all_defaults()
        .require_timestamps(true)
        .build()
        .unwrap();

    let untimed = [1.0, 2.0, 3.0];
    let instruments = vec![
        ("BTCUSDT", fixture.series()),
        ("ETHUSDT", SeriesSet::new().with("close", &untimed).unwrap()),
    ];

    let (results, errors) = scan_parallel(&engine, instruments);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].symbol, "BTCUSDT");
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].error, PatternError::MissingTimestamps));
}
