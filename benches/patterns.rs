//! Benchmarks for series pattern detection.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use swingscan::prelude::*;

/// Indicator columns for one synthetic instrument
struct Generated {
  high: Vec<f64>,
  low: Vec<f64>,
  stoch_k: Vec<f64>,
  stoch_d: Vec<f64>,
  macd_hist: Vec<f64>,
  rsi: Vec<f64>,
  atr: Vec<f64>,
  timestamps: Vec<i64>,
}

impl Generated {
  fn series(&self) -> SeriesSet<'_> {
    let mut set = SeriesSet::new();
    for (name, values) in [
      ("high", &self.high),
      ("low", &self.low),
      ("stoch_k", &self.stoch_k),
      ("stoch_d", &self.stoch_d),
      ("macd_hist", &self.macd_hist),
      ("rsi", &self.rsi),
      ("atr", &self.atr),
    ] {
      set.insert(name, values).unwrap();
    }
    set.with_timestamps(&self.timestamps).unwrap()
  }
}

/// Generate realistic deterministic series
fn generate(n: usize) -> Generated {
  let mut g = Generated {
    high: Vec::with_capacity(n),
    low: Vec::with_capacity(n),
    stoch_k: Vec::with_capacity(n),
    stoch_d: Vec::with_capacity(n),
    macd_hist: Vec::with_capacity(n),
    rsi: Vec::with_capacity(n),
    atr: Vec::with_capacity(n),
    timestamps: Vec::with_capacity(n),
  };
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0; // Deterministic "random"
    let volatility = 2.0 + ((i * 3) % 10) as f64 / 5.0;
    let phase = i as f64 / 9.0;

    price += change;
    g.high.push(price + volatility * 0.5);
    g.low.push(price - volatility * 0.5);
    g.stoch_k.push(50.0 + 45.0 * phase.sin());
    g.stoch_d.push(50.0 + 40.0 * (phase - 0.3).sin());
    g.macd_hist.push((phase * 1.7).cos());
    g.rsi.push(50.0 + 30.0 * (phase * 0.8).sin());
    g.atr.push(volatility);
    g.timestamps.push(1_700_000_000_000 + i as i64 * 60_000);
  }

  g
}

fn bench_swing_strategies(c: &mut Criterion) {
  let data = generate(10_000);
  let mut group = c.benchmark_group("swing_scan");

  for width in [5usize, 20, 50] {
    group.bench_with_input(BenchmarkId::new("direct", width), &width, |b, &w| {
      b.iter(|| black_box(swing_highs(black_box(&data.high), w, w)))
    });
    group.bench_with_input(BenchmarkId::new("monotonic", width), &width, |b, &w| {
      b.iter(|| black_box(swing_highs_monotonic(black_box(&data.high), w, w)))
    });
  }

  group.finish();
}

fn bench_smoother(c: &mut Criterion) {
  let data = generate(10_000);
  let length = Period::new(10).unwrap();

  c.bench_function("super_smoother_10000", |b| {
    b.iter(|| black_box(super_smoother(black_box(&data.high), length)))
  });
}

fn bench_all_patterns(c: &mut Criterion) {
  let data = generate(1000);
  let series = data.series();

  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  c.bench_function("scan_all_patterns_1000", |b| {
    b.iter(|| {
      let _ = black_box(engine.scan(black_box(&series)));
    })
  });
}

fn bench_scaling(c: &mut Criterion) {
  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  let mut group = c.benchmark_group("scaling");

  for size in [100, 500, 1000, 5000, 10000].iter() {
    let data = generate(*size);
    let series = data.series();

    group.bench_with_input(BenchmarkId::new("scan", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(engine.scan(black_box(&series)));
      })
    });
  }

  group.finish();
}

fn bench_parallel_scan(c: &mut Criterion) {
  let data: Vec<Generated> = (0..4).map(|_| generate(1000)).collect();

  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  let instruments: Vec<(&str, SeriesSet<'_>)> = ["SYM1", "SYM2", "SYM3", "SYM4"]
    .into_iter()
    .zip(data.iter().map(Generated::series))
    .collect();

  c.bench_function("parallel_scan_4_instruments", |b| {
    b.iter(|| {
      let _ = black_box(scan_parallel(black_box(&engine), black_box(instruments.clone())));
    })
  });
}

criterion_group!(
  benches,
  bench_swing_strategies,
  bench_smoother,
  bench_all_patterns,
  bench_scaling,
  bench_parallel_scan,
);

criterion_main!(benches);
