//! Look-ahead contamination tests.
//!
//! Invariant: nothing computed for bar t may depend on data from bar t+1 or
//! later: not an indicator value, not a feature vector, not a backtest
//! position.
//!
//! Method: compute on a truncated series (bars 0..120) and the full series
//! (bars 0..240). Everything defined on the truncated span must be identical
//! between both runs.

use chrono::{DateTime, Duration, TimeZone, Utc};
use senticast_core::backtest::{Backtester, PolicyConfig};
use senticast_core::domain::{Bar, BarSeries, Sentiment, SentimentScore};
use senticast_core::features::indicators::{Indicator, RealizedVolatility, Rsi, TrailingReturn};
use senticast_core::features::{FeatureAssembler, FeatureSchema, FeatureVector};
use senticast_core::model::{Forecast, ForecastModel};
use senticast_core::domain::ModelVersion;

const FULL: usize = 240;
const TRUNCATED: usize = 120;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap()
}

/// N bars of synthetic OHLCV data from a deterministic LCG walk.
fn make_test_bars(n: usize) -> Vec<Bar> {
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0_f64;
    for i in 0..n {
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let change = (((seed >> 33) % 200) as f64 - 100.0) * 0.02;
        price = (price + change).max(10.0);
        let open = price - 0.2;
        let close = price + 0.1;
        bars.push(Bar {
            timestamp: base() + Duration::days(i as i64),
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume: 1000.0 + i as f64,
        });
    }
    bars
}

/// One score every third bar, stamped mid-day so it precedes that bar's close.
fn make_scores(n: usize) -> Vec<SentimentScore> {
    (0..n)
        .step_by(3)
        .map(|i| {
            let value = ((i * 37) % 21) as f64 / 10.0 - 1.0;
            SentimentScore::new(
                base() + Duration::days(i as i64) - Duration::hours(6),
                Sentiment::Primary(value),
            )
        })
        .collect()
}

fn assert_no_lookahead(indicator: &dyn Indicator, full_bars: &[Bar], truncated_len: usize) {
    let full_result = indicator.compute(full_bars);
    let truncated_result = indicator.compute(&full_bars[..truncated_len]);
    assert_eq!(truncated_result.len(), truncated_len);
    for i in 0..truncated_len {
        let (t, f) = (truncated_result[i], full_result[i]);
        assert!(
            (t.is_nan() && f.is_nan()) || t == f,
            "{}: look-ahead at bar {i}: truncated={t}, full={f}",
            indicator.name()
        );
    }
}

#[test]
fn indicators_do_not_look_ahead() {
    let bars = make_test_bars(FULL);
    let indicators: Vec<Box<dyn Indicator>> = vec![
        Box::new(TrailingReturn::new(1)),
        Box::new(TrailingReturn::new(5)),
        Box::new(TrailingReturn::new(20)),
        Box::new(RealizedVolatility::new(10)),
        Box::new(RealizedVolatility::new(30)),
        Box::new(Rsi::new(14)),
        Box::new(Rsi::new(2)),
    ];
    for ind in &indicators {
        assert_no_lookahead(ind.as_ref(), &bars, TRUNCATED);
    }
}

#[test]
fn feature_vectors_do_not_look_ahead() {
    let full = BarSeries::new(make_test_bars(FULL)).unwrap();
    let truncated = full.slice(0, TRUNCATED);
    // Future documents are present in the full run only.
    let scores_full = make_scores(FULL);
    let cutoff = truncated.last().unwrap().timestamp;
    let scores_truncated: Vec<_> = scores_full
        .iter()
        .filter(|s| s.timestamp <= cutoff)
        .copied()
        .collect();

    let asm = FeatureAssembler::new(FeatureSchema::default()).unwrap();
    let lookback = FeatureSchema::default().min_lookback();
    let a = asm.assemble(&truncated, &scores_truncated, lookback).unwrap();
    let b = asm.assemble(&full, &scores_full, lookback).unwrap();
    assert_eq!(a.len(), TRUNCATED - lookback);
    assert_eq!(a[..], b[..a.len()]);
}

/// Model whose output depends on every value in its window.
struct SumModel {
    version: ModelVersion,
    names: Vec<String>,
}

impl ForecastModel for SumModel {
    fn version(&self) -> &ModelVersion {
        &self.version
    }
    fn window_len(&self) -> usize {
        3
    }
    fn feature_names(&self) -> &[String] {
        &self.names
    }
    fn forward(&self, flat: &[f64]) -> Forecast {
        Forecast {
            mean: flat.iter().sum::<f64>() * 1e-3,
            uncertainty: flat.iter().map(|v| v.abs()).sum::<f64>() * 1e-3,
        }
    }
}

#[test]
fn backtest_positions_do_not_look_ahead() {
    let full = BarSeries::new(make_test_bars(FULL)).unwrap();
    let truncated = full.slice(0, TRUNCATED);
    let schema = FeatureSchema::default();
    let asm = FeatureAssembler::new(schema.clone()).unwrap();
    let lookback = schema.min_lookback();
    let scores = make_scores(FULL);

    let f_full: Vec<FeatureVector> = asm.assemble(&full, &scores, lookback).unwrap();
    let f_trunc: Vec<FeatureVector> = asm.assemble(&truncated, &scores, lookback).unwrap();

    let model = SumModel {
        version: ModelVersion::new("sum"),
        names: schema.field_names(),
    };
    let bt = Backtester::default();
    let policy = PolicyConfig::ConfidenceScaled;
    let short = bt.run(&truncated, &f_trunc, &model, &policy).unwrap();
    let long = bt.run(&full, &f_full, &model, &policy).unwrap();

    let n = short.positions.len();
    assert!(n > 50);
    assert_eq!(short.positions[..], long.positions[..n]);
    assert_eq!(short.predictions[..], long.predictions[..n]);
    assert_eq!(short.equity_curve[..], long.equity_curve[..=n]);
}
