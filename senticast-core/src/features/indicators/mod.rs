//! Price-derived feature columns.
//!
//! Indicators are pure functions: bar history in, numeric series out, one
//! value per bar. The first `lookback()` values are `f64::NAN` (warmup).
//!
//! # Look-ahead contamination guard
//! No value at bar t may depend on bar t+1 or later. Every indicator passes
//! the truncated-vs-full series test in `tests/lookahead_test.rs`.

pub mod returns;
pub mod rsi;
pub mod volatility;

pub use returns::TrailingReturn;
pub use rsi::Rsi;
pub use volatility::RealizedVolatility;

use crate::domain::Bar;

pub trait Indicator: Send + Sync {
    /// Feature field name (e.g., "ret_5", "vol_10").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Close-to-close simple returns; index 0 is NaN.
pub(crate) fn one_bar_returns(bars: &[Bar]) -> Vec<f64> {
    let mut out = vec![f64::NAN; bars.len()];
    for i in 1..bars.len() {
        out[i] = bars[i].close / bars[i - 1].close - 1.0;
    }
    out
}

/// Create bars from close prices for testing, one per day from 2024-01-02.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: (open.min(close) - 1.0).max(0.01),
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() < tol,
        "{actual} is not within {tol} of {expected}"
    );
}
