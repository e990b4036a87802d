//! Trailing simple return over `window` bars.
//!
//! ret[t] = close[t] / close[t - window] - 1
//! Lookback: window.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct TrailingReturn {
    window: usize,
    name: String,
}

impl TrailingReturn {
    /// `window` must be >= 1; the schema validates this before construction.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            name: format!("ret_{window}"),
        }
    }
}

impl Indicator for TrailingReturn {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        for i in self.window..n {
            let base = bars[i - self.window].close;
            if base > 0.0 {
                result[i] = bars[i].close / base - 1.0;
            }
        }
        result
    }
}
