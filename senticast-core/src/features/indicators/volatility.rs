//! Realized volatility: population standard deviation of the last `window`
//! one-bar returns.
//!
//! Lookback: window (the return at bar t needs bar t-1).

use super::{one_bar_returns, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct RealizedVolatility {
    window: usize,
    name: String,
}

impl RealizedVolatility {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            name: format!("vol_{window}"),
        }
    }
}

impl Indicator for RealizedVolatility {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        let returns = one_bar_returns(bars);
        for i in self.window..n {
            let slice = &returns[i + 1 - self.window..=i];
            result[i] = population_std(slice);
        }
        result
    }
}

pub(crate) fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}
