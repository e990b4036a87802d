//! Relative Strength Index, emitted on a [0, 1] scale.
//!
//! Uses Wilder smoothing of average gains and average losses.
//! RSI = 1 - 1 / (1 + avg_gain / avg_loss)
//! Lookback: period.
//! Edge cases: no movement → 0.5; avg_loss == 0 → 1; avg_gain == 0 → 0.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period + 1 {
            return result;
        }

        let changes: Vec<f64> = (0..n)
            .map(|i| if i == 0 { 0.0 } else { bars[i].close - bars[i - 1].close })
            .collect();

        // Seed: simple average over the first `period` changes
        let (mut avg_gain, mut avg_loss) = changes[1..=self.period]
            .iter()
            .fold((0.0, 0.0), |(g, l), &ch| {
                if ch > 0.0 {
                    (g + ch, l)
                } else {
                    (g, l - ch)
                }
            });
        avg_gain /= self.period as f64;
        avg_loss /= self.period as f64;

        result[self.period] = scaled_rsi(avg_gain, avg_loss);

        let alpha = 1.0 / self.period as f64;
        for i in (self.period + 1)..n {
            let gain = changes[i].max(0.0);
            let loss = (-changes[i]).max(0.0);
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
            result[i] = scaled_rsi(avg_gain, avg_loss);
        }

        result
    }
}

fn scaled_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        0.5
    } else if avg_loss == 0.0 {
        1.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        1.0 - 1.0 / (1.0 + avg_gain / avg_loss)
    }
}
