//! Performance metrics: pure functions over an equity curve or paired series.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub cagr: f64,
    pub sharpe: f64,
    /// Positive fraction, e.g. 0.15 = 15% peak-to-trough.
    pub max_drawdown: f64,
    pub mse: f64,
    pub total_return: f64,
    pub num_periods: usize,
}

impl BacktestSummary {
    pub fn compute(equity: &[f64], predicted: &[f64], realized: &[f64], periods_per_year: f64) -> Self {
        Self {
            cagr: cagr(equity, periods_per_year),
            sharpe: sharpe_ratio(equity, periods_per_year),
            max_drawdown: max_drawdown(equity),
            mse: mse(predicted, realized),
            total_return: total_return(equity),
            num_periods: equity.len().saturating_sub(1),
        }
    }
}

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&first), Some(&last)) if equity.len() >= 2 && first > 0.0 => last / first - 1.0,
        _ => 0.0,
    }
}

/// Compound annual growth rate: `(final / initial)^(periods_per_year / num_periods) - 1`.
///
/// A wiped-out account (final <= 0) is -1. Fewer than two points is 0.
pub fn cagr(equity: &[f64], periods_per_year: f64) -> f64 {
    let (Some(&first), Some(&last)) = (equity.first(), equity.last()) else {
        return 0.0;
    };
    let periods = equity.len() - 1;
    if periods == 0 || first <= 0.0 {
        return 0.0;
    }
    if last <= 0.0 {
        return -1.0;
    }
    (last / first).powf(periods_per_year / periods as f64) - 1.0
}

/// Annualised Sharpe ratio of period returns (population std, zero risk-free).
/// Zero when the standard deviation is zero.
pub fn sharpe_ratio(equity: &[f64], periods_per_year: f64) -> f64 {
    let returns = period_returns(equity);
    if returns.is_empty() {
        return 0.0;
    }
    let mean = mean(&returns);
    let std = population_std(&returns, mean);
    if std < 1e-12 {
        return 0.0;
    }
    mean / std * periods_per_year.sqrt()
}

/// Maximum over t of `(peak_t - equity_t) / peak_t`.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &eq in equity {
        peak = peak.max(eq);
        if peak > 0.0 {
            worst = worst.max((peak - eq) / peak);
        }
    }
    worst
}

/// Mean squared error between paired series (0 for empty input).
pub fn mse(predicted: &[f64], realized: &[f64]) -> f64 {
    let n = predicted.len().min(realized.len());
    if n == 0 {
        return 0.0;
    }
    predicted
        .iter()
        .zip(realized)
        .map(|(p, r)| (p - r).powi(2))
        .sum::<f64>()
        / n as f64
}

/// Simple returns between consecutive equity points.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}
