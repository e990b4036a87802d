use super::metrics::BacktestSummary;
use crate::domain::{ModelVersion, Position, PredictionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Immutable output of one backtest run.
///
/// `equity_curve` has one more point than there are decision steps: it starts
/// at the base value on the first decision bar and adds a point per following
/// bar. `positions[i]`, `predictions[i]` and `realized_returns[i]` belong to
/// decision step `i`, and `realized_returns[i]` moves the curve from point `i`
/// to point `i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub model_version: ModelVersion,
    pub equity_curve: Vec<EquityPoint>,
    pub positions: Vec<Position>,
    pub predictions: Vec<PredictionRecord>,
    pub realized_returns: Vec<f64>,
    pub summary: BacktestSummary,
    pub periods_per_year: f64,
    /// Feature vectors in the simulated span whose sentiment came from the fallback.
    pub fallback_inputs: usize,
}

impl BacktestResult {
    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.equity).collect()
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve.last().map_or(0.0, |p| p.equity)
    }

    /// Period returns actually earned (exposure times realized return).
    pub fn strategy_returns(&self) -> Vec<f64> {
        self.positions
            .iter()
            .zip(&self.realized_returns)
            .map(|(pos, r)| pos.exposure * r)
            .collect()
    }
}
