//! Backtest simulator: an explicit fold over decision steps.
//!
//! Feature vectors are aligned to bars by timestamp and must cover a
//! contiguous run of bars. A decision step exists for every aligned bar `j`
//! that closes a full model window and has a following bar `j + 1`. At step
//! `j` the model sees only vectors up to `j`; the position it produces earns
//! the return from `j` to `j + 1`:
//!
//! `equity[j + 1] = equity[j] * (1 + exposure_j * (close[j + 1] / close[j] - 1))`

use super::metrics::BacktestSummary;
use super::policy::ThresholdPolicy;
use super::result::{BacktestResult, EquityPoint};
use crate::domain::{BarSeries, Position, PredictionRecord, Provenance};
use crate::error::ForecastError;
use crate::features::FeatureVector;
use crate::model::ForecastModel;
use serde::{Deserialize, Serialize};

/// Equity at the start of every run.
pub const EQUITY_BASE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Annualisation factor for CAGR and Sharpe.
    pub periods_per_year: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "periods_per_year must be positive, got {}",
                self.periods_per_year
            )));
        }
        Ok(())
    }
}

/// Accumulator threaded through the fold.
struct FoldState {
    equity: f64,
    curve: Vec<EquityPoint>,
    positions: Vec<Position>,
    predictions: Vec<PredictionRecord>,
    realized: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct Backtester {
    config: BacktestConfig,
}

impl Backtester {
    pub fn new(config: BacktestConfig) -> Result<Self, ForecastError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn run(
        &self,
        bars: &BarSeries,
        features: &[FeatureVector],
        model: &dyn ForecastModel,
        policy: &dyn ThresholdPolicy,
    ) -> Result<BacktestResult, ForecastError> {
        if features.len() < 2 {
            return Err(ForecastError::InsufficientData {
                what: "aligned bar/feature pairs",
                required: 2,
                available: features.len(),
            });
        }
        let first_bar = align(bars, features)?;

        let window = model.window_len().max(1);
        // Feature k sits on bar first_bar + k.
        let steps: Vec<usize> = (window - 1..features.len())
            .filter(|&k| first_bar + k + 1 < bars.len())
            .collect();
        let (Some(&first_step), Some(&last_step)) = (steps.first(), steps.last()) else {
            return Err(ForecastError::InsufficientData {
                what: "decision steps",
                required: window + 1,
                available: features.len(),
            });
        };

        let start = FoldState {
            equity: EQUITY_BASE,
            curve: vec![EquityPoint {
                timestamp: bars[first_bar + first_step].timestamp,
                equity: EQUITY_BASE,
            }],
            positions: Vec::with_capacity(steps.len()),
            predictions: Vec::with_capacity(steps.len()),
            realized: Vec::with_capacity(steps.len()),
        };

        let state = steps.iter().try_fold(start, |mut state, &k| {
            let j = first_bar + k;
            let prediction = model.predict(&features[k + 1 - window..=k])?;
            let raw = policy.exposure(&prediction);
            if !raw.is_finite() {
                return Err(ForecastError::InvalidPolicyOutput(raw));
            }
            let exposure = raw.clamp(-1.0, 1.0);
            let realized = bars[j + 1].close / bars[j].close - 1.0;

            state.equity *= 1.0 + exposure * realized;
            state.curve.push(EquityPoint {
                timestamp: bars[j + 1].timestamp,
                equity: state.equity,
            });
            state.positions.push(Position {
                timestamp: bars[j].timestamp,
                exposure,
            });
            state.predictions.push(prediction);
            state.realized.push(realized);
            Ok(state)
        })?;

        let equity: Vec<f64> = state.curve.iter().map(|p| p.equity).collect();
        let predicted: Vec<f64> = state.predictions.iter().map(|p| p.predicted_return).collect();
        let summary = BacktestSummary::compute(
            &equity,
            &predicted,
            &state.realized,
            self.config.periods_per_year,
        );
        if !(summary.cagr.is_finite() && summary.sharpe.is_finite() && summary.mse.is_finite()) {
            return Err(ForecastError::NonFinite {
                what: "backtest summary",
            });
        }
        let fallback_inputs = features[first_step + 1 - window..=last_step]
            .iter()
            .filter(|v| v.sentiment_provenance == Provenance::Fallback)
            .count();

        tracing::debug!(
            steps = steps.len(),
            final_equity = state.equity,
            cagr = summary.cagr,
            sharpe = summary.sharpe,
            fallback_inputs,
            "backtest complete"
        );

        Ok(BacktestResult {
            model_version: model.version().clone(),
            equity_curve: state.curve,
            positions: state.positions,
            predictions: state.predictions,
            realized_returns: state.realized,
            summary,
            periods_per_year: self.config.periods_per_year,
            fallback_inputs,
        })
    }
}

/// Bar index of the first feature vector; every following vector must sit on
/// the next bar.
fn align(bars: &BarSeries, features: &[FeatureVector]) -> Result<usize, ForecastError> {
    let first = bars
        .index_of(features[0].timestamp)
        .ok_or(ForecastError::MisalignedFeatures {
            timestamp: features[0].timestamp,
        })?;
    for (k, vector) in features.iter().enumerate().skip(1) {
        let expected = bars.get(first + k).map(|b| b.timestamp);
        if expected != Some(vector.timestamp) {
            return Err(ForecastError::MisalignedFeatures {
                timestamp: vector.timestamp,
            });
        }
    }
    Ok(first)
}
