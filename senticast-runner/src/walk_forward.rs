//! Walk-forward evaluation: retrain on an expanding in-sample (IS) prefix,
//! test on the next out-of-sample (OOS) block, and stitch the OOS blocks
//! into one equity curve.
//!
//! Fold `i` trains on bars `[0, is_end)` only, so its targets stop at the
//! last IS bar. The OOS backtest makes its first decision on bar `oos_start`
//! using the `window_len - 1` preceding vectors as context, and its last
//! decision on bar `oos_end - 1`, which earns the return into the next
//! block. Consecutive OOS blocks therefore tile the test span without gaps
//! or overlap.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use senticast_core::backtest::{BacktestResult, BacktestSummary, EquityPoint, EQUITY_BASE};
use senticast_core::domain::{BarSeries, ModelVersion, Position, PredictionRecord, SentimentScore};
use senticast_core::features::FeatureVector;
use senticast_core::model::ForecastModel;
use senticast_core::ForecastError;

use crate::pipeline::Pipeline;
use crate::training::fit_model;
use crate::RunError;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    pub n_folds: usize,
    /// Bars required before any fold is attempted.
    pub min_total_bars: usize,
    /// Bars in the first IS window.
    pub min_is_bars: usize,
    /// Smallest acceptable OOS block.
    pub min_oos_bars: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            min_total_bars: 756,
            min_is_bars: 252,
            min_oos_bars: 63,
        }
    }
}

impl WalkForwardConfig {
    pub fn validate(&self) -> Result<(), WalkForwardError> {
        if self.n_folds == 0 || self.min_oos_bars == 0 || self.min_is_bars == 0 {
            return Err(WalkForwardError::InvalidConfig(
                "n_folds, min_is_bars and min_oos_bars must all be >= 1".into(),
            ));
        }
        Ok(())
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Bar index ranges of one fold; ends are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSpec {
    pub fold_index: usize,
    pub is_end: usize,
    pub oos_start: usize,
    pub oos_end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    pub spec: FoldSpec,
    pub model_version: ModelVersion,
    pub training_samples: usize,
    pub in_sample: BacktestSummary,
    pub out_of_sample: BacktestSummary,
}

/// How OOS performance compares with IS performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradationFlag {
    /// IS Sharpe >= 0.1; ratio is OOS / IS.
    Normal,
    /// IS Sharpe in [0, 0.1); value is OOS - IS.
    LowIsSharpe,
    /// IS Sharpe below zero; no ratio.
    NegativeIsSharpe,
    /// IS Sharpe >= 0.1 with negative OOS Sharpe; ratio clamped to 0.
    FailedOos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub folds: Vec<FoldResult>,
    pub oos_equity_curve: Vec<EquityPoint>,
    pub oos_positions: Vec<Position>,
    pub oos_predictions: Vec<PredictionRecord>,
    pub oos_realized_returns: Vec<f64>,
    /// Statistics of the stitched OOS curve.
    pub oos_summary: BacktestSummary,
    pub mean_is_sharpe: f64,
    pub mean_oos_sharpe: f64,
    pub degradation_ratio: Option<f64>,
    pub degradation_flag: DegradationFlag,
}

#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("insufficient data: {total_bars} bars < minimum {min_bars}")]
    InsufficientData { total_bars: usize, min_bars: usize },

    #[error("cannot fit {n_folds} folds of at least {min_oos_bars} OOS bars in {total_bars} bars")]
    FoldCreationFailed {
        n_folds: usize,
        min_oos_bars: usize,
        total_bars: usize,
    },

    #[error("invalid walk-forward config: {0}")]
    InvalidConfig(String),

    #[error("feature assembly failed: {0}")]
    Assembly(#[source] ForecastError),

    #[error("fold {fold} failed: {source}")]
    FoldFailed {
        fold: usize,
        #[source]
        source: RunError,
    },
}

// ─── Fold creation ───────────────────────────────────────────────────

/// Expanding IS windows followed by equal, contiguous OOS blocks.
///
/// The first IS window is `min_is_bars` long; the remaining bars are split
/// into `n_folds` blocks and each fold's IS window absorbs the blocks before
/// its own. The last bar is kept out of every block so the final decision
/// still has a realized return.
pub fn create_folds(
    total_bars: usize,
    config: &WalkForwardConfig,
) -> Result<Vec<FoldSpec>, WalkForwardError> {
    config.validate()?;
    if total_bars < config.min_total_bars {
        return Err(WalkForwardError::InsufficientData {
            total_bars,
            min_bars: config.min_total_bars,
        });
    }
    let usable = total_bars.saturating_sub(1);
    let block = usable.saturating_sub(config.min_is_bars) / config.n_folds;
    if block < config.min_oos_bars {
        return Err(WalkForwardError::FoldCreationFailed {
            n_folds: config.n_folds,
            min_oos_bars: config.min_oos_bars,
            total_bars,
        });
    }

    Ok((0..config.n_folds)
        .map(|i| {
            let is_end = config.min_is_bars + i * block;
            FoldSpec {
                fold_index: i,
                is_end,
                oos_start: is_end,
                oos_end: is_end + block,
            }
        })
        .collect())
}

// ─── Orchestration ───────────────────────────────────────────────────

struct FoldRun {
    result: FoldResult,
    oos: BacktestResult,
}

/// Retrain and test every fold on the pipeline's pool, then stitch.
///
/// `scores` may cover the whole span: assembly joins each bar only with
/// scores at or before it.
pub fn run_walk_forward(
    pipeline: &Pipeline,
    bars: &BarSeries,
    scores: &[SentimentScore],
    config: &WalkForwardConfig,
) -> Result<WalkForwardResult, WalkForwardError> {
    let folds = create_folds(bars.len(), config)?;
    let lookback = pipeline.lookback();
    let window = pipeline.config().model.fit.window_len;
    if folds[0].oos_start < lookback + window {
        return Err(WalkForwardError::InvalidConfig(format!(
            "min_is_bars = {} leaves no room for lookback {lookback} and window {window}",
            config.min_is_bars
        )));
    }

    let all_vectors = pipeline
        .assemble(bars, scores)
        .map_err(WalkForwardError::Assembly)?;

    let runs: Vec<FoldRun> = pipeline.install(|| {
        folds
            .par_iter()
            .map(|spec| {
                run_fold(pipeline, bars, scores, &all_vectors, spec, window).map_err(|source| {
                    WalkForwardError::FoldFailed {
                        fold: spec.fold_index,
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    let result = stitch(runs, pipeline.config().backtest.engine.periods_per_year);
    tracing::info!(
        folds = result.folds.len(),
        oos_sharpe = result.oos_summary.sharpe,
        oos_cagr = result.oos_summary.cagr,
        degradation = ?result.degradation_flag,
        "walk-forward complete"
    );
    Ok(result)
}

fn run_fold(
    pipeline: &Pipeline,
    bars: &BarSeries,
    scores: &[SentimentScore],
    all_vectors: &[FeatureVector],
    spec: &FoldSpec,
    window: usize,
) -> Result<FoldRun, RunError> {
    let lookback = pipeline.lookback();

    let is_bars = bars.slice(0, spec.is_end);
    let is_vectors = pipeline.assemble(&is_bars, scores)?;
    let (model, report) = fit_model(
        &is_bars,
        &is_vectors,
        pipeline.schema(),
        &pipeline.config().model.fit,
    )?;
    let in_sample = pipeline.backtest_with(&model, &is_bars, &is_vectors, None)?;

    // Vector k sits on bar lookback + k.
    let first = spec.oos_start + 1 - window - lookback;
    let last = spec.oos_end - lookback;
    let oos_bars = bars.slice(0, spec.oos_end + 1);
    let oos = pipeline.backtest_with(&model, &oos_bars, &all_vectors[first..last], None)?;

    tracing::debug!(
        fold = spec.fold_index,
        is_end = spec.is_end,
        oos_end = spec.oos_end,
        is_sharpe = in_sample.summary.sharpe,
        oos_sharpe = oos.summary.sharpe,
        "fold evaluated"
    );
    Ok(FoldRun {
        result: FoldResult {
            spec: *spec,
            model_version: model.version().clone(),
            training_samples: report.samples,
            in_sample: in_sample.summary,
            out_of_sample: oos.summary,
        },
        oos,
    })
}

fn stitch(runs: Vec<FoldRun>, periods_per_year: f64) -> WalkForwardResult {
    let mut equity = EQUITY_BASE;
    let mut curve = Vec::new();
    let mut positions = Vec::new();
    let mut predictions = Vec::new();
    let mut realized = Vec::new();
    let mut folds = Vec::with_capacity(runs.len());

    for run in runs {
        let scale = equity / EQUITY_BASE;
        let points = &run.oos.equity_curve;
        if curve.is_empty() {
            curve.extend(points.first().copied());
        }
        curve.extend(points.iter().skip(1).map(|p| EquityPoint {
            timestamp: p.timestamp,
            equity: p.equity * scale,
        }));
        equity = curve.last().map_or(equity, |p| p.equity);

        positions.extend(run.oos.positions);
        predictions.extend(run.oos.predictions);
        realized.extend(run.oos.realized_returns);
        folds.push(run.result);
    }

    let values: Vec<f64> = curve.iter().map(|p| p.equity).collect();
    let predicted: Vec<f64> = predictions.iter().map(|p| p.predicted_return).collect();
    let oos_summary = BacktestSummary::compute(&values, &predicted, &realized, periods_per_year);

    let n = folds.len().max(1) as f64;
    let mean_is_sharpe = folds.iter().map(|f| f.in_sample.sharpe).sum::<f64>() / n;
    let mean_oos_sharpe = folds.iter().map(|f| f.out_of_sample.sharpe).sum::<f64>() / n;
    let (degradation_ratio, degradation_flag) = degradation(mean_is_sharpe, mean_oos_sharpe);

    WalkForwardResult {
        folds,
        oos_equity_curve: curve,
        oos_positions: positions,
        oos_predictions: predictions,
        oos_realized_returns: realized,
        oos_summary,
        mean_is_sharpe,
        mean_oos_sharpe,
        degradation_ratio,
        degradation_flag,
    }
}

fn degradation(is_sharpe: f64, oos_sharpe: f64) -> (Option<f64>, DegradationFlag) {
    match (is_sharpe, oos_sharpe) {
        (is, _) if is < 0.0 => (None, DegradationFlag::NegativeIsSharpe),
        (is, oos) if is < 0.1 => (Some(oos - is), DegradationFlag::LowIsSharpe),
        (_, oos) if oos < 0.0 => (Some(0.0), DegradationFlag::FailedOos),
        (is, oos) => (Some(oos / is), DegradationFlag::Normal),
    }
}
