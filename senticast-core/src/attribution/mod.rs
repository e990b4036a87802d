//! Per-feature attribution of a single prediction.
//!
//! Contributions are exact Shapley values over feature names. A coalition is
//! a bitmask over the `n` features; features outside it are replaced by the
//! baseline at every window position and the model's mean forecast is
//! evaluated. Efficiency of Shapley values makes the contributions sum to
//! `prediction - baseline_prediction` for any model, and the enumeration is
//! independent of feature order.
//!
//! The cost is `2^n` forward passes, so `n` is capped at `MAX_FEATURES`.

use crate::error::ForecastError;
use crate::features::FeatureVector;
use crate::model::{flatten_window, ForecastModel};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest feature count explained exactly.
pub const MAX_FEATURES: usize = 16;

/// Tolerance on `sum(contributions) - (prediction - baseline)`.
pub const ATTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Reference input a feature is reset to when it is "absent".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum Baseline {
    #[default]
    Zeros,
    /// Per-feature reference values, in schema order.
    Mean(Vec<f64>),
}

impl Baseline {
    /// Historical per-feature mean over `history`.
    pub fn mean_of(history: &[FeatureVector]) -> Result<Self, ForecastError> {
        let first = history.first().ok_or(ForecastError::InsufficientData {
            what: "baseline history",
            required: 1,
            available: 0,
        })?;
        let width = first.len();
        let mut sums = vec![0.0; width];
        for vector in history {
            if vector.len() != width {
                return Err(ForecastError::InvalidInputShape {
                    what: "baseline history vector",
                    expected: width,
                    actual: vector.len(),
                });
            }
            for (s, v) in sums.iter_mut().zip(&vector.values) {
                *s += v;
            }
        }
        let n = history.len() as f64;
        Ok(Baseline::Mean(sums.into_iter().map(|s| s / n).collect()))
    }

    fn values(&self, width: usize) -> Result<Vec<f64>, ForecastError> {
        match self {
            Baseline::Zeros => Ok(vec![0.0; width]),
            Baseline::Mean(values) if values.len() == width => Ok(values.clone()),
            Baseline::Mean(values) => Err(ForecastError::InvalidInputShape {
                what: "baseline",
                expected: width,
                actual: values.len(),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Baseline::Zeros => "zeros",
            Baseline::Mean(_) => "mean",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
    ExactShapley,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    pub timestamp: DateTime<Utc>,
    pub prediction: f64,
    /// Model output with every feature at its baseline value.
    pub baseline: f64,
    pub contributions: BTreeMap<String, f64>,
    pub method: AttributionMethod,
}

impl AttributionResult {
    /// `sum(contributions) - (prediction - baseline)`.
    pub fn residual(&self) -> f64 {
        self.contributions.values().sum::<f64>() - (self.prediction - self.baseline)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Attributor {
    baseline: Baseline,
}

impl Attributor {
    pub fn new(baseline: Baseline) -> Self {
        Self { baseline }
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    /// Explain the prediction for the window ending at its last vector.
    pub fn explain(
        &self,
        window: &[FeatureVector],
        model: &dyn ForecastModel,
    ) -> Result<AttributionResult, ForecastError> {
        let names = model.feature_names();
        let n = names.len();
        if n > MAX_FEATURES {
            return Err(ForecastError::InvalidInputShape {
                what: "attributed features",
                expected: MAX_FEATURES,
                actual: n,
            });
        }
        let flat = flatten_window(window, model.window_len(), n, model.schema_version())?;
        let timestamp = window
            .last()
            .map(|v| v.timestamp)
            .ok_or(ForecastError::InsufficientData {
                what: "attribution window",
                required: 1,
                available: 0,
            })?;
        let reference = self.baseline.values(n)?;

        let coalitions = 1usize << n;
        let values: Vec<f64> = (0..coalitions)
            .into_par_iter()
            .map(|mask| {
                let input: Vec<f64> = flat
                    .iter()
                    .enumerate()
                    .map(|(idx, &x)| {
                        let f = idx % n;
                        if mask & (1 << f) != 0 {
                            x
                        } else {
                            reference[f]
                        }
                    })
                    .collect();
                model.forward(&input).mean
            })
            .collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::NonFinite {
                what: "attribution forward pass",
            });
        }

        // weight[s] = s! (n - s - 1)! / n!
        let weights: Vec<f64> = (0..n).map(|s| shapley_weight(n, s)).collect();
        let mut contributions = BTreeMap::new();
        for (i, name) in names.iter().enumerate() {
            let bit = 1usize << i;
            let phi: f64 = (0..coalitions)
                .filter(|mask| mask & bit == 0)
                .map(|mask| weights[mask.count_ones() as usize] * (values[mask | bit] - values[mask]))
                .sum();
            contributions.insert(name.clone(), phi);
        }

        let result = AttributionResult {
            timestamp,
            prediction: values[coalitions - 1],
            baseline: values[0],
            contributions,
            method: AttributionMethod::ExactShapley,
        };
        tracing::debug!(
            features = n,
            prediction = result.prediction,
            baseline = result.baseline,
            residual = result.residual(),
            "explained prediction"
        );
        Ok(result)
    }
}

fn shapley_weight(n: usize, s: usize) -> f64 {
    // s! (n-s-1)! / n! computed as a running product to stay in range.
    let mut w = 1.0 / n as f64;
    let mut k = s;
    let mut m = n - 1;
    // 1 / C(n-1, s)
    while k > 0 {
        w *= k as f64 / m as f64;
        k -= 1;
        m -= 1;
    }
    w
}
