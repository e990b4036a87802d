//! Offline training of the ridge ensemble from assembled features.

use serde::{Deserialize, Serialize};
use std::path::Path;

use senticast_core::domain::{BarSeries, ModelVersion, Provenance};
use senticast_core::features::{next_returns, FeatureSchema, FeatureVector};
use senticast_core::model::{
    fit_ridge_ensemble, training_set, FitConfig, ForecastModel, ModelArtifact, RidgeEnsemble,
};
use senticast_core::ForecastError;

/// What a training run saw and produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_version: ModelVersion,
    pub samples: usize,
    pub window_len: usize,
    pub feature_names: Vec<String>,
    /// Vectors whose sentiment came from the fallback scorer.
    pub fallback_inputs: usize,
}

/// Fit an ensemble on `vectors` with targets realized inside `bars`.
///
/// A vector on the last bar has no target and is left out, so training on a
/// prefix of the bars never sees a return beyond it.
pub fn fit_model(
    bars: &BarSeries,
    vectors: &[FeatureVector],
    schema: &FeatureSchema,
    config: &FitConfig,
) -> Result<(RidgeEnsemble, TrainingReport), ForecastError> {
    config.validate()?;
    let targets = next_returns(bars, vectors)?;
    let (xs, ys) = training_set(vectors, &targets, config.window_len)?;
    let members = fit_ridge_ensemble(&xs, &ys, config)?;
    let model = RidgeEnsemble::for_schema(&config.name, schema, config.window_len, members)?;

    let report = TrainingReport {
        model_version: model.version().clone(),
        samples: ys.len(),
        window_len: model.window_len(),
        feature_names: model.feature_names().to_vec(),
        fallback_inputs: vectors
            .iter()
            .filter(|v| v.sentiment_provenance == Provenance::Fallback)
            .count(),
    };
    tracing::info!(
        version = %report.model_version,
        samples = report.samples,
        fallback_inputs = report.fallback_inputs,
        "trained forecast model"
    );
    Ok((model, report))
}

/// Fit and persist the artifact at `path`.
pub fn train_and_save(
    bars: &BarSeries,
    vectors: &[FeatureVector],
    schema: &FeatureSchema,
    config: &FitConfig,
    path: &Path,
) -> Result<(RidgeEnsemble, TrainingReport), ForecastError> {
    let (model, report) = fit_model(bars, vectors, schema, config)?;
    ModelArtifact::from(&model).save(path)?;
    Ok((model, report))
}
