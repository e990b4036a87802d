//! Forecast models: inference contract, the ridge ensemble, offline fitting,
//! and the persisted artifact.
//!
//! A model consumes a window of `window_len()` consecutive feature vectors,
//! flattened row-major by time step, and returns a predicted next-period
//! return with a non-negative uncertainty. Models are stateless across calls
//! and shared read-only behind `Arc`.

pub mod artifact;
pub mod fit;
pub mod ridge;

pub use artifact::{ModelArtifact, ARTIFACT_FORMAT_VERSION};
pub use fit::{fit_ridge_ensemble, training_set, FitConfig};
pub use ridge::{RidgeEnsemble, RidgeMember};

use crate::domain::{ModelVersion, PredictionRecord};
use crate::error::ForecastError;
use crate::features::FeatureVector;
use rayon::prelude::*;

/// Raw model output for one flattened window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forecast {
    pub mean: f64,
    pub uncertainty: f64,
}

pub trait ForecastModel: Send + Sync {
    fn version(&self) -> &ModelVersion;

    /// Number of consecutive feature vectors per window.
    fn window_len(&self) -> usize;

    /// Per-vector field names, in schema order.
    fn feature_names(&self) -> &[String];

    fn feature_count(&self) -> usize {
        self.feature_names().len()
    }

    /// Schema version the model was trained on; `None` accepts any.
    fn schema_version(&self) -> Option<u32> {
        None
    }

    /// Evaluate a flattened window of `window_len() * feature_count()` values.
    fn forward(&self, flat: &[f64]) -> Forecast;

    /// Predict from one window. Fails without producing a record if the
    /// window shape or schema does not match.
    fn predict(&self, window: &[FeatureVector]) -> Result<PredictionRecord, ForecastError> {
        let flat = flatten_window(
            window,
            self.window_len(),
            self.feature_count(),
            self.schema_version(),
        )?;
        let forecast = self.forward(&flat);
        if !forecast.mean.is_finite() || !forecast.uncertainty.is_finite() {
            return Err(ForecastError::NonFinite { what: "forecast" });
        }
        let timestamp = window
            .last()
            .map(|v| v.timestamp)
            .ok_or(ForecastError::InvalidInputShape {
                what: "window length",
                expected: self.window_len(),
                actual: 0,
            })?;
        Ok(PredictionRecord {
            timestamp,
            predicted_return: forecast.mean,
            uncertainty: forecast.uncertainty.max(0.0),
            model_version: self.version().clone(),
        })
    }

    /// Predict each window independently on the current rayon pool; output
    /// order equals input order. The first failing window fails the batch.
    fn predict_many(
        &self,
        windows: &[&[FeatureVector]],
    ) -> Result<Vec<PredictionRecord>, ForecastError> {
        windows.par_iter().map(|w| self.predict(w)).collect()
    }
}

/// Validate a window and flatten it row-major by time step.
pub fn flatten_window(
    window: &[FeatureVector],
    window_len: usize,
    feature_count: usize,
    schema_version: Option<u32>,
) -> Result<Vec<f64>, ForecastError> {
    if window.len() != window_len {
        return Err(ForecastError::InvalidInputShape {
            what: "window length",
            expected: window_len,
            actual: window.len(),
        });
    }
    let mut flat = Vec::with_capacity(window_len * feature_count);
    for vector in window {
        if vector.len() != feature_count {
            return Err(ForecastError::InvalidInputShape {
                what: "feature count",
                expected: feature_count,
                actual: vector.len(),
            });
        }
        if let Some(expected) = schema_version {
            if vector.schema_version != expected {
                return Err(ForecastError::SchemaMismatch {
                    expected: format!("schema version {expected}"),
                    found: format!("schema version {}", vector.schema_version),
                });
            }
        }
        flat.extend_from_slice(&vector.values);
    }
    Ok(flat)
}

/// Every full window over `vectors`, ending at each index `>= window_len - 1`.
pub fn sliding_windows(vectors: &[FeatureVector], window_len: usize) -> Vec<&[FeatureVector]> {
    if window_len == 0 {
        return Vec::new();
    }
    vectors.windows(window_len).collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::{vectors, LinearStub};
    use super::*;

    #[test]
    fn predict_uses_last_timestamp() {
        let model = LinearStub::new(2, 2, vec![1.0, 0.0, 0.0, 1.0]);
        let window = vectors(&[&[0.1, 0.2], &[0.3, 0.4]]);
        let record = model.predict(&window).unwrap();
        assert_eq!(record.timestamp, window[1].timestamp);
        assert!((record.predicted_return - 0.5).abs() < 1e-12);
        assert_eq!(record.uncertainty, 0.01);
        assert_eq!(record.model_version, model.version);
    }

    #[test]
    fn wrong_window_length_is_invalid_shape() {
        let model = LinearStub::new(2, 3, vec![0.0; 6]);
        let window = vectors(&[&[0.1, 0.2], &[0.3, 0.4]]);
        let err = model.predict(&window).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InvalidInputShape { what: "window length", expected: 3, actual: 2 }
        ));
    }

    #[test]
    fn wrong_field_count_is_invalid_shape() {
        let model = LinearStub::new(2, 1, vec![0.0; 2]);
        let window = vectors(&[&[0.1, 0.2, 0.3]]);
        assert!(matches!(
            model.predict(&window),
            Err(ForecastError::InvalidInputShape { what: "feature count", .. })
        ));
    }

    #[test]
    fn predict_many_preserves_order_and_fails_whole_batch() {
        let model = LinearStub::new(1, 1, vec![1.0]);
        let all = vectors(&[&[1.0], &[2.0], &[3.0]]);
        let windows = sliding_windows(&all, 1);
        let records = model.predict_many(&windows).unwrap();
        let means: Vec<f64> = records.iter().map(|r| r.predicted_return).collect();
        assert_eq!(means, vec![1.0, 2.0, 3.0]);

        let bad = vectors(&[&[1.0, 2.0]]);
        let mixed: Vec<&[FeatureVector]> = vec![&all[..1], &bad[..]];
        assert!(model.predict_many(&mixed).is_err());
    }

    #[test]
    fn non_finite_forecast_is_rejected() {
        let model = LinearStub::new(1, 1, vec![f64::INFINITY]);
        let window = vectors(&[&[1.0]]);
        assert!(matches!(
            model.predict(&window),
            Err(ForecastError::NonFinite { .. })
        ));
    }

    #[test]
    fn sliding_windows_count() {
        let all = vectors(&[&[1.0], &[2.0], &[3.0], &[4.0]]);
        assert_eq!(sliding_windows(&all, 3).len(), 2);
        assert!(sliding_windows(&all, 5).is_empty());
        assert!(sliding_windows(&all, 0).is_empty());
    }
}
