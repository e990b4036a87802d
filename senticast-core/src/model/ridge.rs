//! Ensemble of ridge regressions over the flattened feature window.
//!
//! Each member was fitted on a different expanding prefix of the training
//! history. The forecast mean is the member average and the uncertainty is
//! the population standard deviation across members, so disagreement between
//! older and newer fits shows up as lower confidence.

use super::{Forecast, ForecastModel};
use crate::domain::ModelVersion;
use crate::error::ForecastError;
use crate::features::{FeatureSchema, SchemaFingerprint};
use serde::{Deserialize, Serialize};

/// One linear member in raw (unstandardised) feature space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeMember {
    pub intercept: f64,
    pub weights: Vec<f64>,
}

impl RidgeMember {
    pub fn evaluate(&self, flat: &[f64]) -> f64 {
        self.intercept
            + self
                .weights
                .iter()
                .zip(flat)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RidgeEnsemble {
    name: String,
    version: ModelVersion,
    schema_version: u32,
    schema_fingerprint: SchemaFingerprint,
    feature_names: Vec<String>,
    window_len: usize,
    members: Vec<RidgeMember>,
}

impl RidgeEnsemble {
    /// Build an ensemble for `schema`; the version id is derived from the weights.
    pub fn for_schema(
        name: &str,
        schema: &FeatureSchema,
        window_len: usize,
        members: Vec<RidgeMember>,
    ) -> Result<Self, ForecastError> {
        Self::from_parts(
            name,
            schema.version,
            schema.fingerprint(),
            schema.field_names(),
            window_len,
            members,
        )
    }

    pub(crate) fn from_parts(
        name: &str,
        schema_version: u32,
        schema_fingerprint: SchemaFingerprint,
        feature_names: Vec<String>,
        window_len: usize,
        members: Vec<RidgeMember>,
    ) -> Result<Self, ForecastError> {
        if members.is_empty() {
            return Err(ForecastError::InsufficientData {
                what: "ensemble members",
                required: 1,
                available: 0,
            });
        }
        if window_len == 0 {
            return Err(ForecastError::InvalidConfig("window_len must be >= 1".into()));
        }
        let width = window_len * feature_names.len();
        for member in &members {
            if member.weights.len() != width {
                return Err(ForecastError::InvalidInputShape {
                    what: "member weights",
                    expected: width,
                    actual: member.weights.len(),
                });
            }
            if !member.intercept.is_finite() || member.weights.iter().any(|w| !w.is_finite()) {
                return Err(ForecastError::NonFinite {
                    what: "member weights",
                });
            }
        }
        let version = ModelVersion::derive(name, &weight_bytes(&members));
        Ok(Self {
            name: name.to_string(),
            version,
            schema_version,
            schema_fingerprint,
            feature_names,
            window_len,
            members,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema_fingerprint(&self) -> &SchemaFingerprint {
        &self.schema_fingerprint
    }

    pub fn members(&self) -> &[RidgeMember] {
        &self.members
    }
}

/// Canonical byte encoding of the weights for version hashing.
pub(crate) fn weight_bytes(members: &[RidgeMember]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for member in members {
        bytes.extend_from_slice(&(member.weights.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&member.intercept.to_le_bytes());
        for w in &member.weights {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
    }
    bytes
}

impl ForecastModel for RidgeEnsemble {
    fn version(&self) -> &ModelVersion {
        &self.version
    }

    fn window_len(&self) -> usize {
        self.window_len
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn schema_version(&self) -> Option<u32> {
        Some(self.schema_version)
    }

    fn forward(&self, flat: &[f64]) -> Forecast {
        let preds: Vec<f64> = self.members.iter().map(|m| m.evaluate(flat)).collect();
        let k = preds.len() as f64;
        let mean = preds.iter().sum::<f64>() / k;
        let var = preds.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / k;
        Forecast {
            mean,
            uncertainty: var.sqrt(),
        }
    }
}
